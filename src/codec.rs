//! Packing and unpacking of field values within a 32-bit register word.

use crate::error::{RegMapError, RegMapResult};

/// An inclusive bit range `[lsb, msb]` within a 32-bit register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitRange {
  msb: u8,
  lsb: u8,
}
impl BitRange {
  /// The range covering the whole register.
  pub const FULL: BitRange = BitRange { msb: 31, lsb: 0 };

  pub fn new(msb: u8, lsb: u8) -> RegMapResult<Self> {
    if msb > 31 {
      return Err(RegMapError::malformed(&format!(
        "Bit range [{}:{}]: MSB must be at most 31",
        msb, lsb
      )));
    }
    if msb < lsb {
      return Err(RegMapError::malformed(&format!(
        "Bit range [{}:{}]: MSB must not be below LSB",
        msb, lsb
      )));
    }
    Ok(Self { msb, lsb })
  }

  /// A single-bit range.
  pub fn bit(bit: u8) -> RegMapResult<Self> {
    Self::new(bit, bit)
  }

  pub fn msb(&self) -> u8 {
    self.msb
  }

  pub fn lsb(&self) -> u8 {
    self.lsb
  }

  /// The number of bits covered, between 1 and 32.
  pub fn width(&self) -> u8 {
    self.msb - self.lsb + 1
  }

  /// The unshifted mask of all ones for this width.
  pub fn value_mask(&self) -> u32 {
    u32::MAX >> (32 - u32::from(self.width()))
  }

  /// The bit mask for reading/writing this range on its register.
  pub fn mask(&self) -> u32 {
    self.value_mask() << self.lsb
  }

  /// Whether `value` fits in this range.
  pub fn fits(&self, value: u32) -> bool {
    value & !self.value_mask() == 0
  }
}

/// Fails with `ValueOutOfRange` unless `value` fits in `bits`.
pub fn check(bits: BitRange, value: u32) -> RegMapResult<()> {
  if !bits.fits(value) {
    return Err(RegMapError::ValueOutOfRange {
      value,
      width: bits.width(),
    });
  }
  Ok(())
}

/// Returns `word` with this range replaced by `value`. All bits outside the range pass through
/// unchanged.
pub fn encode(word: u32, bits: BitRange, value: u32) -> RegMapResult<u32> {
  check(bits, value)?;
  Ok((word & !bits.mask()) | (value << bits.lsb))
}

/// Extracts the value held in this range of `word`.
pub fn decode(word: u32, bits: BitRange) -> u32 {
  (word >> bits.lsb) & bits.value_mask()
}

#[cfg(test)]
mod tests {
  use super::{decode, encode, BitRange};
  use crate::error::RegMapError;

  #[test]
  fn encodes_into_saturated_word() {
    let bits = BitRange::new(8, 6).unwrap();

    let word = encode(0xFFFF_FFFF, bits, 5).unwrap();

    assert_eq!(0b101, (word >> 6) & 0b111);
    assert_eq!(0xFFFF_FF7F, word);
  }

  #[test]
  fn round_trips_and_preserves_other_bits() {
    let words = [0x0000_0000, 0xFFFF_FFFF, 0xA5A5_5A5A, 0x1234_5678];

    for lsb in 0..32u8 {
      for msb in lsb..32u8 {
        let bits = BitRange::new(msb, lsb).unwrap();
        let max = bits.value_mask();
        for &word in words.iter() {
          for &value in [0, 1, max / 2, max].iter() {
            let encoded = encode(word, bits, value).unwrap();
            assert_eq!(value, decode(encoded, bits));
            assert_eq!(word & !bits.mask(), encoded & !bits.mask());
          }
        }
      }
    }
  }

  #[test]
  fn rejects_values_wider_than_field() {
    for lsb in 0..31u8 {
      for msb in lsb..31u8 {
        let bits = BitRange::new(msb, lsb).unwrap();
        let too_big = 1u32 << bits.width();
        match encode(0, bits, too_big) {
          Err(RegMapError::ValueOutOfRange { value, width }) => {
            assert_eq!(too_big, value);
            assert_eq!(bits.width(), width);
          }
          other => panic!("expected ValueOutOfRange, got {:?}", other),
        }
        assert!(encode(0, bits, u32::MAX).is_err());
      }
    }
  }

  #[test]
  fn full_range_accepts_any_value() {
    assert_eq!(32, BitRange::FULL.width());
    assert_eq!(u32::MAX, BitRange::FULL.mask());
    assert_eq!(0xDEAD_BEEF, encode(0x1234_5678, BitRange::FULL, 0xDEAD_BEEF).unwrap());
    assert_eq!(0xDEAD_BEEF, decode(0xDEAD_BEEF, BitRange::FULL));
  }

  #[test]
  fn computes_masks() {
    assert_eq!(0b1_1100_0000, BitRange::new(8, 6).unwrap().mask());
    assert_eq!(0xFF00_0000, BitRange::new(31, 24).unwrap().mask());
    assert_eq!(1, BitRange::bit(0).unwrap().mask());
  }

  #[test]
  fn rejects_inverted_and_oversized_ranges() {
    assert!(matches!(BitRange::new(0, 1), Err(RegMapError::MalformedTable(_))));
    assert!(matches!(BitRange::new(32, 0), Err(RegMapError::MalformedTable(_))));
  }
}
