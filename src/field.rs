use crate::codec::{self, BitRange};
use crate::error::RegMapResult;

/// Describes a field on a register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
  /// A name that identifies the field. Unique within the parent register. An empty name marks
  /// a reserved range that is still addressable for masking.
  pub name: String,

  bits: BitRange,
}
impl FieldSpec {
  pub fn new(name: &str, msb: u8, lsb: u8) -> RegMapResult<Self> {
    Ok(Self {
      name: name.to_owned(),
      bits: BitRange::new(msb, lsb)?,
    })
  }

  pub(crate) fn from_bits(name: &str, bits: BitRange) -> Self {
    Self {
      name: name.to_owned(),
      bits,
    }
  }

  /// The bit range this field occupies on its register.
  pub fn bits(&self) -> BitRange {
    self.bits
  }

  pub fn msb(&self) -> u8 {
    self.bits.msb()
  }

  pub fn lsb(&self) -> u8 {
    self.bits.lsb()
  }

  /// The bit width of the field.
  pub fn width(&self) -> u8 {
    self.bits.width()
  }

  /// The bit mask for reading/writing this field on the parent register
  pub fn mask(&self) -> u32 {
    self.bits.mask()
  }

  /// Whether this field is a reserved (unnamed) range.
  pub fn is_reserved(&self) -> bool {
    self.name.is_empty()
  }

  pub fn encode(&self, word: u32, value: u32) -> RegMapResult<u32> {
    codec::encode(word, self.bits, value)
  }

  pub fn decode(&self, word: u32) -> u32 {
    codec::decode(word, self.bits)
  }
}
