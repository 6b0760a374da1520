//! Lane addressing for the pin multiplexer.
//!
//! Each direction has four banked `*_SEL_n` registers of four 8-bit sub-fields, covering lanes
//! 0-15. The mirror and interrupt registers are 16-lane bitmaps with one bit per lane.

use crate::{
  codec::BitRange,
  error::{RegMapError, RegMapResult},
  map::FieldLocation,
  module::ModuleSpec,
  register::RegisterSpec,
  RegisterMap,
};

/// Name of the pin-mux module.
pub const PIN_MUX_MODULE: &str = "wfg_pin_mux_top";

/// Number of lanes per direction.
pub const LANES: u8 = 16;

const LANES_PER_BANK: u8 = 4;
const BANKS: u8 = LANES / LANES_PER_BANK;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
  Output,
  Input,
  Pullup,
}
impl Direction {
  pub const ALL: [Direction; 3] = [Direction::Output, Direction::Input, Direction::Pullup];

  fn select_prefix(&self) -> &'static str {
    match self {
      Direction::Output => "OUTPUT_SEL",
      Direction::Input => "INPUT_SEL",
      Direction::Pullup => "PULLUP_SEL",
    }
  }

  fn mirror_register(&self) -> &'static str {
    match self {
      Direction::Output => "MIRROR_OUTPUT",
      Direction::Input => "MIRROR_INPUT",
      Direction::Pullup => "MIRROR_PULLUP",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
  Rising,
  Falling,
}
impl Edge {
  fn register(&self) -> &'static str {
    match self {
      Edge::Rising => "PIN_IR_RISING",
      Edge::Falling => "PIN_IR_FALLING",
    }
  }
}

/// The two bits that arm a lane interrupt: the edge-detect bit and the enable bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptEnable {
  pub edge: FieldLocation,
  pub enable: FieldLocation,
}

/// A pin identifier bound to the sub-field of one lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinAssignment {
  pub location: FieldLocation,
  pub pin_id: u8,
}
impl PinAssignment {
  /// `word` with this lane's sub-field replaced by the pin identifier.
  pub fn apply(&self, word: u32) -> RegMapResult<u32> {
    self.location.encode(word, u32::from(self.pin_id))
  }
}

/// The pin-mux view of a register map.
#[derive(Debug, Clone, Copy)]
pub struct PinMux<'m> {
  module: &'m ModuleSpec,
}
impl<'m> PinMux<'m> {
  /// Fails with `MalformedTable` unless all twelve banked select registers exist.
  pub fn new(map: &'m RegisterMap) -> RegMapResult<Self> {
    let pin_mux = Self {
      module: map.module(PIN_MUX_MODULE)?,
    };

    for direction in Direction::ALL.iter() {
      for bank in 0..BANKS {
        if pin_mux.module.register(&bank_name(*direction, bank)).is_none() {
          return Err(RegMapError::malformed(&format!(
            "Module {} has no register {}",
            PIN_MUX_MODULE,
            bank_name(*direction, bank)
          )));
        }
      }
    }

    Ok(pin_mux)
  }

  fn register(&self, name: &str) -> RegMapResult<&'m RegisterSpec> {
    self
      .module
      .register(name)
      .ok_or_else(|| RegMapError::UnknownRegister {
        module: self.module.name.clone(),
        register: name.to_owned(),
      })
  }

  /// The 16-lane field of a bitmap register. A register with no fields is a bare bitmap at
  /// bits 15..0.
  fn bitmap(&self, name: &str) -> RegMapResult<FieldLocation> {
    let register = self.register(name)?;
    let mut lanes = register.fields().filter(|f| f.width() == LANES);

    let bits = match (lanes.next(), lanes.next()) {
      (Some(f), None) => f.bits(),
      (None, None) if register.fields().next().is_none() => BitRange::new(LANES - 1, 0)?,
      _ => {
        return Err(RegMapError::malformed(&format!(
          "Register {}.{} needs exactly one {}-bit lane field",
          PIN_MUX_MODULE, name, LANES
        )))
      }
    };

    Ok(FieldLocation {
      address: register.address,
      bits,
    })
  }

  fn lane_bit(&self, register: &str, lane: u8) -> RegMapResult<FieldLocation> {
    check_lane(lane)?;
    let bitmap = self.bitmap(register)?;

    Ok(FieldLocation {
      address: bitmap.address,
      bits: BitRange::bit(bitmap.lsb() + lane)?,
    })
  }

  /// Routes pin `pin_id` to `lane`. The sub-field value is the pin identifier, not the lane
  /// index.
  pub fn assign(&self, direction: Direction, lane: u8, pin_id: u8) -> RegMapResult<PinAssignment> {
    Ok(PinAssignment {
      location: self.lane_select(direction, lane)?,
      pin_id,
    })
  }

  /// Location of `lane`'s sub-field in the `direction` bank registers.
  pub fn lane_select(&self, direction: Direction, lane: u8) -> RegMapResult<FieldLocation> {
    check_lane(lane)?;
    let bank = lane / LANES_PER_BANK;
    let sub = lane % LANES_PER_BANK;
    let register = self.register(&bank_name(direction, bank))?;

    Ok(FieldLocation {
      address: register.address,
      bits: BitRange::new(8 * sub + 7, 8 * sub)?,
    })
  }

  /// Location of `lane`'s pull-up sub-field. Writing 1 there enables the pull-up.
  pub fn enable_pullup(&self, lane: u8) -> RegMapResult<FieldLocation> {
    self.lane_select(Direction::Pullup, lane)
  }

  /// Location of the full 16-lane mirror bitmap for `direction`.
  pub fn mirror(&self, direction: Direction) -> RegMapResult<FieldLocation> {
    self.bitmap(direction.mirror_register())
  }

  /// Location of `lane`'s bit in the `direction` mirror bitmap.
  pub fn mirror_lane(&self, direction: Direction, lane: u8) -> RegMapResult<FieldLocation> {
    self.lane_bit(direction.mirror_register(), lane)
  }

  /// Locations to set to arm an `edge` interrupt on `lane`.
  pub fn interrupt_enable(&self, lane: u8, edge: Edge) -> RegMapResult<InterruptEnable> {
    Ok(InterruptEnable {
      edge: self.lane_bit(edge.register(), lane)?,
      enable: self.lane_bit("IER", lane)?,
    })
  }

  pub fn interrupt_status(&self, lane: u8) -> RegMapResult<FieldLocation> {
    self.lane_bit("ISR", lane)
  }

  pub fn interrupt_clear(&self, lane: u8) -> RegMapResult<FieldLocation> {
    self.lane_bit("ICR", lane)
  }
}

fn bank_name(direction: Direction, bank: u8) -> String {
  format!("{}_{}", direction.select_prefix(), bank)
}

fn check_lane(lane: u8) -> RegMapResult<()> {
  if lane >= LANES {
    return Err(RegMapError::LaneOutOfRange(lane));
  }
  Ok(())
}
