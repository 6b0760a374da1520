//! Emulation of an MCP9808 temperature sensor on the I2C target block.

use log::info;

use crate::{
  error::RegMapResult,
  pinmux::Direction,
  pins::PinTable,
  session::RegisterSession,
  transport::Transport,
};

/// The I2C target module acting as the sensor.
pub const I2C_TARGET_MODULE: &str = "wfg_drive_i2ct_top_0";

// CFG.DATASIZE for 16-bit register data.
const DATA_SIZE_16: u32 = 0b01;

/// Parameters of the emulated sensor and of its routing onto the physical pins.
#[derive(Debug, Clone, PartialEq)]
pub struct Mcp9808Emulation {
  /// The I2C address the target answers on.
  pub address: u32,

  /// The sensor register holding the device ID, and its content.
  pub device_id_register: u32,
  pub device_id: u32,

  /// The sensor register holding the ambient temperature.
  pub ambient_register: u32,

  pub scl_lane: u8,
  pub sda_lane: u8,
}
impl Default for Mcp9808Emulation {
  fn default() -> Self {
    Self {
      address: 0x18,
      device_id_register: 0x07,
      device_id: 0x37,
      ambient_register: 0x05,
      scl_lane: 0,
      sda_lane: 1,
    }
  }
}
impl Mcp9808Emulation {
  /// Sets the target address and data size, stores the device ID and enables the target.
  pub fn configure<T: Transport>(&self, session: &mut RegisterSession<T>) -> RegMapResult<()> {
    session.write_fields_blind(
      I2C_TARGET_MODULE,
      "CFG",
      &[("DEVID", self.address), ("DATASIZE", DATA_SIZE_16)],
    )?;
    let devid = session.read_field(I2C_TARGET_MODULE, "CFG", "DEVID")?;
    info!("[I2C_T ADDR] read back {:#x}", devid);

    let stored = self.write_sensor_register(session, self.device_id_register, self.device_id)?;
    info!("[DEV ID] read back {:#x}", stored);

    session.write_field_blind(I2C_TARGET_MODULE, "CTRL", "EN", 1)?;
    let en = session.read_field(I2C_TARGET_MODULE, "CTRL", "EN")?;
    info!("[I2C_T EN] read back {:#x}", en);

    Ok(())
  }

  /// Routes SCL and SDA of the target onto the configured lanes, in both directions, with
  /// pull-ups enabled.
  pub fn route_pins<T: Transport>(
    &self,
    session: &mut RegisterSession<T>,
    output_pins: &PinTable,
    input_pins: &PinTable,
  ) -> RegMapResult<()> {
    let scl = format!("{}_scl", I2C_TARGET_MODULE);
    let sda = format!("{}_sda", I2C_TARGET_MODULE);

    session.assign_named_pin(Direction::Input, self.scl_lane, input_pins, &scl)?;
    session.assign_named_pin(Direction::Input, self.sda_lane, input_pins, &sda)?;
    session.assign_named_pin(Direction::Output, self.scl_lane, output_pins, &scl)?;
    session.assign_named_pin(Direction::Output, self.sda_lane, output_pins, &sda)?;
    session.enable_pullup(self.scl_lane)?;
    session.enable_pullup(self.sda_lane)?;

    Ok(())
  }

  /// Updates the ambient temperature register. Returns the value read back.
  pub fn set_ambient_temperature<T: Transport>(
    &self,
    session: &mut RegisterSession<T>,
    value: u32,
  ) -> RegMapResult<u32> {
    let stored = self.write_sensor_register(session, self.ambient_register, value)?;
    info!("[T_AMB] read back {:#x} // {}", stored, stored);
    Ok(stored)
  }

  fn write_sensor_register<T: Transport>(
    &self,
    session: &mut RegisterSession<T>,
    register: u32,
    value: u32,
  ) -> RegMapResult<u32> {
    session.write_field_blind(I2C_TARGET_MODULE, "REGADDR", "ADDR", register)?;
    session.write_field_blind(I2C_TARGET_MODULE, "REGWDATA", "DATA", value)?;
    session.read_register(I2C_TARGET_MODULE, "REGWDATA")
  }
}

#[cfg(test)]
mod tests {
  use super::Mcp9808Emulation;
  use crate::error::RegMapError;
  use crate::platform::wfg;
  use crate::session::RegisterSession;
  use crate::transport::MemoryTransport;

  #[test]
  fn configures_target() {
    let mut mem = MemoryTransport::new();
    let mut session = RegisterSession::new(&wfg().unwrap().map, &mut mem);

    Mcp9808Emulation::default().configure(&mut session).unwrap();

    assert_eq!(
      vec![
        (0x88004, (0x18 << 1) | (0b01 << 16)),
        (0x88014, 0x07),
        (0x88018, 0x37),
        (0x88000, 1),
      ],
      mem.writes().collect::<Vec<_>>()
    );
  }

  #[test]
  fn routes_pins_onto_first_lanes() {
    let platform = wfg().unwrap();
    let mut mem = MemoryTransport::new();
    let mut session = RegisterSession::new(&platform.map, &mut mem);

    Mcp9808Emulation::default()
      .route_pins(&mut session, &platform.output_pins, &platform.input_pins)
      .unwrap();

    assert_eq!(0x0203, mem.get(0x46020));
    assert_eq!(0x0506, mem.get(0x46000));
    assert_eq!(0x0101, mem.get(0x46010));
  }

  #[test]
  fn updates_ambient_temperature() {
    let mut mem = MemoryTransport::new();
    let mut session = RegisterSession::new(&wfg().unwrap().map, &mut mem);
    let emulation = Mcp9808Emulation::default();

    assert_eq!(30, emulation.set_ambient_temperature(&mut session, 30).unwrap());
    assert_eq!(25, emulation.set_ambient_temperature(&mut session, 25).unwrap());

    assert_eq!(0x05, mem.get(0x88014));
    assert_eq!(25, mem.get(0x88018));
  }

  #[test]
  fn oversized_address_writes_nothing() {
    let mut mem = MemoryTransport::new();
    let mut session = RegisterSession::new(&wfg().unwrap().map, &mut mem);
    let emulation = Mcp9808Emulation {
      address: 0x80,
      ..Mcp9808Emulation::default()
    };

    assert!(matches!(
      emulation.configure(&mut session),
      Err(RegMapError::ValueOutOfRange { value: 0x80, width: 7 })
    ));
    assert!(mem.accesses().is_empty());
  }
}
