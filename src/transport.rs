use log::trace;
use std::collections::BTreeMap;

use crate::error::TransportError;

/// The register read/write primitives of the link to the FPGA. One request is outstanding at a
/// time; each call returns when the device has answered it.
pub trait Transport {
  fn write_register(&mut self, address: u32, value: u32) -> Result<(), TransportError>;

  fn read_register(&mut self, address: u32) -> Result<u32, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
  fn write_register(&mut self, address: u32, value: u32) -> Result<(), TransportError> {
    (**self).write_register(address, value)
  }

  fn read_register(&mut self, address: u32) -> Result<u32, TransportError> {
    (**self).read_register(address)
  }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
  fn write_register(&mut self, address: u32, value: u32) -> Result<(), TransportError> {
    (**self).write_register(address, value)
  }

  fn read_register(&mut self, address: u32) -> Result<u32, TransportError> {
    (**self).read_register(address)
  }
}

/// One access recorded by `MemoryTransport`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
  Read { address: u32, value: u32 },
  Write { address: u32, value: u32 },
}

/// A simulated register file. Unwritten addresses read as 0. Every access is recorded, and the
/// next read or write can be made to fail.
#[derive(Debug, Default)]
pub struct MemoryTransport {
  registers: BTreeMap<u32, u32>,
  log: Vec<Access>,
  fail_next_read: bool,
  fail_next_write: bool,
}
impl MemoryTransport {
  pub fn new() -> Self {
    Self::default()
  }

  /// Presets `address` without recording an access.
  pub fn set(&mut self, address: u32, value: u32) {
    self.registers.insert(address, value);
  }

  /// The stored value at `address`, without recording an access.
  pub fn get(&self, address: u32) -> u32 {
    self.registers.get(&address).copied().unwrap_or(0)
  }

  pub fn accesses(&self) -> &[Access] {
    &self.log
  }

  pub fn writes(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
    self.log.iter().filter_map(|a| match a {
      Access::Write { address, value } => Some((*address, *value)),
      Access::Read { .. } => None,
    })
  }

  pub fn reads(&self) -> usize {
    self
      .log
      .iter()
      .filter(|a| matches!(a, Access::Read { .. }))
      .count()
  }

  pub fn clear_log(&mut self) {
    self.log.clear();
  }

  pub fn fail_next_read(&mut self) {
    self.fail_next_read = true;
  }

  pub fn fail_next_write(&mut self) {
    self.fail_next_write = true;
  }
}
impl Transport for MemoryTransport {
  fn write_register(&mut self, address: u32, value: u32) -> Result<(), TransportError> {
    if self.fail_next_write {
      self.fail_next_write = false;
      return Err(TransportError::msg(&format!(
        "Simulated write failure at {:#07x}",
        address
      )));
    }
    trace!("mem write {:#07x} <- {:#010x}", address, value);
    self.registers.insert(address, value);
    self.log.push(Access::Write { address, value });
    Ok(())
  }

  fn read_register(&mut self, address: u32) -> Result<u32, TransportError> {
    if self.fail_next_read {
      self.fail_next_read = false;
      return Err(TransportError::msg(&format!(
        "Simulated read failure at {:#07x}",
        address
      )));
    }
    let value = self.get(address);
    trace!("mem read {:#07x} -> {:#010x}", address, value);
    self.log.push(Access::Read { address, value });
    Ok(value)
  }
}

#[cfg(test)]
mod tests {
  use super::{Access, MemoryTransport, Transport};

  #[test]
  fn stores_and_logs() {
    let mut mem = MemoryTransport::new();

    mem.write_register(0x88004, 0x30).unwrap();
    assert_eq!(0x30, mem.read_register(0x88004).unwrap());
    assert_eq!(0, mem.read_register(0x88008).unwrap());

    assert_eq!(
      &[
        Access::Write { address: 0x88004, value: 0x30 },
        Access::Read { address: 0x88004, value: 0x30 },
        Access::Read { address: 0x88008, value: 0 },
      ],
      mem.accesses()
    );
    assert_eq!(2, mem.reads());
  }

  #[test]
  fn injected_failures_fire_once() {
    let mut mem = MemoryTransport::new();

    mem.fail_next_write();
    assert!(mem.write_register(0, 1).is_err());
    assert!(mem.write_register(0, 1).is_ok());

    mem.fail_next_read();
    assert!(mem.read_register(0).is_err());
    assert_eq!(1, mem.read_register(0).unwrap());
  }

  #[test]
  fn works_through_mutable_reference() {
    fn poke<T: Transport>(mut t: T) {
      t.write_register(4, 9).unwrap();
    }

    let mut mem = MemoryTransport::new();
    poke(&mut mem);

    assert_eq!(9, mem.get(4));
  }
}
