use log::{debug, warn};
use std::convert::TryFrom;

use crate::{
  codec,
  error::{RegMapError, RegMapResult},
  interconnect::{Interconnect, Route},
  map::FieldLocation,
  module::ModuleSpec,
  pinmux::{Direction, PinMux},
  pins::PinTable,
  register::RegisterSpec,
  transport::Transport,
  RegisterMap,
};

/// Register access over a transport, resolved by name through a `RegisterMap`.
///
/// Every lookup and range check happens before the first transport call, so a failed call
/// never leaves a partial write behind. Transport errors are passed through as they are, with
/// no retries.
pub struct RegisterSession<'m, T: Transport> {
  map: &'m RegisterMap,
  transport: T,
}
impl<'m, T: Transport> RegisterSession<'m, T> {
  pub fn new(map: &'m RegisterMap, transport: T) -> Self {
    Self { map, transport }
  }

  pub fn map(&self) -> &'m RegisterMap {
    self.map
  }

  pub fn transport(&self) -> &T {
    &self.transport
  }

  pub fn transport_mut(&mut self) -> &mut T {
    &mut self.transport
  }

  /// Ends the session and hands back the transport.
  pub fn into_transport(self) -> T {
    self.transport
  }

  fn write_word(&mut self, address: u32, word: u32) -> RegMapResult<()> {
    debug!("write {:#07x} <- {:#010x}", address, word);
    self.transport.write_register(address, word)?;
    Ok(())
  }

  fn read_word(&mut self, address: u32) -> RegMapResult<u32> {
    let word = self.transport.read_register(address)?;
    debug!("read  {:#07x} -> {:#010x}", address, word);
    Ok(word)
  }

  fn writable(&self, module: &str, register: &str) -> RegMapResult<&'m RegisterSpec> {
    let spec = self.map.register(module, register)?;
    if !spec.access.can_write() {
      return Err(RegMapError::AccessViolation {
        module: module.to_owned(),
        register: register.to_owned(),
        access: spec.access,
        attempted: "written",
      });
    }
    Ok(spec)
  }

  fn readable(&self, module: &str, register: &str) -> RegMapResult<&'m RegisterSpec> {
    let spec = self.map.register(module, register)?;
    if !spec.access.can_read() {
      return Err(RegMapError::AccessViolation {
        module: module.to_owned(),
        register: register.to_owned(),
        access: spec.access,
        attempted: "read",
      });
    }
    Ok(spec)
  }

  /// Every register at `address`, each of which must allow writes.
  fn writable_at(&self, address: u32) -> RegMapResult<Vec<&'m RegisterSpec>> {
    let mut specs = Vec::new();
    for (module, spec) in self.located(address)? {
      specs.push(self.writable(&module.name, &spec.name)?);
    }
    Ok(specs)
  }

  fn readable_at(&self, address: u32) -> RegMapResult<Vec<&'m RegisterSpec>> {
    let mut specs = Vec::new();
    for (module, spec) in self.located(address)? {
      specs.push(self.readable(&module.name, &spec.name)?);
    }
    Ok(specs)
  }

  fn located(&self, address: u32) -> RegMapResult<Vec<(&'m ModuleSpec, &'m RegisterSpec)>> {
    let registers = self.map.registers_at(address);
    if registers.is_empty() {
      return Err(RegMapError::UnknownRegister {
        module: "*".to_owned(),
        register: format!("{:#07x}", address),
      });
    }
    Ok(registers)
  }

  /// Rejects a write of `bits` into a selector register unless they hold one of its choices.
  fn check_choice(&self, address: u32, bits: u32) -> RegMapResult<()> {
    for (module, spec) in self.located(address)? {
      let sel = match spec.selector() {
        Some(sel) => sel,
        None => continue,
      };
      let field = sel.field();
      if bits & !field.mask() != 0 || !sel.accepts(field.decode(bits)) {
        return Err(RegMapError::UnknownRoute {
          consumer: module.name.clone(),
          selector: spec.name.clone(),
          producer: format!("{:#x}", bits),
        });
      }
    }
    Ok(())
  }

  /// Read-modify-write of one field. Registers that cannot be read safely are treated as
  /// holding 0. A selector's field only takes one of its choices. Returns the word written.
  pub fn write_field(
    &mut self,
    module: &str,
    register: &str,
    field: &str,
    value: u32,
  ) -> RegMapResult<u32> {
    let spec = self.writable(module, register)?;
    let bits = self.map.field(module, register, field)?.bits();
    codec::check(bits, value)?;
    self.check_choice(spec.address, codec::encode(0, bits, value)?)?;

    let current = if spec.can_read_before_write() {
      self.read_word(spec.address)?
    } else {
      debug!("{}.{} is not read before write", module, register);
      0
    };

    let word = codec::encode(current, bits, value)?;
    self.write_word(spec.address, word)?;
    Ok(word)
  }

  /// Writes one field with every other bit of the register cleared, without reading first.
  pub fn write_field_blind(
    &mut self,
    module: &str,
    register: &str,
    field: &str,
    value: u32,
  ) -> RegMapResult<u32> {
    self.write_fields_blind(module, register, &[(field, value)])
  }

  /// Composes several fields into one word, with all other bits cleared, and writes it without
  /// reading first.
  pub fn write_fields_blind(
    &mut self,
    module: &str,
    register: &str,
    fields: &[(&str, u32)],
  ) -> RegMapResult<u32> {
    let spec = self.writable(module, register)?;

    let mut word = 0;
    for (field, value) in fields.iter() {
      let field = self.map.field(module, register, field)?;
      self.check_choice(spec.address, field.encode(0, *value)?)?;
      word = field.encode(word, *value)?;
    }

    self.write_word(spec.address, word)?;
    Ok(word)
  }

  /// Writes a full register word.
  pub fn write_register(&mut self, module: &str, register: &str, word: u32) -> RegMapResult<()> {
    let spec = self.writable(module, register)?;
    self.check_choice(spec.address, word)?;
    self.write_word(spec.address, word)
  }

  /// Reads a full register word.
  pub fn read_register(&mut self, module: &str, register: &str) -> RegMapResult<u32> {
    let spec = self.readable(module, register)?;
    self.read_word(spec.address)
  }

  pub fn read_field(&mut self, module: &str, register: &str, field: &str) -> RegMapResult<u32> {
    let spec = self.readable(module, register)?;
    let bits = self.map.field(module, register, field)?.bits();
    Ok(codec::decode(self.read_word(spec.address)?, bits))
  }

  /// Whether the field currently reads back as `expected`. A mismatch is logged and reported
  /// as `false`; what to do about it is up to the caller.
  pub fn verify_field(
    &mut self,
    module: &str,
    register: &str,
    field: &str,
    expected: u32,
  ) -> RegMapResult<bool> {
    let actual = self.read_field(module, register, field)?;
    if actual != expected {
      warn!(
        "{}.{}.{} reads back {:#x}, expected {:#x}",
        module, register, field, actual, expected
      );
    }
    Ok(actual == expected)
  }

  /// `write_field` followed by `verify_field`.
  pub fn write_field_verified(
    &mut self,
    module: &str,
    register: &str,
    field: &str,
    value: u32,
  ) -> RegMapResult<bool> {
    self.write_field(module, register, field, value)?;
    self.verify_field(module, register, field, value)
  }

  /// Read-modify-write at a resolved location, with the same checks as `write_field` for every
  /// register at that address. A location outside the map fails with `UnknownRegister`.
  pub fn modify(&mut self, location: FieldLocation, value: u32) -> RegMapResult<u32> {
    codec::check(location.bits, value)?;
    let specs = self.writable_at(location.address)?;
    self.check_choice(location.address, location.encode(0, value)?)?;

    let current = if specs.iter().all(|spec| spec.can_read_before_write()) {
      self.read_word(location.address)?
    } else {
      debug!("{:#07x} is not read before write", location.address);
      0
    };
    let word = location.encode(current, value)?;
    self.write_word(location.address, word)?;
    Ok(word)
  }

  pub fn read_location(&mut self, location: FieldLocation) -> RegMapResult<u32> {
    self.readable_at(location.address)?;
    Ok(location.decode(self.read_word(location.address)?))
  }

  /// Routes `producer` into `consumer` through its `selector` register.
  pub fn connect(&mut self, consumer: &str, selector: &str, producer: &str) -> RegMapResult<Route> {
    let route = Interconnect::new(self.map)?.route(consumer, selector, producer)?;
    debug!("route {} -> {}_{}", producer, consumer, selector);
    self.write_word(route.location.address, route.word)?;
    Ok(route)
  }

  pub fn disconnect(&mut self, consumer: &str, selector: &str) -> RegMapResult<Route> {
    let route = Interconnect::new(self.map)?.disconnect(consumer, selector)?;
    debug!("disconnect {}_{}", consumer, selector);
    self.write_word(route.location.address, route.word)?;
    Ok(route)
  }

  /// Every producer label matching the value currently held by the selector.
  pub fn current_route(&mut self, consumer: &str, selector: &str) -> RegMapResult<Vec<&'m str>> {
    let interconnect = Interconnect::new(self.map)?;
    let location = interconnect.disconnect(consumer, selector)?.location;
    let value = self.read_location(location)?;

    match u8::try_from(value) {
      Ok(value) => interconnect.producers_for(consumer, selector, value),
      Err(_) => Ok(Vec::new()),
    }
  }

  /// Routes pin `pin_id` to `lane` of `direction`, keeping the other lanes of the bank.
  pub fn assign_pin(&mut self, direction: Direction, lane: u8, pin_id: u8) -> RegMapResult<u32> {
    let assignment = PinMux::new(self.map)?.assign(direction, lane, pin_id)?;
    debug!("pin {} -> {:?} lane {}", pin_id, direction, lane);
    self.modify(assignment.location, u32::from(assignment.pin_id))
  }

  /// `assign_pin` with the identifier looked up by name in `pins`.
  pub fn assign_named_pin(
    &mut self,
    direction: Direction,
    lane: u8,
    pins: &PinTable,
    name: &str,
  ) -> RegMapResult<u32> {
    let pin_id = pins.require(name)?;
    self.assign_pin(direction, lane, pin_id)
  }

  pub fn enable_pullup(&mut self, lane: u8) -> RegMapResult<u32> {
    let location = PinMux::new(self.map)?.enable_pullup(lane)?;
    self.modify(location, 1)
  }
}

#[cfg(test)]
mod tests {
  use super::RegisterSession;
  use crate::codec::BitRange;
  use crate::error::RegMapError;
  use crate::field::FieldSpec;
  use crate::module::ModuleSpec;
  use crate::pinmux::Direction;
  use crate::platform::wfg;
  use crate::register::{AccessSpec, RegisterSpec};
  use crate::transport::{Access, MemoryTransport};
  use crate::{FieldLocation, RegisterMap};

  #[test]
  fn write_field_preserves_other_fields() {
    let mut mem = MemoryTransport::new();
    mem.set(0x80004, 0xFFFF_FFFF);
    let mut session = RegisterSession::new(&wfg().unwrap().map, &mut mem);

    let word = session
      .write_field("wfg_drive_spi_top_0", "CFG", "IO_DELAY_COMPENSATION", 5)
      .unwrap();

    assert_eq!(0xFFFF_FF7F, word);
    assert_eq!(0xFFFF_FF7F, mem.get(0x80004));
    assert_eq!(1, mem.reads());
  }

  #[test]
  fn blind_write_does_not_read() {
    let mut mem = MemoryTransport::new();
    mem.set(0x80004, 0xFFFF_FFFF);
    let mut session = RegisterSession::new(&wfg().unwrap().map, &mut mem);

    let word = session
      .write_field_blind("wfg_drive_spi_top_0", "CFG", "CPHA", 1)
      .unwrap();

    assert_eq!(0b10, word);
    assert_eq!(0, mem.reads());
    assert_eq!(vec![(0x80004, 0b10)], mem.writes().collect::<Vec<_>>());
  }

  #[test]
  fn composes_blind_fields() {
    let mut mem = MemoryTransport::new();
    let mut session = RegisterSession::new(&wfg().unwrap().map, &mut mem);

    let word = session
      .write_fields_blind("wfg_drive_i2ct_top_0", "CFG", &[("DEVID", 0x18), ("DATASIZE", 0b01)])
      .unwrap();

    assert_eq!((0x18 << 1) | (0b01 << 16), word);
    assert_eq!(word, mem.get(0x88004));
  }

  #[test]
  fn range_errors_precede_transport() {
    let mut mem = MemoryTransport::new();
    let mut session = RegisterSession::new(&wfg().unwrap().map, &mut mem);

    assert!(matches!(
      session.write_field("wfg_drive_spi_top_0", "CFG", "CPHA", 2),
      Err(RegMapError::ValueOutOfRange { value: 2, width: 1 })
    ));
    assert!(matches!(
      session.write_field("wfg_drive_spi_top_0", "CFG", "CPHASE", 1),
      Err(RegMapError::UnknownField { .. })
    ));
    assert!(matches!(
      session.connect("wfg_drive_spi_top_0", "select_0", "wfg_drive_pat_top_0"),
      Err(RegMapError::UnknownRoute { .. })
    ));
    assert!(matches!(
      session.assign_pin(Direction::Input, 16, 2),
      Err(RegMapError::LaneOutOfRange(16))
    ));

    assert!(mem.accesses().is_empty());
  }

  #[test]
  fn transport_errors_propagate() {
    let mut mem = MemoryTransport::new();
    mem.fail_next_read();
    let mut session = RegisterSession::new(&wfg().unwrap().map, &mut mem);

    assert!(matches!(
      session.write_field("wfg_core_top", "CTRL", "EN", 1),
      Err(RegMapError::Transport(_))
    ));

    session.transport_mut().fail_next_write();
    assert!(matches!(
      session.write_field_blind("wfg_core_top", "CTRL", "EN", 1),
      Err(RegMapError::Transport(_))
    ));
    assert!(mem.writes().next().is_none());
  }

  #[test]
  fn verify_reports_mismatch_without_error() {
    let mut mem = MemoryTransport::new();
    mem.set(0x40000, 1);
    let mut session = RegisterSession::new(&wfg().unwrap().map, &mut mem);

    assert!(session.verify_field("wfg_core_top", "CTRL", "EN", 1).unwrap());
    assert!(!session.verify_field("wfg_core_top", "CTRL", "EN", 0).unwrap());
  }

  #[test]
  fn verified_write_reads_back() {
    let mut mem = MemoryTransport::new();
    let mut session = RegisterSession::new(&wfg().unwrap().map, &mut mem);

    assert!(session
      .write_field_verified("wfg_core_top", "CFG", "SUBCYCLE", 0x1234)
      .unwrap());
    assert_eq!(0x1234, session.read_field("wfg_core_top", "CFG", "SUBCYCLE").unwrap());
    assert_eq!(0x1234_0000, session.read_register("wfg_core_top", "CFG").unwrap());
  }

  #[test]
  fn honours_access_rights() {
    let module = ModuleSpec::new(
      "m",
      vec![
        RegisterSpec::with_fields("ICR", 0x10, vec![FieldSpec::new("PIN", 15, 0).unwrap()])
          .unwrap()
          .access(AccessSpec::WriteOnly),
        RegisterSpec::with_fields("INFO", 0x14, vec![FieldSpec::new("ID", 31, 0).unwrap()])
          .unwrap()
          .access(AccessSpec::ReadOnly),
      ],
    );
    let map = RegisterMap::new(vec![module]).unwrap();
    let mut mem = MemoryTransport::new();
    mem.set(0x10, 0xFFFF);
    let mut session = RegisterSession::new(&map, &mut mem);

    assert_eq!(0x4, session.write_field("m", "ICR", "PIN", 0x4).unwrap());
    assert!(matches!(
      session.read_field("m", "ICR", "PIN"),
      Err(RegMapError::AccessViolation { .. })
    ));
    assert!(matches!(
      session.write_register("m", "INFO", 1),
      Err(RegMapError::AccessViolation { .. })
    ));
    assert_eq!(0, mem.reads());
  }

  #[test]
  fn connects_and_reads_back_routes() {
    let mut mem = MemoryTransport::new();
    let mut session = RegisterSession::new(&wfg().unwrap().map, &mut mem);

    session
      .connect("wfg_record_mem_top_2", "select_0", "wfg_drive_i2ct_top_0")
      .unwrap();
    assert_eq!(0x21, session.transport().get(0x440f2));
    assert_eq!(
      vec!["wfg_drive_i2c_top_0", "wfg_drive_i2ct_top_0"],
      session.current_route("wfg_record_mem_top_2", "select_0").unwrap()
    );

    session.disconnect("wfg_record_mem_top_2", "select_0").unwrap();
    assert_eq!(0, session.transport().get(0x440f2));
    assert_eq!(
      vec!["disconnect"],
      session.current_route("wfg_record_mem_top_2", "select_0").unwrap()
    );
  }

  #[test]
  fn pin_assignments_share_banks() {
    let platform = wfg().unwrap();
    let mut mem = MemoryTransport::new();
    let mut session = RegisterSession::new(&platform.map, &mut mem);

    session
      .assign_named_pin(Direction::Output, 0, &platform.output_pins, "wfg_drive_i2ct_top_0_scl")
      .unwrap();
    session
      .assign_named_pin(Direction::Output, 1, &platform.output_pins, "wfg_drive_i2ct_top_0_sda")
      .unwrap();
    session.enable_pullup(0).unwrap();
    session.enable_pullup(1).unwrap();

    assert_eq!(0x0506, mem.get(0x46000));
    assert_eq!(0x0101, mem.get(0x46010));
    assert!(matches!(
      RegisterSession::new(&platform.map, &mut mem).assign_named_pin(
        Direction::Output,
        2,
        &platform.output_pins,
        "wfg_drive_uart_top_0_rx"
      ),
      Err(RegMapError::UnknownPin(_))
    ));
  }

  #[test]
  fn selector_fields_only_take_choices() {
    let mut mem = MemoryTransport::new();
    let mut session = RegisterSession::new(&wfg().unwrap().map, &mut mem);
    let consumer = "wfg_drive_spi_top_0";
    let register = "wfg_drive_spi_top_0_select_0";

    assert!(matches!(
      session.write_field_blind("wfg_interconnect_top", register, "select", 0x99),
      Err(RegMapError::UnknownRoute { .. })
    ));
    assert!(matches!(
      session.write_field("wfg_interconnect_top", register, "select", 0x99),
      Err(RegMapError::UnknownRoute { .. })
    ));
    assert!(matches!(
      session.write_register("wfg_interconnect_top", register, 0x99),
      Err(RegMapError::UnknownRoute { .. })
    ));
    assert!(session.transport().accesses().is_empty());

    session
      .write_field_blind("wfg_interconnect_top", register, "select", 3)
      .unwrap();
    assert_eq!(
      vec!["wfg_stim_mem_top_2"],
      session.current_route(consumer, "select_0").unwrap()
    );
  }

  fn pin_mux_with(access: AccessSpec, prefix: &str) -> RegisterMap {
    let mut modules: Vec<ModuleSpec> = wfg().unwrap().map.modules().cloned().collect();
    for module in modules.iter_mut().filter(|m| m.name == "wfg_pin_mux_top") {
      for register in module.registers.iter_mut() {
        if register.name.starts_with(prefix) {
          register.access = access;
        }
      }
    }
    RegisterMap::new(modules).unwrap()
  }

  #[test]
  fn pin_helpers_honour_access_rights() {
    let write_only = pin_mux_with(AccessSpec::WriteOnly, "PULLUP_SEL_");
    let mut mem = MemoryTransport::new();
    mem.set(0x46010, 0xFFFF_FFFF);

    assert_eq!(1, RegisterSession::new(&write_only, &mut mem).enable_pullup(0).unwrap());
    assert_eq!(0, mem.reads());
    assert_eq!(vec![(0x46010, 1)], mem.writes().collect::<Vec<_>>());

    let read_only = pin_mux_with(AccessSpec::ReadOnly, "OUTPUT_SEL_");
    let mut mem = MemoryTransport::new();

    assert!(matches!(
      RegisterSession::new(&read_only, &mut mem).assign_pin(Direction::Output, 0, 6),
      Err(RegMapError::AccessViolation { attempted: "written", .. })
    ));
    assert!(mem.accesses().is_empty());
  }

  #[test]
  fn locations_must_be_mapped() {
    let mut mem = MemoryTransport::new();
    let mut session = RegisterSession::new(&wfg().unwrap().map, &mut mem);
    let location = FieldLocation {
      address: 0x4_0ff0,
      bits: BitRange::new(7, 0).unwrap(),
    };

    assert!(matches!(
      session.modify(location, 1),
      Err(RegMapError::UnknownRegister { .. })
    ));
    assert!(matches!(
      session.read_location(location),
      Err(RegMapError::UnknownRegister { .. })
    ));
    assert!(mem.accesses().is_empty());
  }

  #[test]
  fn releases_transport() {
    let session = RegisterSession::new(&wfg().unwrap().map, MemoryTransport::new());

    let mem = session.into_transport();

    assert_eq!(Vec::<Access>::new(), mem.accesses().to_vec());
  }
}
