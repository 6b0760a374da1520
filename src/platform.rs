use log::debug;
use once_cell::sync::OnceCell;
use serde_json::Value;

use crate::{
  error::{RegMapError, RegMapResult},
  pins::PinTable,
  table::{parse_pins, parse_registers, parse_u32},
  RegisterMap,
};

/// The register table of the WFG FPGA image, embedded at build time.
pub const WFG_TABLE_JSON: &str = include_str!("../data/wfg_registers.json");

static WFG: OnceCell<Platform> = OnceCell::new();

/// A complete table document: the register map together with the static pin tables of the
/// driver modules.
#[derive(Debug, Clone, PartialEq)]
pub struct Platform {
  /// Base address of the stimulus/record memory window.
  pub memory_base: u32,

  /// Output pin identifiers, selected through the `OUTPUT_SEL` banks.
  pub output_pins: PinTable,

  /// Input pin identifiers, selected through the `INPUT_SEL` banks.
  pub input_pins: PinTable,

  pub map: RegisterMap,
}
impl Platform {
  /// Loads a document with `memory`, `output_pins`, `input_pins` and `registers` keys. Only
  /// `registers` is required.
  pub fn from_json(json: &str) -> RegMapResult<Self> {
    let doc: Value = serde_json::from_str(json)?;
    let root = doc
      .as_object()
      .ok_or_else(|| RegMapError::malformed("Table document must be an object"))?;

    let map = match root.get("registers") {
      Some(r) => parse_registers(r)?,
      None => return Err(RegMapError::malformed("Table document has no 'registers'")),
    };

    let memory_base = match root.get("memory") {
      Some(v) => parse_u32(v, "memory")?,
      None => 0,
    };

    let output_pins = match root.get("output_pins") {
      Some(v) => parse_pins(v, "output_pins")?,
      None => PinTable::default(),
    };

    let input_pins = match root.get("input_pins") {
      Some(v) => parse_pins(v, "input_pins")?,
      None => PinTable::default(),
    };

    debug!(
      "Loaded table with {} modules, {} output pins, {} input pins",
      map.modules().count(),
      output_pins.len(),
      input_pins.len()
    );

    Ok(Self {
      memory_base,
      output_pins,
      input_pins,
      map,
    })
  }

  /// Wraps a bare register map, with no pin tables.
  pub fn from_map(map: RegisterMap) -> Self {
    Self {
      memory_base: 0,
      output_pins: PinTable::default(),
      input_pins: PinTable::default(),
      map,
    }
  }
}

/// The embedded WFG table, parsed once per process.
pub fn wfg() -> RegMapResult<&'static Platform> {
  WFG.get_or_try_init(|| Platform::from_json(WFG_TABLE_JSON))
}

#[cfg(test)]
mod tests {
  use super::{wfg, Platform};

  #[test]
  fn resolves_core_enable() {
    let loc = wfg()
      .unwrap()
      .map
      .resolve("wfg_core_top", "CTRL", Some("EN"))
      .unwrap();

    assert_eq!(0x40000, loc.address);
    assert_eq!(0, loc.msb());
    assert_eq!(0, loc.lsb());
  }

  #[test]
  fn resolves_spi_clock_phase() {
    let loc = wfg()
      .unwrap()
      .map
      .resolve("wfg_drive_spi_top_0", "CFG", Some("CPHA"))
      .unwrap();

    assert_eq!(0x80004, loc.address);
    assert_eq!(1, loc.msb());
    assert_eq!(1, loc.lsb());
  }

  #[test]
  fn keeps_reserved_uart_field() {
    let ctrl = wfg()
      .unwrap()
      .map
      .register("wfg_drive_uart_top_1", "CTRL")
      .unwrap();

    assert_eq!(0x86100, ctrl.address);
    assert!(ctrl.field("").unwrap().is_reserved());
  }

  #[test]
  fn loads_pins_and_memory() {
    let platform = wfg().unwrap();

    assert_eq!(0x20000, platform.memory_base);
    assert_eq!(Some(6), platform.output_pins.id("wfg_drive_i2ct_top_0_scl"));
    assert_eq!(Some(2), platform.input_pins.id("wfg_drive_i2ct_top_0_sda"));
    assert_eq!(30, platform.output_pins.len());
    assert_eq!(10, platform.input_pins.len());
  }

  #[test]
  fn lists_every_block_instance() {
    let names: Vec<&str> = wfg().unwrap().map.modules().map(|m| m.name.as_str()).collect();

    assert_eq!(20, names.len());
    assert!(names.contains(&"wfg_interconnect_top"));
    assert!(names.contains(&"wfg_pin_mux_top"));
    assert!(names.contains(&"wfg_record_mem_top_3"));
  }

  #[test]
  fn minimal_document_needs_registers() {
    assert!(Platform::from_json(r##"{ "memory": 0 }"##).is_err());

    let platform = Platform::from_json(r##"{ "registers": {} }"##).unwrap();
    assert!(platform.output_pins.is_empty());
    assert_eq!(0, platform.memory_base);
  }
}
