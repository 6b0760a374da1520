use super::register::RegisterSpec;

/// Describes the registers of one IP block instance, e.g. `wfg_drive_spi_top_0`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleSpec {
  /// Name of the module. Must be unique for the entire register map.
  pub name: String,

  /// Registers belonging to this module, in table order.
  pub registers: Vec<RegisterSpec>,
}
impl ModuleSpec {
  pub fn new(name: &str, registers: Vec<RegisterSpec>) -> Self {
    Self {
      name: name.to_owned(),
      registers,
    }
  }

  pub fn register(&self, name: &str) -> Option<&RegisterSpec> {
    self.registers.iter().find(|r| r.name == name)
  }

  /// Iterates the selector registers of this module.
  pub fn iter_selectors(&self) -> impl Iterator<Item = &RegisterSpec> {
    self.registers.iter().filter(|r| r.is_selector())
  }

  /// Lowest register address in the module, if it has any registers.
  pub fn base_address(&self) -> Option<u32> {
    self.registers.iter().map(|r| r.address).min()
  }
}
