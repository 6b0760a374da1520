use log::trace;
use once_cell::sync::OnceCell;
use regex::Regex;

use super::{field::FieldSpec, module::ModuleSpec, register::RegisterSpec};
use crate::{
  codec::{self, BitRange},
  error::{RegMapError, RegMapResult},
};

static IDENTIFIER: OnceCell<Regex> = OnceCell::new();
static FIELD_NAME: OnceCell<Regex> = OnceCell::new();

fn identifier() -> RegMapResult<&'static Regex> {
  Ok(IDENTIFIER.get_or_try_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$"))?)
}

// Pin-mux lane fields are numeric and reserved fields are unnamed.
fn field_name() -> RegMapResult<&'static Regex> {
  Ok(FIELD_NAME.get_or_try_init(|| Regex::new(r"^[A-Za-z0-9_]*$"))?)
}

/// The concrete location of a field: the register address plus the bit range within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldLocation {
  pub address: u32,
  pub bits: BitRange,
}
impl FieldLocation {
  pub fn msb(&self) -> u8 {
    self.bits.msb()
  }

  pub fn lsb(&self) -> u8 {
    self.bits.lsb()
  }

  pub fn mask(&self) -> u32 {
    self.bits.mask()
  }

  pub fn encode(&self, word: u32, value: u32) -> RegMapResult<u32> {
    codec::encode(word, self.bits, value)
  }

  pub fn decode(&self, word: u32) -> u32 {
    codec::decode(word, self.bits)
  }
}

/// The full collection of modules. This is the root lookup structure for every register access.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterMap {
  modules: Vec<ModuleSpec>,
}
impl RegisterMap {
  /// Builds a map from `modules`, rejecting malformed tables. A register listed twice with the
  /// same name, address and contents is kept once.
  pub fn new(modules: Vec<ModuleSpec>) -> RegMapResult<Self> {
    let mut map = Self {
      modules: Vec::with_capacity(modules.len()),
    };

    for module in modules.into_iter() {
      if !identifier()?.is_match(&module.name) {
        return Err(RegMapError::malformed(&format!(
          "Module name '{}' is not an identifier",
          module.name
        )));
      }
      if map.modules.iter().any(|m| m.name == module.name) {
        return Err(RegMapError::malformed(&format!(
          "Module '{}' is defined twice",
          module.name
        )));
      }

      let checked = Self::check_module(module)?;
      trace!(
        "Loaded module {} with {} registers",
        checked.name,
        checked.registers.len()
      );
      map.modules.push(checked);
    }

    Ok(map)
  }

  fn check_module(module: ModuleSpec) -> RegMapResult<ModuleSpec> {
    let mut registers: Vec<RegisterSpec> = Vec::with_capacity(module.registers.len());

    for register in module.registers.into_iter() {
      Self::check_names(&module.name, &register)?;

      if let Some(existing) = registers
        .iter()
        .find(|r| r.name == register.name || r.address == register.address)
      {
        if *existing == register {
          continue;
        }

        let msg = if existing.name != register.name {
          format!(
            "Module {}: registers '{}' and '{}' both claim address {:#x}",
            module.name, existing.name, register.name, register.address
          )
        } else {
          format!(
            "Module {}: register '{}' is defined twice with different contents",
            module.name, register.name
          )
        };
        return Err(RegMapError::malformed(&msg));
      }

      registers.push(register);
    }

    Ok(ModuleSpec::new(&module.name, registers))
  }

  fn check_names(module: &str, register: &RegisterSpec) -> RegMapResult<()> {
    if !identifier()?.is_match(&register.name) {
      return Err(RegMapError::malformed(&format!(
        "Module {}: register name '{}' is not an identifier",
        module, register.name
      )));
    }

    for field in register.fields() {
      if !field_name()?.is_match(&field.name) {
        return Err(RegMapError::malformed(&format!(
          "Register {}.{}: field name '{}' is not an identifier",
          module, register.name, field.name
        )));
      }
    }

    if let Some(selector) = register.selector() {
      for (label, _) in selector.choices() {
        if !identifier()?.is_match(label) {
          return Err(RegMapError::malformed(&format!(
            "Selector {}.{}: label '{}' is not an identifier",
            module, register.name, label
          )));
        }
      }
    }

    Ok(())
  }

  /// Iterates the modules in table order.
  pub fn modules(&self) -> impl Iterator<Item = &ModuleSpec> {
    self.modules.iter()
  }

  /// Iterates every register of every module.
  pub fn iter_registers(&self) -> impl Iterator<Item = (&ModuleSpec, &RegisterSpec)> {
    self
      .modules
      .iter()
      .flat_map(|m| m.registers.iter().map(move |r| (m, r)))
  }

  pub fn module(&self, name: &str) -> RegMapResult<&ModuleSpec> {
    match self.modules.iter().find(|m| m.name == name) {
      Some(m) => Ok(m),
      None => Err(RegMapError::UnknownModule(name.to_owned())),
    }
  }

  pub fn register(&self, module: &str, register: &str) -> RegMapResult<&RegisterSpec> {
    match self.module(module)?.register(register) {
      Some(r) => Ok(r),
      None => Err(RegMapError::UnknownRegister {
        module: module.to_owned(),
        register: register.to_owned(),
      }),
    }
  }

  pub fn field(&self, module: &str, register: &str, field: &str) -> RegMapResult<&FieldSpec> {
    match self.register(module, register)?.field(field) {
      Some(f) => Ok(f),
      None => Err(RegMapError::UnknownField {
        module: module.to_owned(),
        register: register.to_owned(),
        field: field.to_owned(),
      }),
    }
  }

  /// Resolves `module.register.field` to an address and bit range. With no field, the whole
  /// 32-bit register is selected.
  pub fn resolve(
    &self,
    module: &str,
    register: &str,
    field: Option<&str>,
  ) -> RegMapResult<FieldLocation> {
    let address = self.register(module, register)?.address;
    let bits = match field {
      Some(f) => self.field(module, register, f)?.bits(),
      None => BitRange::FULL,
    };

    Ok(FieldLocation { address, bits })
  }

  /// Every register mapped at `address`, across all modules.
  pub fn registers_at(&self, address: u32) -> Vec<(&ModuleSpec, &RegisterSpec)> {
    self
      .iter_registers()
      .filter(|(_, r)| r.address == address)
      .collect()
  }
}
