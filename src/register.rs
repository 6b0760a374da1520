use super::field::FieldSpec;
use crate::{
  codec::BitRange,
  error::{RegMapError, RegMapResult},
};

/// Name of the field that spans the value bits of a selector register.
pub const SELECTOR_FIELD: &str = "select";

/// Label that every selector register must map to 0.
pub const DISCONNECT: &str = "disconnect";

/// The access rights of a register.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AccessSpec {
  ReadOnly,
  ReadWrite,
  ReadWriteOnce,
  WriteOnce,
  WriteOnly,
}
impl AccessSpec {
  pub fn new(access: &svd_parser::Access) -> AccessSpec {
    match access {
      svd_parser::Access::ReadOnly => AccessSpec::ReadOnly,
      svd_parser::Access::ReadWrite => AccessSpec::ReadWrite,
      svd_parser::Access::ReadWriteOnce => AccessSpec::ReadWriteOnce,
      svd_parser::Access::WriteOnce => AccessSpec::WriteOnce,
      svd_parser::Access::WriteOnly => AccessSpec::WriteOnly,
    }
  }

  /// Parses the SVD spelling of an access right (`read-write`, `write-only`, ...).
  pub fn parse(s: &str) -> Option<AccessSpec> {
    match s {
      "read-only" => Some(AccessSpec::ReadOnly),
      "read-write" => Some(AccessSpec::ReadWrite),
      "read-writeOnce" => Some(AccessSpec::ReadWriteOnce),
      "writeOnce" => Some(AccessSpec::WriteOnce),
      "write-only" => Some(AccessSpec::WriteOnly),
      _ => None,
    }
  }

  pub fn can_read(&self) -> bool {
    match self {
      AccessSpec::ReadOnly | AccessSpec::ReadWrite | AccessSpec::ReadWriteOnce => true,
      _ => false,
    }
  }

  pub fn can_write(&self) -> bool {
    match self {
      AccessSpec::ReadWrite
      | AccessSpec::ReadWriteOnce
      | AccessSpec::WriteOnce
      | AccessSpec::WriteOnly => true,
      _ => false,
    }
  }
}
impl Default for AccessSpec {
  fn default() -> Self {
    AccessSpec::ReadWrite
  }
}

/// The closed set of routing choices held by an interconnect selector register.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorSpec {
  field: FieldSpec,
  choices: Vec<(String, u8)>,
}
impl SelectorSpec {
  /// The field holding the selected enumerant.
  pub fn field(&self) -> &FieldSpec {
    &self.field
  }

  /// All label/value pairs, in table order.
  pub fn choices(&self) -> impl Iterator<Item = (&str, u8)> {
    self.choices.iter().map(|(l, v)| (l.as_str(), *v))
  }

  /// The value selecting `label`, if it is one of the choices.
  pub fn value(&self, label: &str) -> Option<u8> {
    self
      .choices
      .iter()
      .find(|(l, _)| l == label)
      .map(|(_, v)| *v)
  }

  /// Whether `value` is one of the choices.
  pub fn accepts(&self, value: u32) -> bool {
    self.choices.iter().any(|(_, v)| u32::from(*v) == value)
  }

  /// Every label mapped to `value`. Several producers may share one value.
  pub fn labels_for(&self, value: u8) -> Vec<&str> {
    self
      .choices
      .iter()
      .filter(|(_, v)| *v == value)
      .map(|(l, _)| l.as_str())
      .collect()
  }
}

/// Whether a register holds arbitrary fields or a closed set of routing enumerants.
#[derive(Debug, Clone, PartialEq)]
pub enum RegisterKind {
  Fields(Vec<FieldSpec>),
  Enumerants(SelectorSpec),
}

/// Describes one addressable 32-bit register word.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterSpec {
  /// Name that identifies the register. Must be unique within its module.
  pub name: String,

  /// The byte address of the register. Always accessed as a full 32-bit word.
  pub address: u32,

  /// The access rights of the register.
  pub access: AccessSpec,

  /// Reading the register changes hardware state, so read-modify-write must not read it.
  pub side_effecting_on_read: bool,

  pub kind: RegisterKind,
}
impl RegisterSpec {
  /// A plain register holding `fields`. Field ranges may overlap, but names must be unique
  /// unless the duplicate is identical.
  pub fn with_fields(name: &str, address: u32, fields: Vec<FieldSpec>) -> RegMapResult<Self> {
    let mut unique: Vec<FieldSpec> = Vec::with_capacity(fields.len());

    for field in fields.into_iter() {
      match unique.iter().find(|f| f.name == field.name) {
        Some(existing) if *existing == field => continue,
        Some(_) => {
          return Err(RegMapError::malformed(&format!(
            "Register {}: field '{}' is defined twice with different bit ranges",
            name, field.name
          )))
        }
        None => unique.push(field),
      }
    }

    Ok(Self {
      name: name.to_owned(),
      address,
      access: AccessSpec::default(),
      side_effecting_on_read: false,
      kind: RegisterKind::Fields(unique),
    })
  }

  /// An interconnect selector register whose bits hold one of `choices`.
  pub fn with_choices(
    name: &str,
    address: u32,
    bits: BitRange,
    choices: Vec<(String, u8)>,
  ) -> RegMapResult<Self> {
    match choices.iter().find(|(l, _)| l == DISCONNECT) {
      Some((_, 0)) => {}
      Some((_, v)) => {
        return Err(RegMapError::malformed(&format!(
          "Selector {}: '{}' must map to 0, not {:#x}",
          name, DISCONNECT, v
        )))
      }
      None => {
        return Err(RegMapError::malformed(&format!(
          "Selector {}: no '{}' choice",
          name, DISCONNECT
        )))
      }
    }

    for (label, value) in choices.iter() {
      if !bits.fits(u32::from(*value)) {
        return Err(RegMapError::malformed(&format!(
          "Selector {}: choice '{}' = {:#x} does not fit in bits [{}:{}]",
          name,
          label,
          value,
          bits.msb(),
          bits.lsb()
        )));
      }
      if choices.iter().filter(|(l, _)| l == label).count() > 1 {
        return Err(RegMapError::malformed(&format!(
          "Selector {}: choice '{}' is listed twice",
          name, label
        )));
      }
    }

    Ok(Self {
      name: name.to_owned(),
      address,
      access: AccessSpec::default(),
      side_effecting_on_read: false,
      kind: RegisterKind::Enumerants(SelectorSpec {
        field: FieldSpec::from_bits(SELECTOR_FIELD, bits),
        choices,
      }),
    })
  }

  pub fn access(mut self, access: AccessSpec) -> Self {
    self.access = access;
    self
  }

  pub fn side_effecting_on_read(mut self, side_effecting: bool) -> Self {
    self.side_effecting_on_read = side_effecting;
    self
  }

  /// Iterates the fields of this register. A selector exposes its single selector field.
  pub fn fields<'a>(&'a self) -> Box<dyn Iterator<Item = &FieldSpec> + 'a> {
    match self.kind {
      RegisterKind::Fields(ref fields) => Box::new(fields.iter()),
      RegisterKind::Enumerants(ref sel) => Box::new(std::iter::once(&sel.field)),
    }
  }

  pub fn field(&self, name: &str) -> Option<&FieldSpec> {
    self.fields().find(|f| f.name == name)
  }

  pub fn selector(&self) -> Option<&SelectorSpec> {
    match self.kind {
      RegisterKind::Enumerants(ref sel) => Some(sel),
      RegisterKind::Fields(_) => None,
    }
  }

  pub fn is_selector(&self) -> bool {
    self.selector().is_some()
  }

  /// Whether a read-modify-write may read this register first.
  pub fn can_read_before_write(&self) -> bool {
    self.access.can_read() && !self.side_effecting_on_read
  }
}
