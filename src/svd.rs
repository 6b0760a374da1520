//! Import of register maps from CMSIS-SVD documents.
//!
//! Each peripheral becomes a module. Register and field arrays are expanded, and a register
//! whose single field carries enumerated values becomes an interconnect selector.

use log::{debug, trace};
use std::convert::TryFrom;
use svd_parser::{Device, Field, FieldInfo, Peripheral, Register, RegisterCluster, RegisterInfo};

use crate::{
  codec::BitRange,
  error::{RegMapError, RegMapResult},
  field::FieldSpec,
  module::ModuleSpec,
  register::{AccessSpec, RegisterSpec},
  RegisterMap,
};

/// Parses `xml` as an SVD document and imports it.
pub fn map_from_svd(xml: &str) -> RegMapResult<RegisterMap> {
  map_from_device(&svd_parser::parse(xml)?)
}

/// Imports every peripheral of `device`.
pub fn map_from_device(device: &Device) -> RegMapResult<RegisterMap> {
  let mut modules = Vec::with_capacity(device.peripherals.len());

  let device_access = match device.default_register_properties.access {
    Some(ref a) => AccessSpec::new(a),
    None => AccessSpec::default(),
  };

  for peripheral in device.peripherals.iter() {
    let source = register_source(device, peripheral)?;
    let module =
      module_from_peripheral(source, &peripheral.name, peripheral.base_address, device_access)?;

    debug!(
      "Imported {} with {} registers at {:#07x}",
      module.name,
      module.registers.len(),
      peripheral.base_address
    );
    modules.push(module);
  }

  RegisterMap::new(modules)
}

/// The peripheral whose registers `peripheral` carries: itself, or the nearest `derivedFrom`
/// ancestor that lists registers.
fn register_source<'d>(
  device: &'d Device,
  peripheral: &'d Peripheral,
) -> RegMapResult<&'d Peripheral> {
  let mut current = peripheral;

  for _ in 0..=device.peripherals.len() {
    let derived_from = match (&current.registers, &current.derived_from) {
      (Some(_), _) | (None, None) => return Ok(current),
      (None, Some(df)) => df,
    };

    current = match device.peripherals.iter().find(|p| &p.name == derived_from) {
      Some(p) => p,
      None => {
        return Err(RegMapError::malformed(&format!(
          "Peripheral {}: derives from unknown peripheral {}",
          current.name, derived_from
        )))
      }
    };
    trace!("{} takes its registers from {}", peripheral.name, current.name);
  }

  Err(RegMapError::malformed(&format!(
    "Peripheral {}: 'derivedFrom' chain is circular",
    peripheral.name
  )))
}

/// Converts the registers of `p` into a module called `name`, placed at `base_address`.
/// Registers with no access attribute take the peripheral default, then `fallback`.
pub(crate) fn module_from_peripheral(
  p: &Peripheral,
  name: &str,
  base_address: u32,
  fallback: AccessSpec,
) -> RegMapResult<ModuleSpec> {
  let default_access = match p.default_register_properties.access {
    Some(ref a) => AccessSpec::new(a),
    None => fallback,
  };

  let mut registers = Vec::new();
  for rc in p.registers.iter().flat_map(|rcs| rcs.iter()) {
    match rc {
      RegisterCluster::Register(ref r) => {
        registers.extend(registers_from_svd(r, name, base_address, default_access)?)
      }
      RegisterCluster::Cluster(ref c) => {
        return Err(RegMapError::malformed(&format!(
          "Peripheral {}: cluster {} is not supported",
          name, c.name
        )))
      }
    }
  }

  Ok(ModuleSpec::new(name, registers))
}

fn registers_from_svd(
  r: &Register,
  module: &str,
  base_address: u32,
  default_access: AccessSpec,
) -> RegMapResult<Vec<RegisterSpec>> {
  let specs = match r {
    Register::Single(ref ri) => vec![register_from_info(
      ri,
      &ri.name,
      base_address + ri.address_offset,
      module,
      default_access,
    )?],
    Register::Array(ref ri, ref d) => {
      let dim_indices = match d.dim_index {
        Some(ref di) => {
          if d.dim != di.len() as u32 {
            return Err(RegMapError::malformed(&format!(
              "Register {}.{}: 'dim' element must have the same value as the length of 'dimIndex'",
              module, ri.name
            )));
          }
          di.to_owned()
        }
        None => (0..d.dim).map(|v| v.to_string()).collect(),
      };

      let mut register_specs = Vec::with_capacity(dim_indices.len());
      for (n, dim_index) in dim_indices.iter().enumerate() {
        register_specs.push(register_from_info(
          ri,
          &ri.name.replace("%s", dim_index),
          base_address + ri.address_offset + n as u32 * d.dim_increment,
          module,
          default_access,
        )?);
      }
      register_specs
    }
  };

  Ok(specs)
}

fn register_from_info(
  ri: &RegisterInfo,
  name: &str,
  address: u32,
  module: &str,
  default_access: AccessSpec,
) -> RegMapResult<RegisterSpec> {
  let access = match ri.access {
    Some(ref a) => AccessSpec::new(a),
    None => default_access,
  };

  let svd_fields = match ri.fields {
    Some(ref fields) => fields.as_slice(),
    None => &[],
  };

  let enumerated = svd_fields
    .iter()
    .filter(|f| f.enumerated_values.iter().any(|ev| !ev.values.is_empty()))
    .count();

  let spec = match (svd_fields, enumerated) {
    (_, 0) => {
      let mut fields = Vec::new();
      for f in svd_fields.iter() {
        fields.extend(fields_from_svd(f, module, name)?);
      }
      RegisterSpec::with_fields(name, address, fields)?
    }
    ([Field::Single(ref fi)], 1) => selector_from_info(fi, module, name, address)?,
    _ => {
      return Err(RegMapError::malformed(&format!(
        "Register {}.{}: enumerated values are only supported on a single selector field",
        module, name
      )))
    }
  };

  Ok(spec.access(access))
}

fn fields_from_svd(f: &Field, module: &str, register: &str) -> RegMapResult<Vec<FieldSpec>> {
  match f {
    Field::Single(ref fi) => Ok(vec![field_from_info(
      fi,
      &fi.name,
      fi.bit_range.offset,
      module,
      register,
    )?]),
    Field::Array(ref fi, ref d) => {
      let dim_indices = match d.dim_index {
        Some(ref di) => {
          if d.dim != di.len() as u32 {
            return Err(RegMapError::malformed(&format!(
              "Field {}.{}.{}: 'dim' element must have the same value as the length of 'dimIndex'",
              module, register, fi.name
            )));
          }
          di.to_owned()
        }
        None => (0..d.dim).map(|v| v.to_string()).collect(),
      };

      let mut field_specs = Vec::with_capacity(dim_indices.len());
      for (n, dim_index) in dim_indices.iter().enumerate() {
        field_specs.push(field_from_info(
          fi,
          &fi.name.replace("%s", dim_index),
          fi.bit_range.offset + n as u32 * d.dim_increment,
          module,
          register,
        )?);
      }
      Ok(field_specs)
    }
  }
}

fn field_bits(fi: &FieldInfo, offset: u32, module: &str, register: &str) -> RegMapResult<BitRange> {
  let width = fi.bit_range.width;
  let out_of_range = || {
    RegMapError::malformed(&format!(
      "Field {}.{}.{}: offset {} and width {} do not fit in 32 bits",
      module, register, fi.name, offset, width
    ))
  };

  if width == 0 || offset.checked_add(width).map_or(true, |end| end > 32) {
    return Err(out_of_range());
  }
  let msb = u8::try_from(offset + width - 1).map_err(|_| out_of_range())?;
  let lsb = u8::try_from(offset).map_err(|_| out_of_range())?;
  BitRange::new(msb, lsb)
}

fn field_from_info(
  fi: &FieldInfo,
  name: &str,
  offset: u32,
  module: &str,
  register: &str,
) -> RegMapResult<FieldSpec> {
  let bits = field_bits(fi, offset, module, register)?;
  FieldSpec::new(name, bits.msb(), bits.lsb())
}

fn selector_from_info(
  fi: &FieldInfo,
  module: &str,
  register: &str,
  address: u32,
) -> RegMapResult<RegisterSpec> {
  let bits = field_bits(fi, fi.bit_range.offset, module, register)?;
  if bits.msb() != 7 || bits.lsb() != 0 {
    return Err(RegMapError::malformed(&format!(
      "Selector {}.{}: field must span bits [7:0], not [{}:{}]",
      module,
      register,
      bits.msb(),
      bits.lsb()
    )));
  }

  let mut choices = Vec::new();
  for ev in fi.enumerated_values.iter().flat_map(|evs| evs.values.iter()) {
    let value = match ev.value {
      Some(v) => u8::try_from(v).map_err(|_| {
        RegMapError::malformed(&format!(
          "Selector {}.{}: choice '{}' = {:#x} does not fit in 8 bits",
          module, register, ev.name, v
        ))
      })?,
      None => {
        return Err(RegMapError::malformed(&format!(
          "Selector {}.{}: choice '{}' has no value",
          module, register, ev.name
        )))
      }
    };
    choices.push((ev.name.clone(), value));
  }

  RegisterSpec::with_choices(register, address, bits, choices)
}
