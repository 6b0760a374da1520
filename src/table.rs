//! Loader for the nested JSON register table:
//! `module -> register -> { "addr", field -> { "MSB", "LSB" } }`.
//!
//! Selector registers use the same shape, but carry `MSB`/`LSB` at register level and list
//! their routing choices as `label -> value` pairs instead of field objects.

use log::trace;
use serde_json::{Map, Value};

use crate::{
  codec::BitRange,
  error::{RegMapError, RegMapResult},
  field::FieldSpec,
  module::ModuleSpec,
  pins::PinTable,
  register::{AccessSpec, RegisterSpec},
  RegisterMap,
};

const ADDR: &str = "addr";
const MSB: &str = "MSB";
const LSB: &str = "LSB";
const ACCESS: &str = "access";
const SIDE_EFFECTING_ON_READ: &str = "side_effecting_on_read";

/// Parses an unsigned integer given either as a JSON number or as a decimal, `0x` hex or `0b`
/// binary string.
pub(crate) fn parse_u32(value: &Value, context: &str) -> RegMapResult<u32> {
  let parsed = match value {
    Value::Number(n) => n.as_u64().filter(|v| *v <= u64::from(u32::MAX)).map(|v| v as u32),
    Value::String(s) => {
      let s = s.trim();
      if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
      } else if let Some(bin) = s.strip_prefix("0b") {
        u32::from_str_radix(bin, 2).ok()
      } else {
        s.parse::<u32>().ok()
      }
    }
    _ => None,
  };

  parsed.ok_or_else(|| {
    RegMapError::malformed(&format!("{}: {} is not an unsigned 32-bit integer", context, value))
  })
}

fn parse_u8(value: &Value, context: &str) -> RegMapResult<u8> {
  let v = parse_u32(value, context)?;
  if v > u32::from(u8::MAX) {
    return Err(RegMapError::malformed(&format!(
      "{}: {:#x} does not fit in 8 bits",
      context, v
    )));
  }
  Ok(v as u8)
}

fn as_object<'a>(value: &'a Value, context: &str) -> RegMapResult<&'a Map<String, Value>> {
  value
    .as_object()
    .ok_or_else(|| RegMapError::malformed(&format!("{}: expected an object", context)))
}

fn bit_range(obj: &Map<String, Value>, context: &str) -> RegMapResult<BitRange> {
  let msb = match obj.get(MSB) {
    Some(v) => parse_u8(v, context)?,
    None => return Err(RegMapError::malformed(&format!("{}: missing MSB", context))),
  };
  let lsb = match obj.get(LSB) {
    Some(v) => parse_u8(v, context)?,
    None => return Err(RegMapError::malformed(&format!("{}: missing LSB", context))),
  };

  BitRange::new(msb, lsb)
    .map_err(|e| RegMapError::malformed(&format!("{}: {}", context, e)))
}

fn parse_register(name: &str, value: &Value, context: &str) -> RegMapResult<RegisterSpec> {
  let context = format!("{}.{}", context, name);
  let obj = as_object(value, &context)?;

  let address = match obj.get(ADDR) {
    Some(v) => parse_u32(v, &context)?,
    None => return Err(RegMapError::malformed(&format!("{}: missing addr", context))),
  };

  let mut fields = Vec::new();
  let mut choices = Vec::new();

  for (key, v) in obj.iter() {
    match key.as_str() {
      ADDR | MSB | LSB | ACCESS | SIDE_EFFECTING_ON_READ => continue,
      _ => {}
    }

    let key_context = format!("{}.{}", context, key);
    match v {
      Value::Object(field) => {
        let bits = bit_range(field, &key_context)?;
        fields.push(FieldSpec::new(key, bits.msb(), bits.lsb())?);
      }
      _ => choices.push((key.clone(), parse_u8(v, &key_context)?)),
    }
  }

  let has_register_range = obj.contains_key(MSB) || obj.contains_key(LSB);

  let register = match (fields.is_empty(), choices.is_empty(), has_register_range) {
    (true, _, true) => {
      RegisterSpec::with_choices(name, address, bit_range(obj, &context)?, choices)?
    }
    (_, true, false) => RegisterSpec::with_fields(name, address, fields)?,
    _ => {
      return Err(RegMapError::malformed(&format!(
        "{}: register mixes field definitions with selector choices",
        context
      )))
    }
  };

  let access = match obj.get(ACCESS) {
    Some(Value::String(s)) => match AccessSpec::parse(s) {
      Some(a) => a,
      None => {
        return Err(RegMapError::malformed(&format!(
          "{}: unknown access '{}'",
          context, s
        )))
      }
    },
    Some(_) => {
      return Err(RegMapError::malformed(&format!(
        "{}: access must be a string",
        context
      )))
    }
    None => AccessSpec::default(),
  };

  let side_effecting = match obj.get(SIDE_EFFECTING_ON_READ) {
    Some(Value::Bool(b)) => *b,
    Some(_) => {
      return Err(RegMapError::malformed(&format!(
        "{}: side_effecting_on_read must be a boolean",
        context
      )))
    }
    None => false,
  };

  Ok(register.access(access).side_effecting_on_read(side_effecting))
}

/// Parses the `registers` object of a table document into a `RegisterMap`.
pub fn parse_registers(value: &Value) -> RegMapResult<RegisterMap> {
  let modules = as_object(value, "registers")?;
  let mut specs = Vec::with_capacity(modules.len());

  for (module_name, registers) in modules.iter() {
    let registers_obj = as_object(registers, module_name)?;
    let registers = registers_obj
      .iter()
      .map(|(name, v)| parse_register(name, v, module_name))
      .collect::<RegMapResult<Vec<RegisterSpec>>>()?;

    trace!("Parsed {} registers for {}", registers.len(), module_name);
    specs.push(ModuleSpec::new(module_name, registers));
  }

  RegisterMap::new(specs)
}

/// Parses a `name -> identifier` pin table.
pub fn parse_pins(value: &Value, context: &str) -> RegMapResult<PinTable> {
  let obj = as_object(value, context)?;
  let pins = obj
    .iter()
    .map(|(name, id)| -> RegMapResult<(String, u8)> {
      Ok((name.clone(), parse_u8(id, &format!("{}.{}", context, name))?))
    })
    .collect::<RegMapResult<Vec<(String, u8)>>>()?;

  PinTable::new(pins)
}

/// Parses a JSON document holding only the nested register table.
pub fn map_from_json(json: &str) -> RegMapResult<RegisterMap> {
  let value: Value = serde_json::from_str(json)?;
  parse_registers(&value)
}
