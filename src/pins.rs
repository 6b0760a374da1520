use crate::error::{RegMapError, RegMapResult};

/// Name to pin-identifier table for one direction, as declared by the driver modules. Pin
/// identifiers are the values written into pin-mux sub-fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PinTable {
  pins: Vec<(String, u8)>,
}
impl PinTable {
  /// Names and identifiers must both be unique. An identifier is what the pin-mux sub-field
  /// holds, so `name` can only map it back to one pin.
  pub fn new(pins: Vec<(String, u8)>) -> RegMapResult<Self> {
    for (name, id) in pins.iter() {
      if pins.iter().filter(|(n, _)| n == name).count() > 1 {
        return Err(RegMapError::malformed(&format!(
          "Pin '{}' is listed twice",
          name
        )));
      }
      if pins.iter().filter(|(_, i)| i == id).count() > 1 {
        return Err(RegMapError::malformed(&format!(
          "Pin identifier {} is used by more than one pin",
          id
        )));
      }
    }
    Ok(Self { pins })
  }

  pub fn id(&self, name: &str) -> Option<u8> {
    self
      .pins
      .iter()
      .find(|(n, _)| n == name)
      .map(|(_, id)| *id)
  }

  pub fn name(&self, id: u8) -> Option<&str> {
    self
      .pins
      .iter()
      .find(|(_, i)| *i == id)
      .map(|(n, _)| n.as_str())
  }

  /// Looks up `name`, failing with `UnknownPin`.
  pub fn require(&self, name: &str) -> RegMapResult<u8> {
    self
      .id(name)
      .ok_or_else(|| RegMapError::UnknownPin(name.to_owned()))
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, u8)> {
    self.pins.iter().map(|(n, id)| (n.as_str(), *id))
  }

  pub fn len(&self) -> usize {
    self.pins.len()
  }

  pub fn is_empty(&self) -> bool {
    self.pins.is_empty()
  }
}
