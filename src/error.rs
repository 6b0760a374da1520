use anyhow::Error as AnyhowError;
use std::fmt;
use thiserror::Error;

use crate::register::AccessSpec;

/// Convenience type for a result that may contain a `RegMapError`.
pub type RegMapResult<T> = std::result::Result<T, RegMapError>;

/// Error raised by the transport collaborator. The core never interprets it; it is carried
/// through to the caller exactly as the transport produced it.
#[derive(Debug)]
pub struct TransportError(AnyhowError);
impl TransportError {
  pub fn new<E>(err: E) -> TransportError
  where
    E: Into<AnyhowError>,
  {
    TransportError(err.into())
  }

  pub fn msg(msg: &str) -> TransportError {
    TransportError(AnyhowError::msg(msg.to_owned()))
  }

  /// The underlying error produced by the transport.
  pub fn inner(&self) -> &AnyhowError {
    &self.0
  }
}
impl fmt::Display for TransportError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}
impl std::error::Error for TransportError {}

/// Error enum for all errors thrown by this crate or the crates on which it depends.
#[derive(Debug, Error)]
pub enum RegMapError {
  #[error("No module named '{0}'")]
  UnknownModule(String),

  #[error("Module '{module}' has no register named '{register}'")]
  UnknownRegister { module: String, register: String },

  #[error("Register '{module}.{register}' has no field named '{field}'")]
  UnknownField {
    module: String,
    register: String,
    field: String,
  },

  #[error("Selector '{consumer}_{selector}' has no route from '{producer}'")]
  UnknownRoute {
    consumer: String,
    selector: String,
    producer: String,
  },

  #[error("No pin named '{0}' in the pin table")]
  UnknownPin(String),

  #[error("Lane {0} is out of range (0-15)")]
  LaneOutOfRange(u8),

  #[error("Value {value:#x} does not fit in a {width}-bit field")]
  ValueOutOfRange { value: u32, width: u8 },

  #[error("Register '{module}.{register}' is {access:?} and cannot be {attempted}")]
  AccessViolation {
    module: String,
    register: String,
    access: AccessSpec,
    attempted: &'static str,
  },

  #[error("Malformed register table: {0}")]
  MalformedTable(String),

  #[error("Transport error: {0}")]
  Transport(#[from] TransportError),
}
impl RegMapError {
  pub(crate) fn malformed(msg: &str) -> RegMapError {
    RegMapError::MalformedTable(msg.to_owned())
  }
}
impl From<AnyhowError> for RegMapError {
  fn from(err: AnyhowError) -> Self {
    RegMapError::malformed(&format!("anyhow::Error {:?}", err))
  }
}
impl From<serde_json::Error> for RegMapError {
  fn from(err: serde_json::Error) -> Self {
    RegMapError::malformed(&format!("serde_json::Error {}", err))
  }
}
impl From<regex::Error> for RegMapError {
  fn from(err: regex::Error) -> Self {
    RegMapError::malformed(&format!("regex::Error {:?}", err))
  }
}
