//! Register, interconnect and pin-mux access model for the WFG FPGA IP blocks.
//!
//! A `RegisterMap` describes every module of the FPGA image, its registers and their fields.
//! It is loaded from the embedded WFG table (`wfg()`), from a JSON table document, or from a
//! CMSIS-SVD file. `RegisterSession` drives reads and writes through any `Transport`.

mod codec;
mod error;
mod field;
mod interconnect;
mod map;
mod module;
mod pinmux;
mod pins;
mod platform;
mod register;
mod session;
mod table;
mod transport;

pub mod console;
pub mod mcp9808;
pub mod svd;

pub use codec::{decode, encode, BitRange};
pub use error::{RegMapError, RegMapResult, TransportError};
pub use field::FieldSpec;
pub use interconnect::{Interconnect, Route, INTERCONNECT_MODULE};
pub use map::{FieldLocation, RegisterMap};
pub use mcp9808::Mcp9808Emulation;
pub use module::ModuleSpec;
pub use pinmux::{Direction, Edge, InterruptEnable, PinAssignment, PinMux, LANES, PIN_MUX_MODULE};
pub use pins::PinTable;
pub use platform::{wfg, Platform, WFG_TABLE_JSON};
pub use register::{
  AccessSpec, RegisterKind, RegisterSpec, SelectorSpec, DISCONNECT, SELECTOR_FIELD,
};
pub use session::RegisterSession;
pub use table::{map_from_json, parse_pins, parse_registers};
pub use transport::{Access, MemoryTransport, Transport};
