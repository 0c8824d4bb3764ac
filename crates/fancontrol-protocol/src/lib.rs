//! Fan Controller Serial Protocol
//!
//! This crate provides types and utilities for talking to the fan/temperature
//! controller firmware over a byte-oriented serial link. Every exchange is a
//! short, strictly ordered conversation driven by the host.
//!
//! # Protocol Overview
//!
//! ```text
//! host                         device
//!  | -- HELLO ------------------> |
//!  | <------------------- ACK --- |
//!  | -- opcode, channel --------> |
//!  |                              |
//!  |   SET_*:  -- value -------->  |
//!  |           <------- RCVD ---   |
//!  |                              |
//!  |   GET_*:  <-- 4 x u16 -----   |
//!  |           -- RCVD -------->   |
//! ```
//!
//! Multi-byte fields are little-endian. Signed status fields are carried as
//! `value + 32768` in an unsigned 16-bit field.
//!
//! # Example
//!
//! ```rust,ignore
//! use fancontrol_protocol::{Command, CommandEngine, CommandKind};
//!
//! let mut engine = CommandEngine::new(transport);
//! let mut command = Command::new(CommandKind::SetTarget, 1, Some(21.5))?;
//! engine.execute(&mut command)?;
//! ```

mod codec;
mod commands;
mod constants;
mod engine;
mod error;
mod responses;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
mod transport;

pub use codec::*;
pub use commands::*;
pub use constants::*;
pub use engine::*;
pub use error::*;
pub use responses::*;
pub use transport::*;
