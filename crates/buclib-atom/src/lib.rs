//! ATOM block upconverter backend for buclib.
//!
//! This crate implements the ATOM monitor-and-control text protocol and the
//! driver built on it. It provides:
//!
//! - **Protocol** ([`protocol`]) -- request line encoding and the generic
//!   response field rules.
//! - **Command builders** ([`commands`]) -- request strings for each
//!   [`CommandKind`](buclib_core::CommandKind), range-checked where the
//!   device limits arguments, and the parsers that turn responses into
//!   result strings.
//! - **Transport selector** ([`selector`]) -- owns the network and serial
//!   adapters and keeps at most one connected.
//! - **Driver** ([`driver`]) -- non-blocking device operations over the
//!   dispatch queue.
//! - **Builder** ([`builder`]) -- fluent configuration of [`BucDriver`].
//!
//! # Example
//!
//! ```
//! use buclib_atom::commands::{cmd_get_serial_number, parse_response};
//! use buclib_core::CommandKind;
//!
//! let cmd = cmd_get_serial_number();
//! assert_eq!(cmd, "getsn\r");
//!
//! // Simulate the device's reply.
//! let response = "\r\nok sn 123456\r\n";
//! assert_eq!(parse_response(CommandKind::GetSerialNumber, response), "123456");
//! ```

pub mod builder;
pub mod commands;
pub mod driver;
pub mod protocol;
pub mod selector;

pub use builder::BucBuilder;
pub use commands::AtomParser;
pub use driver::BucDriver;
pub use selector::TransportSelector;
