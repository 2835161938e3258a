//! buclib-core: Core traits, types, and error definitions for buclib.
//!
//! This crate defines the device-agnostic abstractions shared by the
//! transport adapters, the dispatch queue, and the ATOM protocol driver.
//!
//! # Key types
//!
//! - [`CommandKind`] -- the closed set of device operations
//! - [`TransportKind`] -- which physical link is active
//! - [`Transport`] -- line-level communication channel
//! - [`CommandResult`] -- one delivered command result
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod transport;
pub mod types;

pub use error::{Error, Result};
pub use transport::{SharedTransport, Transport, shared};
pub use types::*;
