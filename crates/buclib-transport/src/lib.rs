//! Transport adapters for buclib.
//!
//! This crate provides concrete implementations of the
//! [`Transport`](buclib_core::Transport) trait from `buclib-core`:
//!
//! - [`TcpTransport`]: the device's Ethernet M&C interface
//! - [`SerialTransport`]: the device's RS-232 M&C port or a USB virtual COM port
//!
//! Both adapters share the CR/LF response framing in [`framing`].
//!
//! # Example
//!
//! ```no_run
//! use buclib_core::{CommandKind, Transport};
//! use buclib_transport::TcpTransport;
//!
//! # async fn example() -> buclib_core::Result<()> {
//! let mut transport = TcpTransport::new();
//! transport.connect(Some("192.168.1.50"), 5353).await?;
//!
//! transport.write("getdat\r", CommandKind::GetAttenuation).await?;
//! let response = transport.read().await?;
//! assert!(response.contains("value"));
//! # Ok(())
//! # }
//! ```

pub mod framing;
pub mod serial;
pub mod tcp;

pub use serial::{
    DataBits, FlowControl, Parity, SerialConfig, SerialTransport, StopBits, default_device_name,
};
pub use tcp::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT, TcpTransport};
