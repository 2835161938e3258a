//! Transport trait for device communication.
//!
//! The [`Transport`] trait abstracts over the physical link to the device.
//! Implementations exist for TCP sockets and serial ports (`buclib-transport`)
//! and for scripted or simulated devices (`buclib-test-harness`).
//!
//! The dispatch queue operates on a `Transport` rather than directly on a
//! socket or serial port, so it never knows which variant carries a command.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::types::CommandKind;

/// Asynchronous line-oriented transport to the device.
///
/// Requests are complete CR-terminated command lines. Responses are returned
/// raw (including any surrounding CR/LF) so that the protocol codec sees
/// exactly what the device sent.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the link.
    ///
    /// `address` is the host name or IP for network links, or an explicit
    /// device path for serial links. `port` is the TCP port or the serial
    /// port number.
    async fn connect(&mut self, address: Option<&str>, port: u32) -> Result<()>;

    /// Close the link. Closing an already-closed link is a no-op.
    async fn disconnect(&mut self) -> Result<()>;

    /// Send one request line.
    ///
    /// `kind` identifies the command being sent. Real links ignore it;
    /// simulated devices use it to pick a canned response.
    async fn write(&mut self, request: &str, kind: CommandKind) -> Result<()>;

    /// Receive one complete response.
    ///
    /// Returns [`Error::Timeout`](crate::error::Error::Timeout) if no full
    /// response arrives within the adapter's read timeout.
    async fn read(&mut self) -> Result<String>;

    /// Check whether the link is currently open.
    fn is_connected(&self) -> bool;
}

/// A transport shared between the selector and every command bound to it.
///
/// The async mutex keeps one write/read exchange atomic with respect to
/// connect and disconnect calls made by the selector.
pub type SharedTransport = Arc<Mutex<Box<dyn Transport>>>;

/// Wrap a boxed transport for sharing.
pub fn shared(transport: Box<dyn Transport>) -> SharedTransport {
    Arc::new(Mutex::new(transport))
}
