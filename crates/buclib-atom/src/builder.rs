//! BucBuilder -- fluent builder for constructing [`BucDriver`] instances.
//!
//! Separates configuration from construction so that callers can set up
//! serial line parameters, timeouts, and (for testing) replacement adapters
//! before any link is opened. Building never touches the device; links are
//! opened later by the driver's `select_*` methods.
//!
//! # Example
//!
//! ```no_run
//! use buclib_atom::BucBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> buclib_core::Result<()> {
//! let driver = BucBuilder::new()
//!     .baud_rate(9600)
//!     .read_timeout(Duration::from_millis(500))
//!     .build(|result, kind| println!("Command {kind}: {result}"));
//!
//! driver.select_network("192.168.1.50", 5353).await?;
//! driver.get_serial_number();
//! driver.wait_idle().await;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use buclib_core::transport::Transport;
use buclib_core::types::CommandKind;
use buclib_dispatch::{DEFAULT_BROADCAST_CAPACITY, DispatchQueue};
use buclib_transport::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT, SerialConfig, SerialTransport, TcpTransport,
};

use crate::commands::AtomParser;
use crate::driver::BucDriver;
use crate::selector::TransportSelector;

/// Fluent builder for [`BucDriver`].
///
/// Defaults: 9600 baud 8N1 serial, 1 s read timeout, 5 s TCP connect
/// timeout, and real TCP and serial adapters.
pub struct BucBuilder {
    network: Option<Box<dyn Transport>>,
    serial: Option<Box<dyn Transport>>,
    serial_config: SerialConfig,
    /// Overrides applied on top of `serial_config` at build time, so the
    /// order of setter calls does not matter.
    baud_rate: Option<u32>,
    read_timeout: Option<Duration>,
    connect_timeout: Duration,
    broadcast_capacity: usize,
}

impl BucBuilder {
    pub fn new() -> Self {
        BucBuilder {
            network: None,
            serial: None,
            serial_config: SerialConfig::default(),
            baud_rate: None,
            read_timeout: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
        }
    }

    /// Replace the network adapter (e.g. with a `MockTransport` from
    /// `buclib-test-harness`).
    pub fn network_transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.network = Some(transport);
        self
    }

    /// Replace the serial adapter.
    pub fn serial_transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.serial = Some(transport);
        self
    }

    /// Set every serial line parameter at once.
    ///
    /// [`baud_rate`](Self::baud_rate) and [`read_timeout`](Self::read_timeout)
    /// still take precedence when set, whichever order they are called in.
    pub fn serial_config(mut self, config: SerialConfig) -> Self {
        self.serial_config = config;
        self
    }

    /// Override the serial baud rate (default: 9600).
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = Some(baud);
        self
    }

    /// Set how long either link waits for a complete response (default: 1s).
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Set the TCP connect timeout (default: 5s).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set how many undelivered results each subscriber may lag behind
    /// before it starts missing them (default: 64).
    pub fn broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity;
        self
    }

    /// Build the driver. `callback` receives every result as
    /// `(result, kind)`, exactly once per submitted command.
    pub fn build<F>(self, callback: F) -> BucDriver
    where
        F: Fn(String, CommandKind) + Send + Sync + 'static,
    {
        let serial_config = self.effective_serial_config();
        let read_timeout = self.read_timeout.unwrap_or(DEFAULT_READ_TIMEOUT);
        let network: Box<dyn Transport> = match self.network {
            Some(transport) => transport,
            None => Box::new(TcpTransport::with_timeouts(
                self.connect_timeout,
                read_timeout,
            )),
        };
        let serial: Box<dyn Transport> = match self.serial {
            Some(transport) => transport,
            None => Box::new(SerialTransport::new(serial_config)),
        };

        tracing::debug!(
            read_timeout_ms = read_timeout.as_millis(),
            connect_timeout_ms = self.connect_timeout.as_millis(),
            "Building BUC driver"
        );

        let queue =
            DispatchQueue::with_broadcast_capacity(AtomParser, callback, self.broadcast_capacity);
        BucDriver::new(TransportSelector::new(network, serial), queue)
    }

    /// `serial_config` with the baud-rate and read-timeout overrides applied.
    fn effective_serial_config(&self) -> SerialConfig {
        let mut config = self.serial_config.clone();
        if let Some(baud) = self.baud_rate {
            config.baud_rate = baud;
        }
        if let Some(timeout) = self.read_timeout {
            config.read_timeout = timeout;
        }
        config
    }
}

impl Default for BucBuilder {
    fn default() -> Self {
        Self::new()
    }
}
