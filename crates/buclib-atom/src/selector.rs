//! Active-link selection between the network and serial adapters.
//!
//! The selector owns one adapter of each kind for the lifetime of the driver
//! and keeps at most one of them connected. Switching always disconnects the
//! previously selected adapter before connecting the new one.

use std::sync::Arc;

use buclib_core::error::Result;
use buclib_core::transport::{SharedTransport, Transport, shared};
use buclib_core::types::TransportKind;
use buclib_transport::default_device_name;

/// Owns the network and serial adapters and tracks which one is active.
pub struct TransportSelector {
    network: SharedTransport,
    serial: SharedTransport,
    active: TransportKind,
}

impl TransportSelector {
    /// Create a selector with nothing selected. Both adapters are expected
    /// to start disconnected.
    pub fn new(network: Box<dyn Transport>, serial: Box<dyn Transport>) -> Self {
        Self {
            network: shared(network),
            serial: shared(serial),
            active: TransportKind::None,
        }
    }

    /// Select the network adapter, connecting it to `address:port`.
    ///
    /// Does nothing if the network adapter is already active.
    pub async fn select_network(&mut self, address: &str, port: u16) -> Result<()> {
        self.select(TransportKind::Network, Some(address), u32::from(port)).await
    }

    /// Select the serial adapter on numbered port `port` (`COM<n>` on
    /// Windows, `/dev/ttyS<n>` elsewhere).
    ///
    /// Does nothing if the serial adapter is already active.
    pub async fn select_serial(&mut self, port: u32) -> Result<()> {
        let device = default_device_name(port);
        self.select(TransportKind::Serial, Some(&device), port).await
    }

    /// Select the serial adapter on an explicit device path.
    ///
    /// Does nothing if the serial adapter is already active.
    pub async fn select_serial_device(&mut self, path: &str) -> Result<()> {
        self.select(TransportKind::Serial, Some(path), 0).await
    }

    /// The active transport kind ([`TransportKind::None`] until a selection
    /// succeeds).
    pub fn current_kind(&self) -> TransportKind {
        self.active
    }

    /// The active kind with a shared handle to its adapter, or `None`.
    pub fn active_transport(&self) -> Option<(TransportKind, SharedTransport)> {
        match self.active {
            TransportKind::None => None,
            TransportKind::Network => Some((TransportKind::Network, Arc::clone(&self.network))),
            TransportKind::Serial => Some((TransportKind::Serial, Arc::clone(&self.serial))),
        }
    }

    /// Disconnect both adapters and clear the selection.
    pub async fn disconnect_all(&mut self) -> Result<()> {
        self.active = TransportKind::None;
        let network = self.network.lock().await.disconnect().await;
        let serial = self.serial.lock().await.disconnect().await;
        tracing::info!("All transports disconnected");
        network.and(serial)
    }

    async fn select(&mut self, kind: TransportKind, address: Option<&str>, port: u32) -> Result<()> {
        if self.active == kind {
            tracing::debug!(kind = %kind, "Transport already selected");
            return Ok(());
        }

        let (previous, next) = match kind {
            TransportKind::Network => (Arc::clone(&self.serial), Arc::clone(&self.network)),
            TransportKind::Serial => (Arc::clone(&self.network), Arc::clone(&self.serial)),
            TransportKind::None => return self.disconnect_all().await,
        };

        tracing::debug!(from = %self.active, to = %kind, "Switching transport");

        if let Err(e) = previous.lock().await.disconnect().await {
            tracing::warn!(
                error = %e,
                "Failed to disconnect previous transport (continuing anyway)"
            );
        }
        self.active = TransportKind::None;

        match next.lock().await.connect(address, port).await {
            Ok(()) => {
                tracing::info!(kind = %kind, address = address.unwrap_or("-"), port, "Transport selected");
                self.active = kind;
                Ok(())
            }
            Err(e) => {
                tracing::error!(kind = %kind, error = %e, "Failed to connect transport");
                Err(e)
            }
        }
    }
}
