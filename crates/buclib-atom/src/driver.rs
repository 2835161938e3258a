//! BucDriver -- the caller-facing control surface for one ATOM device.
//!
//! Every device operation returns immediately. Results are delivered, in
//! submission order, to the callback given to [`BucBuilder::build`] and to
//! every receiver obtained from [`BucDriver::subscribe`].
//!
//! [`BucBuilder::build`]: crate::builder::BucBuilder::build

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use buclib_core::error::{Error, Result};
use buclib_core::transport::SharedTransport;
use buclib_core::types::{CommandKind, CommandResult, PowerDirection, TransportKind};
use buclib_dispatch::{CommandRecord, DispatchQueue, NO_CONNECTION};

use crate::commands;
use crate::selector::TransportSelector;

/// Control client for an ATOM block upconverter.
///
/// Safe to share between tasks (`Arc<BucDriver>`); transport selection is
/// serialized internally.
pub struct BucDriver {
    selector: tokio::sync::Mutex<TransportSelector>,
    /// Snapshot of the selector's active link, read by the synchronous
    /// submission path.
    active: Mutex<Option<(TransportKind, SharedTransport)>>,
    queue: DispatchQueue,
}

impl BucDriver {
    pub(crate) fn new(selector: TransportSelector, queue: DispatchQueue) -> Self {
        let active = selector.active_transport();
        Self {
            selector: tokio::sync::Mutex::new(selector),
            active: Mutex::new(active),
            queue,
        }
    }

    // -----------------------------------------------------------------
    // Transport selection
    // -----------------------------------------------------------------

    /// Use the network link to `address:port`.
    ///
    /// # Errors
    ///
    /// [`Error::Busy`] while commands are queued or in flight; otherwise the
    /// adapter's connect error, in which case no transport is selected.
    pub async fn select_network(&self, address: &str, port: u16) -> Result<()> {
        let mut selector = self.selector.lock().await;
        self.ensure_idle()?;
        let result = selector.select_network(address, port).await;
        self.publish(&selector);
        result
    }

    /// Use serial port number `port` (`COM<n>` / `/dev/ttyS<n>`).
    pub async fn select_serial(&self, port: u32) -> Result<()> {
        let mut selector = self.selector.lock().await;
        self.ensure_idle()?;
        let result = selector.select_serial(port).await;
        self.publish(&selector);
        result
    }

    /// Use the serial device at `path`.
    pub async fn select_serial_device(&self, path: &str) -> Result<()> {
        let mut selector = self.selector.lock().await;
        self.ensure_idle()?;
        let result = selector.select_serial_device(path).await;
        self.publish(&selector);
        result
    }

    /// Disconnect every link. Subsequent commands report no connection.
    pub async fn disconnect(&self) -> Result<()> {
        let mut selector = self.selector.lock().await;
        self.ensure_idle()?;
        let result = selector.disconnect_all().await;
        self.publish(&selector);
        result
    }

    /// The currently active link kind.
    pub fn communication_type(&self) -> TransportKind {
        self.lock_active()
            .as_ref()
            .map_or(TransportKind::None, |(kind, _)| *kind)
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.queue.is_idle() {
            return Ok(());
        }
        let pending = self.queue.backlog_len() + 1;
        tracing::warn!(pending, "Refusing transport change while commands are pending");
        Err(Error::Busy(format!(
            "{pending} command(s) queued or in flight"
        )))
    }

    fn publish(&self, selector: &TransportSelector) {
        *self.lock_active() = selector.active_transport();
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<(TransportKind, SharedTransport)>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------

    /// Submit a raw request for `kind` on the active link.
    ///
    /// With no link selected the callback is invoked at once with
    /// `"Error: No connection"` and nothing is queued.
    pub fn submit(&self, kind: CommandKind, request: impl Into<String>) {
        let active = self.lock_active().clone();
        match active {
            Some((link, transport)) => {
                let record = CommandRecord::new(kind, request, transport);
                tracing::debug!(kind = %kind, link = %link, "Submitting command");
                self.queue.submit(record);
            }
            None => {
                tracing::debug!(kind = %kind, "No transport selected");
                self.queue.reject(kind, NO_CONNECTION);
            }
        }
    }

    /// Submit a built request, or reject the command if building failed.
    fn submit_built(&self, kind: CommandKind, request: Result<String>) {
        match request {
            Ok(request) => self.submit(kind, request),
            Err(e) => self.queue.reject(kind, format!("Error: {e}")),
        }
    }

    /// Receive every result delivered from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<CommandResult> {
        self.queue.subscribe()
    }

    /// Resolve once every submitted command has completed.
    pub async fn wait_idle(&self) {
        self.queue.wait_idle().await;
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_idle()
    }

    pub fn backlog_len(&self) -> usize {
        self.queue.backlog_len()
    }

    pub fn in_flight(&self) -> Option<CommandKind> {
        self.queue.in_flight()
    }

    // -----------------------------------------------------------------
    // Device operations
    // -----------------------------------------------------------------

    /// Read the temperature of power module 1.
    pub fn get_temperature(&self) {
        self.submit(CommandKind::GetTemperature, commands::cmd_get_temperature());
    }

    /// Read the temperature of power module `id` (1-5).
    pub fn get_temperature_of(&self, id: u8) {
        self.submit_built(
            CommandKind::GetTemperature,
            commands::cmd_get_temperature_of(id),
        );
    }

    pub fn mute(&self) {
        self.submit(CommandKind::MuteBUC, commands::cmd_mute());
    }

    pub fn unmute(&self) {
        self.submit(CommandKind::UnmuteBUC, commands::cmd_unmute());
    }

    pub fn get_mute_state(&self) {
        self.submit(CommandKind::GetMuteState, commands::cmd_get_mute_state());
    }

    pub fn get_attenuation(&self) {
        self.submit(CommandKind::GetAttenuation, commands::cmd_get_attenuation());
    }

    /// Write the attenuator DAT value (0-63).
    pub fn set_attenuation(&self, value: u16) {
        self.submit_built(
            CommandKind::SetAttenuation,
            commands::cmd_set_attenuation(value),
        );
    }

    pub fn get_serial_number(&self) {
        self.submit(
            CommandKind::GetSerialNumber,
            commands::cmd_get_serial_number(),
        );
    }

    /// Read RF forward power.
    pub fn get_power(&self) {
        self.submit(CommandKind::GetPower, commands::cmd_get_power());
    }

    pub fn get_power_direction(&self, direction: PowerDirection) {
        self.submit(
            CommandKind::GetPower,
            commands::cmd_get_power_direction(direction),
        );
    }

    pub fn get_all_faults(&self) {
        self.submit(
            CommandKind::GetStatusOfAllFaults,
            commands::cmd_get_all_faults(),
        );
    }
}
