//! Serial port transport for device communication.
//!
//! This module provides [`SerialTransport`], which implements the [`Transport`]
//! trait for the device's RS-232 monitor-and-control port (or a USB virtual COM
//! port in front of it). The adapter is created disconnected; the transport
//! selector opens it with [`Transport::connect`], passing either an explicit
//! device path or a port number.
//!
//! # Example
//!
//! ```no_run
//! use buclib_core::{CommandKind, Transport};
//! use buclib_transport::{SerialConfig, SerialTransport};
//!
//! # async fn example() -> buclib_core::Result<()> {
//! let mut transport = SerialTransport::new(SerialConfig::default());
//! transport.connect(Some("/dev/ttyUSB0"), 0).await?;
//!
//! transport.write("getmute\r", CommandKind::GetMuteState).await?;
//! let response = transport.read().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use buclib_core::error::{Error, Result};
use buclib_core::transport::Transport;
use buclib_core::types::CommandKind;
use tokio::io::AsyncWriteExt;
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};

use crate::framing::{discard_stale, map_io_error, read_response};

/// Serial port configuration.
///
/// The device's M&C port runs 9600 baud, 8 data bits, no parity, 1 stop bit,
/// no flow control, which is what [`Default`] produces.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Baud rate (e.g., 9600, 19200, 38400, 115200)
    pub baud_rate: u32,
    /// Number of data bits (typically 8)
    pub data_bits: DataBits,
    /// Number of stop bits (typically 1)
    pub stop_bits: StopBits,
    /// Parity checking (typically None)
    pub parity: Parity,
    /// Flow control (typically None)
    pub flow_control: FlowControl,
    /// Time allowed for one complete response.
    pub read_timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
            read_timeout: Duration::from_secs(1),
        }
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Seven,
    Eight,
}

impl From<DataBits> for tokio_serial::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Seven => tokio_serial::DataBits::Seven,
            DataBits::Eight => tokio_serial::DataBits::Eight,
        }
    }
}

/// Number of stop bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

impl From<StopBits> for tokio_serial::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => tokio_serial::StopBits::One,
            StopBits::Two => tokio_serial::StopBits::Two,
        }
    }
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for tokio_serial::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Odd => tokio_serial::Parity::Odd,
            Parity::Even => tokio_serial::Parity::Even,
        }
    }
}

/// Flow control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl From<FlowControl> for tokio_serial::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => tokio_serial::FlowControl::None,
            FlowControl::Software => tokio_serial::FlowControl::Software,
            FlowControl::Hardware => tokio_serial::FlowControl::Hardware,
        }
    }
}

/// Platform device name for a numbered serial port.
///
/// `COM<n>` on Windows, `/dev/ttyS<n>` elsewhere.
pub fn default_device_name(port: u32) -> String {
    if cfg!(windows) {
        format!("COM{port}")
    } else {
        format!("/dev/ttyS{port}")
    }
}

/// Serial port transport for device communication.
pub struct SerialTransport {
    /// The underlying serial port stream, `None` while disconnected.
    port: Option<SerialStream>,
    /// Device path of the last connection attempt, for logging.
    port_name: String,
    config: SerialConfig,
    /// Bytes received but not yet returned as a response.
    pending: Vec<u8>,
}

impl SerialTransport {
    /// Create a disconnected transport with the given line settings.
    pub fn new(config: SerialConfig) -> Self {
        Self {
            port: None,
            port_name: String::new(),
            config,
            pending: Vec::new(),
        }
    }

    /// Get the device path of the last connection attempt.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn connect(&mut self, address: Option<&str>, port: u32) -> Result<()> {
        if self.port.is_some() {
            self.disconnect().await?;
        }

        let path = address
            .map(str::to_string)
            .unwrap_or_else(|| default_device_name(port));
        self.port_name = path.clone();
        self.pending.clear();

        let config = &self.config;
        tracing::debug!(
            port = %path,
            baud_rate = config.baud_rate,
            data_bits = ?config.data_bits,
            stop_bits = ?config.stop_bits,
            parity = ?config.parity,
            flow_control = ?config.flow_control,
            "Opening serial port"
        );

        let stream = tokio_serial::new(&path, config.baud_rate)
            .data_bits(config.data_bits.into())
            .stop_bits(config.stop_bits.into())
            .parity(config.parity.into())
            .flow_control(config.flow_control.into())
            .open_native_async()
            .map_err(|e| {
                tracing::error!(port = %path, error = %e, "Failed to open serial port");
                Error::Transport(format!("Failed to open serial port {}: {}", path, e))
            })?;

        tracing::info!(port = %path, baud_rate = config.baud_rate, "Serial port opened successfully");
        self.port = Some(stream);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.pending.clear();
        if let Some(mut port) = self.port.take() {
            tracing::debug!(port = %self.port_name, "Closing serial port");

            if let Err(e) = port.flush().await {
                tracing::warn!(
                    port = %self.port_name,
                    error = %e,
                    "Failed to flush before closing (continuing anyway)"
                );
            }

            tracing::info!(port = %self.port_name, "Serial port closed");
        }
        Ok(())
    }

    async fn write(&mut self, request: &str, kind: CommandKind) -> Result<()> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        tracing::trace!(port = %self.port_name, kind = %kind, request = ?request, "Sending request");

        // A late reply to a timed-out read may still be queued in the driver.
        if let Err(e) = port.clear(ClearBuffer::Input) {
            tracing::warn!(port = %self.port_name, error = %e, "Failed to clear serial input buffer");
        }
        discard_stale(port, &mut self.pending, &self.port_name).await;

        port.write_all(request.as_bytes()).await.map_err(|e| {
            tracing::error!(port = %self.port_name, error = %e, "Failed to send data");
            map_io_error(e)
        })?;
        port.flush().await.map_err(|e| {
            tracing::error!(port = %self.port_name, error = %e, "Failed to flush serial port");
            map_io_error(e)
        })?;

        Ok(())
    }

    async fn read(&mut self) -> Result<String> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;
        read_response(
            port,
            &mut self.pending,
            self.config.read_timeout,
            &self.port_name,
        )
        .await
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if self.port.is_some() {
            tracing::debug!(port = %self.port_name, "SerialTransport dropped, closing port");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_config_default() {
        let config = SerialConfig::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.stop_bits, StopBits::One);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.flow_control, FlowControl::None);
        assert_eq!(config.read_timeout, Duration::from_secs(1));
    }

    #[test]
    fn line_setting_conversions() {
        assert_eq!(
            tokio_serial::DataBits::from(DataBits::Seven),
            tokio_serial::DataBits::Seven
        );
        assert_eq!(
            tokio_serial::StopBits::from(StopBits::Two),
            tokio_serial::StopBits::Two
        );
        assert_eq!(
            tokio_serial::Parity::from(Parity::Even),
            tokio_serial::Parity::Even
        );
        assert_eq!(
            tokio_serial::FlowControl::from(FlowControl::Hardware),
            tokio_serial::FlowControl::Hardware
        );
    }

    #[test]
    fn default_device_name_uses_platform_convention() {
        let name = default_device_name(3);
        if cfg!(windows) {
            assert_eq!(name, "COM3");
        } else {
            assert_eq!(name, "/dev/ttyS3");
        }
    }

    #[tokio::test]
    async fn new_transport_is_disconnected() {
        let mut transport = SerialTransport::new(SerialConfig::default());
        assert!(!transport.is_connected());
        let result = transport.write("getsn\r", CommandKind::GetSerialNumber).await;
        assert!(matches!(result, Err(Error::NotConnected)));
        let result = transport.read().await;
        assert!(matches!(result, Err(Error::NotConnected)));
        transport.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn connect_to_missing_device_fails() {
        let mut transport = SerialTransport::new(SerialConfig::default());
        let result = transport
            .connect(Some("/nonexistent/buclib-test-port"), 0)
            .await;
        assert!(matches!(result, Err(Error::Transport(_))));
        assert_eq!(transport.port_name(), "/nonexistent/buclib-test-port");
        assert!(!transport.is_connected());
    }
}
