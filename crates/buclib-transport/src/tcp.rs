//! TCP transport for device communication.
//!
//! This module provides [`TcpTransport`], which implements the [`Transport`]
//! trait for devices reachable over Ethernet. The adapter is created
//! disconnected and opened by the transport selector through
//! [`Transport::connect`].
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
//! transport.write("getsn\r", CommandKind::GetSerialNumber).await?;
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
use tokio::net::TcpStream;

use crate::framing::{discard_stale, map_io_error, read_response};

/// Default connection timeout (5 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time allowed for one complete response (1 second).
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// TCP transport for device communication.
#[derive(Debug)]
pub struct TcpTransport {
    /// The underlying TCP stream, `None` while disconnected.
    stream: Option<TcpStream>,
    /// The `host:port` string for logging/debugging.
    addr: String,
    /// Bytes received but not yet returned as a response.
    pending: Vec<u8>,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl TcpTransport {
    /// Create a disconnected transport with default timeouts.
    pub fn new() -> Self {
        Self::with_timeouts(DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT)
    }

    /// Create a disconnected transport with explicit timeouts.
    pub fn with_timeouts(connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            stream: None,
            addr: String::new(),
            pending: Vec::new(),
            connect_timeout,
            read_timeout,
        }
    }

    /// Get the address string of the last connection attempt.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&mut self, address: Option<&str>, port: u32) -> Result<()> {
        let host = address.ok_or_else(|| {
            Error::InvalidParameter("network transport requires a host address".into())
        })?;
        let port = u16::try_from(port)
            .map_err(|_| Error::InvalidParameter(format!("TCP port {port} out of range")))?;

        if self.stream.is_some() {
            self.disconnect().await?;
        }

        let addr = format!("{host}:{port}");
        self.addr = addr.clone();
        self.pending.clear();

        tracing::debug!(
            addr = %addr,
            timeout_ms = self.connect_timeout.as_millis(),
            "Connecting to TCP endpoint"
        );

        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| {
                tracing::error!(addr = %addr, "TCP connection timed out");
                Error::Timeout
            })?
            .map_err(|e| {
                tracing::error!(addr = %addr, error = %e, "TCP connection failed");
                map_connect_error(e, &addr)
            })?;

        // Requests are a few bytes each; don't let Nagle hold them back.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(
                addr = %addr,
                error = %e,
                "Failed to set TCP_NODELAY (continuing anyway)"
            );
        }

        tracing::info!(addr = %addr, "TCP connection established");
        self.stream = Some(stream);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.pending.clear();
        if let Some(mut stream) = self.stream.take() {
            tracing::debug!(addr = %self.addr, "Closing TCP connection");

            if let Err(e) = stream.shutdown().await {
                tracing::warn!(
                    addr = %self.addr,
                    error = %e,
                    "Failed to shutdown TCP stream (continuing anyway)"
                );
            }

            tracing::info!(addr = %self.addr, "TCP connection closed");
        }
        Ok(())
    }

    async fn write(&mut self, request: &str, kind: CommandKind) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        tracing::trace!(addr = %self.addr, kind = %kind, request = ?request, "Sending request");

        // Anything still buffered belongs to an earlier exchange, typically a
        // reply that arrived after its read timed out.
        discard_stale(stream, &mut self.pending, &self.addr).await;

        stream.write_all(request.as_bytes()).await.map_err(|e| {
            tracing::error!(addr = %self.addr, error = %e, "Failed to send data");
            map_io_error(e)
        })?;
        stream.flush().await.map_err(|e| {
            tracing::error!(addr = %self.addr, error = %e, "Failed to flush TCP stream");
            map_io_error(e)
        })?;

        Ok(())
    }

    async fn read(&mut self) -> Result<String> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
        read_response(stream, &mut self.pending, self.read_timeout, &self.addr).await
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if self.stream.is_some() {
            tracing::debug!(addr = %self.addr, "TcpTransport dropped, closing connection");
        }
    }
}

/// Map a connection-time I/O error to the appropriate [`Error`] variant.
fn map_connect_error(e: std::io::Error, addr: &str) -> Error {
    match e.kind() {
        std::io::ErrorKind::ConnectionRefused => {
            Error::Transport(format!("connection refused: {}", addr))
        }
        _ => Error::Io(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Bind a listener on a random port and return it with its port number.
    async fn test_listener() -> (TcpListener, u32) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port() as u32;
        (listener, port)
    }

    #[tokio::test]
    async fn connect_write_read() {
        let (listener, port) = test_listener().await;

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 64];
            let n = stream.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"getsn\r");
            stream.write_all(b"\r\nok sn 123456\r\n").await.unwrap();
            stream.flush().await.unwrap();
        });

        let mut transport = TcpTransport::new();
        assert!(!transport.is_connected());
        transport.connect(Some("127.0.0.1"), port).await.unwrap();
        assert!(transport.is_connected());
        assert_eq!(transport.addr(), format!("127.0.0.1:{port}"));

        transport
            .write("getsn\r", CommandKind::GetSerialNumber)
            .await
            .unwrap();
        let response = transport.read().await.unwrap();
        assert_eq!(response, "\r\nok sn 123456\r\n");

        transport.disconnect().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn connect_requires_address() {
        let mut transport = TcpTransport::new();
        let result = transport.connect(None, 5353).await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn connect_rejects_port_out_of_range() {
        let mut transport = TcpTransport::new();
        let result = transport.connect(Some("127.0.0.1"), 70_000).await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn connect_refused() {
        let (listener, port) = test_listener().await;
        drop(listener);

        let mut transport = TcpTransport::new();
        let err = transport
            .connect(Some("127.0.0.1"), port)
            .await
            .unwrap_err();
        match &err {
            Error::Transport(msg) => assert!(
                msg.contains("connection refused"),
                "expected 'connection refused' in message, got: {}",
                msg
            ),
            other => panic!("expected Transport error, got: {:?}", other),
        }
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn read_timeout() {
        let (listener, port) = test_listener().await;

        let server = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let mut transport =
            TcpTransport::with_timeouts(DEFAULT_CONNECT_TIMEOUT, Duration::from_millis(100));
        transport.connect(Some("127.0.0.1"), port).await.unwrap();

        let result = transport.read().await;
        assert!(matches!(result, Err(Error::Timeout)));

        transport.disconnect().await.unwrap();
        server.abort();
    }

    #[tokio::test]
    async fn write_while_disconnected() {
        let mut transport = TcpTransport::new();
        let result = transport.write("getdat\r", CommandKind::GetAttenuation).await;
        assert!(matches!(result, Err(Error::NotConnected)));
        let result = transport.read().await;
        assert!(matches!(result, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let (listener, port) = test_listener().await;

        let server = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let mut transport = TcpTransport::new();
        transport.connect(Some("127.0.0.1"), port).await.unwrap();
        transport.disconnect().await.unwrap();
        assert!(!transport.is_connected());
        transport.disconnect().await.unwrap();
        assert!(!transport.is_connected());

        server.abort();
    }

    #[tokio::test]
    async fn peer_close_reports_connection_lost() {
        let (listener, port) = test_listener().await;

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let mut transport = TcpTransport::new();
        transport.connect(Some("127.0.0.1"), port).await.unwrap();
        server.await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let result = transport.read().await;
        assert!(
            matches!(result, Err(Error::ConnectionLost)),
            "expected ConnectionLost, got: {:?}",
            result
        );
    }

    #[tokio::test]
    async fn stale_data_is_discarded_before_request() {
        let (listener, port) = test_listener().await;

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"\r\nok sn 999\r\n").await.unwrap();
            let mut buf = [0u8; 64];
            let n = stream.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"getdat\r");
            stream.write_all(b"\r\nok value 5\r\n").await.unwrap();
        });

        let mut transport = TcpTransport::new();
        transport.connect(Some("127.0.0.1"), port).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        transport
            .write("getdat\r", CommandKind::GetAttenuation)
            .await
            .unwrap();
        assert_eq!(transport.read().await.unwrap(), "\r\nok value 5\r\n");

        server.await.unwrap();
    }

    #[tokio::test]
    async fn multiple_exchanges() {
        let (listener, port) = test_listener().await;

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 64];
            for reply in [&b"\r\nok\r\n"[..], b"\r\nok value 1\r\n"] {
                let n = stream.read(&mut buf).await.unwrap();
                assert!(n > 0);
                stream.write_all(reply).await.unwrap();
                stream.flush().await.unwrap();
            }
        });

        let mut transport = TcpTransport::new();
        transport.connect(Some("127.0.0.1"), port).await.unwrap();

        transport
            .write("setdat value 1\r", CommandKind::SetAttenuation)
            .await
            .unwrap();
        assert_eq!(transport.read().await.unwrap(), "\r\nok\r\n");

        transport
            .write("getdat\r", CommandKind::GetAttenuation)
            .await
            .unwrap();
        assert_eq!(transport.read().await.unwrap(), "\r\nok value 1\r\n");

        transport.disconnect().await.unwrap();
        server.await.unwrap();
    }
}
