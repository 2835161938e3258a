//! Mock TCP device for network-level testing.
//!
//! [`MockTcpServer`] listens on localhost and plays the device side of the
//! text protocol from a script, so that a real `TcpTransport` (and
//! everything above it) can be exercised without hardware.
//!
//! # Example
//!
//! ```
//! use buclib_test_harness::MockTcpServer;
//!
//! # async fn example() -> buclib_core::Result<()> {
//! let mut server = MockTcpServer::new().await?;
//!
//! // When the client sends "getsn\r", respond with the serial number.
//! server.expect("getsn\r", "\r\nok sn 123456\r\n");
//! server.start();
//!
//! let port = server.port();
//! // ... connect a TcpTransport to 127.0.0.1:port and test ...
//! server.wait().await.map_err(buclib_core::Error::Protocol)?;
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use buclib_core::error::{Error, Result};

/// A pre-loaded request/response pair for the mock TCP server.
#[derive(Debug, Clone)]
struct TcpExpectation {
    /// The exact text we expect the client to send.
    request: String,
    /// The text to send back once the request has been received.
    response: String,
    /// Pause before answering.
    delay: Duration,
}

/// A mock device reachable over TCP.
///
/// The listener is bound in [`new`](MockTcpServer::new) and handed to the
/// server task by [`start`](MockTcpServer::start), so a client may connect
/// as soon as `new` returns. The task accepts a single connection and
/// processes expectations in order. A mismatched request ends the task with
/// an error that [`wait`](MockTcpServer::wait) reports.
pub struct MockTcpServer {
    listener: Option<TcpListener>,
    port: u16,
    expectations: VecDeque<TcpExpectation>,
    server_handle: Option<JoinHandle<std::result::Result<Vec<String>, String>>>,
}

impl MockTcpServer {
    /// Bind a new mock server to a random port on 127.0.0.1.
    pub async fn new() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| Error::Transport(format!("failed to bind mock TCP server: {e}")))?;
        let port = listener.local_addr()?.port();
        tracing::debug!(port, "Mock TCP server bound");

        Ok(Self {
            listener: Some(listener),
            port,
            expectations: VecDeque::new(),
            server_handle: None,
        })
    }

    /// Add an expected request/response pair.
    pub fn expect(&mut self, request: &str, response: &str) {
        self.expect_delayed(request, response, Duration::ZERO);
    }

    /// Add an expected request whose response is sent after `delay`.
    pub fn expect_delayed(&mut self, request: &str, response: &str, delay: Duration) {
        self.expectations.push_back(TcpExpectation {
            request: request.to_string(),
            response: response.to_string(),
            delay,
        });
    }

    /// TCP port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` address the server is listening on.
    pub fn addr(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    /// Spawn the server task.
    ///
    /// Calling `start` twice has no effect; the listener is consumed by the
    /// first call.
    pub fn start(&mut self) {
        let Some(listener) = self.listener.take() else {
            tracing::warn!(port = self.port, "Mock TCP server already started");
            return;
        };
        let expectations: Vec<TcpExpectation> = self.expectations.drain(..).collect();

        let handle = tokio::spawn(async move {
            let (mut stream, peer) = listener
                .accept()
                .await
                .map_err(|e| format!("failed to accept connection: {e}"))?;
            tracing::debug!(peer = %peer, "Mock TCP server accepted client");

            let mut received = Vec::with_capacity(expectations.len());
            for (i, expectation) in expectations.iter().enumerate() {
                let want = expectation.request.as_bytes();
                let mut buf = vec![0u8; want.len()];
                let mut total_read = 0;

                while total_read < want.len() {
                    let n = stream
                        .read(&mut buf[total_read..])
                        .await
                        .map_err(|e| format!("expectation {i}: read error: {e}"))?;
                    if n == 0 {
                        return Err(format!(
                            "expectation {i}: client disconnected after {total_read} bytes (expected {})",
                            want.len()
                        ));
                    }
                    total_read += n;
                }

                let got = String::from_utf8_lossy(&buf).into_owned();
                if buf != want {
                    return Err(format!(
                        "expectation {i}: request mismatch: expected {:?}, got {got:?}",
                        expectation.request
                    ));
                }
                received.push(got);

                if !expectation.delay.is_zero() {
                    tokio::time::sleep(expectation.delay).await;
                }

                stream
                    .write_all(expectation.response.as_bytes())
                    .await
                    .map_err(|e| format!("expectation {i}: write error: {e}"))?;
                stream
                    .flush()
                    .await
                    .map_err(|e| format!("expectation {i}: flush error: {e}"))?;
            }

            Ok(received)
        });

        self.server_handle = Some(handle);
    }

    /// Wait for the server task to finish.
    ///
    /// Returns every request received, in order, or the first mismatch.
    pub async fn wait(self) -> std::result::Result<Vec<String>, String> {
        match self.server_handle {
            Some(handle) => handle
                .await
                .map_err(|e| format!("server task panicked: {e}"))?,
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn plays_script() {
        let mut server = MockTcpServer::new().await.unwrap();
        server.expect("getsn\r", "\r\nok sn 123456\r\n");
        server.start();

        let mut client = TcpStream::connect(server.addr()).await.unwrap();
        client.write_all(b"getsn\r").await.unwrap();
        let mut buf = [0u8; 32];
        let mut total = 0;
        while total < 16 {
            total += client.read(&mut buf[total..]).await.unwrap();
        }
        assert_eq!(&buf[..total], b"\r\nok sn 123456\r\n");

        assert_eq!(server.wait().await.unwrap(), ["getsn\r"]);
    }

    #[tokio::test]
    async fn reports_mismatch() {
        let mut server = MockTcpServer::new().await.unwrap();
        server.expect("getdat\r", "\r\nok value 1\r\n");
        server.start();

        let mut client = TcpStream::connect(server.addr()).await.unwrap();
        client.write_all(b"getsn\r\n").await.unwrap();

        let err = server.wait().await.unwrap_err();
        assert!(err.contains("request mismatch"), "got: {err}");
    }

    #[tokio::test]
    async fn wait_without_start() {
        let server = MockTcpServer::new().await.unwrap();
        assert!(server.wait().await.unwrap().is_empty());
    }
}
