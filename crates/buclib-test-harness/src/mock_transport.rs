//! Mock transport for deterministic testing of the dispatcher and driver.
//!
//! [`MockTransport`] implements the [`Transport`] trait with pre-loaded
//! request/response pairs. Every call it receives is appended to a shared
//! [`Journal`], so tests can still observe the adapter after it has been
//! boxed and handed to the transport selector.
//!
//! # Example
//!
//! ```
//! use buclib_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new("network");
//! // When the driver sends this request, reply with this response.
//! mock.expect("getsn\r", "\r\nok sn 123456\r\n");
//! let journal = mock.journal();
//! assert!(journal.entries().is_empty());
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use buclib_core::error::{Error, Result};
use buclib_core::transport::Transport;
use buclib_core::types::CommandKind;

/// How the mock answers one expected request.
#[derive(Debug, Clone)]
enum Reply {
    /// Return this text from the next `read()`.
    Response(String),
    /// Fail the `write()` with a transport error carrying this message.
    WriteError(String),
    /// Accept the write, then fail the `read()` with this message.
    ReadError(String),
}

/// A pre-loaded request/reply pair for the mock transport.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact request text we expect to be written.
    request: String,
    reply: Reply,
}

/// One call observed by a [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEntry {
    Connect {
        label: String,
        address: Option<String>,
        port: u32,
    },
    Disconnect {
        label: String,
    },
    Write {
        label: String,
        request: String,
        kind: CommandKind,
        at: Instant,
    },
    ReadDone {
        label: String,
        at: Instant,
    },
}

/// Shared, append-only log of transport calls.
///
/// Several mocks may write into the same journal, which lets a test check
/// the relative order of calls across adapters.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<JournalEntry>>>);

impl Journal {
    /// Create an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, entry: JournalEntry) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    /// Snapshot of every entry recorded so far.
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Compact textual form of the journal, e.g. `"serial:disconnect"`,
    /// `"network:connect"`, `"network:write getsn"`.
    pub fn summary(&self) -> Vec<String> {
        self.entries()
            .iter()
            .map(|entry| match entry {
                JournalEntry::Connect { label, .. } => format!("{label}:connect"),
                JournalEntry::Disconnect { label } => format!("{label}:disconnect"),
                JournalEntry::Write { label, request, .. } => {
                    format!("{label}:write {}", request.trim_end())
                }
                JournalEntry::ReadDone { label, .. } => format!("{label}:read"),
            })
            .collect()
    }

    /// Number of `connect()` calls recorded for the adapter with `label`.
    pub fn connect_count(&self, label: &str) -> usize {
        self.entries()
            .iter()
            .filter(|e| matches!(e, JournalEntry::Connect { label: l, .. } if l == label))
            .count()
    }

    /// `(write, read-done)` instants for each completed exchange, in order.
    pub fn exchanges(&self) -> Vec<(Instant, Instant)> {
        let mut started = None;
        let mut spans = Vec::new();
        for entry in self.entries() {
            match entry {
                JournalEntry::Write { at, .. } => started = Some(at),
                JournalEntry::ReadDone { at, .. } => {
                    if let Some(start) = started.take() {
                        spans.push((start, at));
                    }
                }
                _ => {}
            }
        }
        spans
    }
}

/// A mock [`Transport`] for testing without hardware.
///
/// Expectations are consumed in order. `write()` matches the request against
/// the next expectation; the paired reply is returned by the next `read()`.
/// A mismatched request or an exhausted queue is a protocol error.
#[derive(Debug)]
pub struct MockTransport {
    label: String,
    expectations: VecDeque<Expectation>,
    /// Reply pending for the next `read()` call.
    pending: Option<Reply>,
    connected: bool,
    connect_error: Option<String>,
    /// Simulated device turnaround applied to every `read()`.
    latency: Duration,
    journal: Journal,
}

impl MockTransport {
    /// Create a disconnected mock identified by `label` in the journal.
    pub fn new(label: &str) -> Self {
        MockTransport {
            label: label.to_string(),
            expectations: VecDeque::new(),
            pending: None,
            connected: false,
            connect_error: None,
            latency: Duration::ZERO,
            journal: Journal::new(),
        }
    }

    /// Record calls into an existing journal instead of a private one.
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    /// Delay every `read()` by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Start in the connected state.
    pub fn connected(mut self) -> Self {
        self.connected = true;
        self
    }

    /// Make every `connect()` fail with a transport error.
    pub fn fail_connect(mut self, message: &str) -> Self {
        self.connect_error = Some(message.to_string());
        self
    }

    /// Add an expected request/response pair.
    pub fn expect(&mut self, request: &str, response: &str) {
        self.expectations.push_back(Expectation {
            request: request.to_string(),
            reply: Reply::Response(response.to_string()),
        });
    }

    /// Expect `request`, and fail the write with `message`.
    pub fn expect_write_error(&mut self, request: &str, message: &str) {
        self.expectations.push_back(Expectation {
            request: request.to_string(),
            reply: Reply::WriteError(message.to_string()),
        });
    }

    /// Expect `request`, accept it, and fail the following read with `message`.
    pub fn expect_read_error(&mut self, request: &str, message: &str) {
        self.expectations.push_back(Expectation {
            request: request.to_string(),
            reply: Reply::ReadError(message.to_string()),
        });
    }

    /// Handle to the journal this mock records into.
    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self, address: Option<&str>, port: u32) -> Result<()> {
        self.journal.push(JournalEntry::Connect {
            label: self.label.clone(),
            address: address.map(str::to_string),
            port,
        });
        if let Some(message) = &self.connect_error {
            return Err(Error::Transport(message.clone()));
        }
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.journal.push(JournalEntry::Disconnect {
            label: self.label.clone(),
        });
        self.connected = false;
        self.pending = None;
        Ok(())
    }

    async fn write(&mut self, request: &str, kind: CommandKind) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        self.journal.push(JournalEntry::Write {
            label: self.label.clone(),
            request: request.to_string(),
            kind,
            at: Instant::now(),
        });

        let Some(expectation) = self.expectations.pop_front() else {
            return Err(Error::Protocol(
                "no more expectations in mock transport".into(),
            ));
        };
        if request != expectation.request {
            return Err(Error::Protocol(format!(
                "unexpected request: expected {:?}, got {:?}",
                expectation.request, request
            )));
        }
        match expectation.reply {
            Reply::WriteError(message) => Err(Error::Transport(message)),
            reply => {
                self.pending = Some(reply);
                Ok(())
            }
        }
    }

    async fn read(&mut self) -> Result<String> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let result = match self.pending.take() {
            Some(Reply::Response(text)) => Ok(text),
            Some(Reply::ReadError(message)) => Err(Error::Transport(message)),
            Some(Reply::WriteError(_)) | None => Err(Error::Timeout),
        };
        self.journal.push(JournalEntry::ReadDone {
            label: self.label.clone(),
            at: Instant::now(),
        });
        result
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
