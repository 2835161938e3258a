//! Simulated device answering from a table of sample responses.
//!
//! [`SampleResponses`] maps each [`CommandKind`] to the raw text a real
//! device sends back for it. [`SimulatedTransport`] replays those responses
//! without any I/O, which is what `bucctl --mock` and the demo run on.
//!
//! The table can be loaded from a JSON object keyed by command name:
//!
//! ```json
//! { "GetSerialNumber": "\r\nok sn 123456\r\n" }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use buclib_core::error::{Error, Result};
use buclib_core::transport::Transport;
use buclib_core::types::CommandKind;

use crate::mock_transport::{Journal, JournalEntry};

/// Responses captured from a device in its default state.
const BUILTIN: [(CommandKind, &str); 9] = [
    (
        CommandKind::GetTemperature,
        "\r\nok tempC 32 binary 520 adc 1410\r\n",
    ),
    (CommandKind::MuteBUC, "\r\nok\r\n"),
    (CommandKind::UnmuteBUC, "\r\nok\r\n"),
    (
        CommandKind::GetMuteState,
        "\r\nok gate 1 uc 1 in 0 bias 1 ovrd 0 cmd 1 fault 0\r\n",
    ),
    (CommandKind::GetAttenuation, "\r\nok value 12\r\n"),
    (CommandKind::SetAttenuation, "\r\nok\r\n"),
    (CommandKind::GetSerialNumber, "\r\nok sn 123456\r\n"),
    (
        CommandKind::GetPower,
        "\r\nok dBm +18.5 binary 585 adc 19\r\n",
    ),
    (
        CommandKind::GetStatusOfAllFaults,
        "\r\nok mute 0 overTemp 0 pll 0\r\n",
    ),
];

/// Raw device responses keyed by command kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleResponses {
    responses: HashMap<CommandKind, String>,
}

impl SampleResponses {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in table covering every command kind.
    pub fn builtin() -> Self {
        Self {
            responses: BUILTIN
                .iter()
                .map(|(kind, text)| (*kind, (*text).to_string()))
                .collect(),
        }
    }

    /// Parse a JSON object of `"CommandName": "response"` entries.
    ///
    /// Names that are not a known command are skipped with a warning.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let entries: HashMap<String, String> = serde_json::from_str(json)
            .map_err(|e| Error::Protocol(format!("invalid sample response fixture: {e}")))?;

        let mut responses = HashMap::with_capacity(entries.len());
        for (name, text) in entries {
            match name.parse::<CommandKind>() {
                Ok(kind) => {
                    responses.insert(kind, text);
                }
                Err(e) => tracing::warn!(error = %e, "Skipping sample response"),
            }
        }
        Ok(Self { responses })
    }

    /// Load a JSON fixture file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let table = Self::from_json_str(&json)?;
        tracing::debug!(path = %path.display(), entries = table.len(), "Loaded sample responses");
        Ok(table)
    }

    /// Response text for `kind`, if present.
    pub fn get(&self, kind: CommandKind) -> Option<&str> {
        self.responses.get(&kind).map(String::as_str)
    }

    /// Set or replace the response for `kind`.
    pub fn insert(&mut self, kind: CommandKind, text: impl Into<String>) {
        self.responses.insert(kind, text.into());
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

/// A [`Transport`] that answers every request from a [`SampleResponses`]
/// table, keyed by the kind passed to `write()`.
#[derive(Debug)]
pub struct SimulatedTransport {
    label: String,
    responses: Arc<SampleResponses>,
    connected: bool,
    /// Kind of the last request written, answered by the next `read()`.
    last_kind: Option<CommandKind>,
    latency: Duration,
    journal: Journal,
}

impl SimulatedTransport {
    /// Create a disconnected simulated link named `label` in logs.
    pub fn new(label: &str, responses: Arc<SampleResponses>) -> Self {
        Self {
            label: label.to_string(),
            responses,
            connected: false,
            last_kind: None,
            latency: Duration::ZERO,
            journal: Journal::new(),
        }
    }

    /// Delay every `read()` by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Record calls into `journal`.
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn connect(&mut self, address: Option<&str>, port: u32) -> Result<()> {
        tracing::info!(
            link = %self.label,
            address = address.unwrap_or("-"),
            port,
            "Simulated link connected"
        );
        self.journal.push(JournalEntry::Connect {
            label: self.label.clone(),
            address: address.map(str::to_string),
            port,
        });
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if self.connected {
            tracing::info!(link = %self.label, "Simulated link disconnected");
        }
        self.journal.push(JournalEntry::Disconnect {
            label: self.label.clone(),
        });
        self.connected = false;
        self.last_kind = None;
        Ok(())
    }

    async fn write(&mut self, request: &str, kind: CommandKind) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        tracing::trace!(link = %self.label, kind = %kind, request = ?request, "Simulated request");
        self.journal.push(JournalEntry::Write {
            label: self.label.clone(),
            request: request.to_string(),
            kind,
            at: Instant::now(),
        });
        self.last_kind = Some(kind);
        Ok(())
    }

    async fn read(&mut self) -> Result<String> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let kind = self.last_kind.take().ok_or(Error::Timeout)?;
        self.journal.push(JournalEntry::ReadDone {
            label: self.label.clone(),
            at: Instant::now(),
        });
        self.responses
            .get(kind)
            .map(str::to_string)
            .ok_or_else(|| Error::Protocol(format!("no sample response for {kind}")))
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
