//! buclib-test-harness: mock transports, a simulated device, and sample
//! responses for buclib.
//!
//! - [`MockTransport`] replays scripted request/response pairs and records
//!   every call in a shared [`Journal`], for deterministic unit tests of the
//!   dispatcher and driver.
//! - [`SimulatedTransport`] answers any request from a [`SampleResponses`]
//!   table, for demos and the CLI's `--mock` mode.
//! - [`MockTcpServer`] plays the device over a real TCP socket, for tests
//!   that exercise `TcpTransport`.

pub mod mock_tcp;
pub mod mock_transport;
pub mod simulated;

pub use mock_tcp::MockTcpServer;
pub use mock_transport::{Journal, JournalEntry, MockTransport};
pub use simulated::{SampleResponses, SimulatedTransport};
