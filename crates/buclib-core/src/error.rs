//! Error types for buclib.
//!
//! Fallible operations outside the command path (transport selection,
//! adapter I/O, fixture loading) return [`Result<T>`], which uses [`Error`]
//! as the error type. Command results themselves are always delivered as
//! strings through the driver's result callback; an [`Error`] raised while a
//! command executes is rendered into that string with its `Display` form.

/// The error type for all buclib operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (serial port, TCP socket).
    #[error("transport error: {0}")]
    Transport(String),

    /// A protocol-level error (non-ASCII response, oversized frame).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Timed out waiting for a response from the device.
    ///
    /// This typically indicates the device is powered off, the baud rate is
    /// wrong, or the network path is down.
    #[error("timeout waiting for response")]
    Timeout,

    /// An invalid parameter was passed to a command builder or adapter.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// No connection to the device has been established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the device was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// The operation cannot run while commands are queued or in flight.
    #[error("dispatcher busy: {0}")]
    Busy(String),

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
