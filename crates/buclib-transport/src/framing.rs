//! Response line framing shared by the TCP and serial adapters.
//!
//! The device answers every request with `<CR><LF><body><CR><LF>`. A response
//! is complete once a line feed follows at least one non-terminator byte;
//! leading CR/LF bytes belong to the same response and are kept so the codec
//! sees the raw text.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};

use buclib_core::error::{Error, Result};

/// Carriage return, terminating every request.
pub const CR: u8 = b'\r';

/// Line feed, terminating every response.
pub const LF: u8 = b'\n';

/// Maximum buffered response size before the buffer is discarded.
/// Device responses are well under 100 bytes.
pub const MAX_LINE: usize = 1024;

/// Result of attempting to decode one response from a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    /// A complete response was decoded.
    Line {
        /// Raw response text, including leading and trailing CR/LF.
        text: String,
        /// Number of bytes consumed from the input buffer.
        consumed: usize,
    },

    /// A complete response was found but is not valid UTF-8.
    Invalid(usize),

    /// The buffer does not yet contain a complete response.
    Incomplete,
}

/// Decode one LF-terminated response from a byte buffer.
///
/// # Examples
///
/// ```
/// use buclib_transport::framing::{DecodeResult, decode_line};
///
/// assert_eq!(
///     decode_line(b"\r\nok sn 123456\r\n"),
///     DecodeResult::Line { text: "\r\nok sn 123456\r\n".into(), consumed: 16 }
/// );
/// assert_eq!(decode_line(b"\r\nok sn 12"), DecodeResult::Incomplete);
/// ```
pub fn decode_line(buf: &[u8]) -> DecodeResult {
    let start = match buf.iter().position(|&b| b != CR && b != LF) {
        Some(pos) => pos,
        None => return DecodeResult::Incomplete,
    };

    let end = match buf[start..].iter().position(|&b| b == LF) {
        Some(pos) => start + pos,
        None => return DecodeResult::Incomplete,
    };

    let consumed = end + 1;
    match std::str::from_utf8(&buf[..consumed]) {
        Ok(text) => DecodeResult::Line {
            text: text.to_string(),
            consumed,
        },
        Err(_) => DecodeResult::Invalid(consumed),
    }
}

/// Read from `reader` until one complete response is buffered.
///
/// Bytes left over after the response stay in `pending` for the next call.
/// The whole read is bounded by `timeout`. `label` names the link in logs.
pub(crate) async fn read_response<R>(
    reader: &mut R,
    pending: &mut Vec<u8>,
    timeout: Duration,
    label: &str,
) -> Result<String>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let deadline = tokio::time::Instant::now() + timeout;
    let mut recv_buf = [0u8; 256];

    loop {
        match decode_line(pending) {
            DecodeResult::Line { text, consumed } => {
                pending.drain(..consumed);
                tracing::trace!(link = %label, response = ?text, "Received response");
                return Ok(text);
            }
            DecodeResult::Invalid(consumed) => {
                pending.drain(..consumed);
                return Err(Error::Protocol("response is not valid UTF-8".into()));
            }
            DecodeResult::Incomplete => {}
        }

        if pending.len() > MAX_LINE {
            tracing::warn!(link = %label, len = pending.len(), "response buffer overflow, clearing");
            pending.clear();
            return Err(Error::Protocol(format!(
                "response exceeded {MAX_LINE} bytes without a line feed"
            )));
        }

        let now = tokio::time::Instant::now();
        if now >= deadline {
            return Err(Error::Timeout);
        }

        match tokio::time::timeout(deadline - now, reader.read(&mut recv_buf)).await {
            Ok(Ok(0)) => {
                tracing::warn!(link = %label, "Peer closed connection (0 bytes read)");
                return Err(Error::ConnectionLost);
            }
            Ok(Ok(n)) => {
                tracing::trace!(link = %label, bytes = n, data = ?&recv_buf[..n], "Received data");
                pending.extend_from_slice(&recv_buf[..n]);
            }
            Ok(Err(e)) => {
                tracing::error!(link = %label, error = %e, "Failed to receive data");
                return Err(map_io_error(e));
            }
            Err(_) => {
                tracing::trace!(
                    link = %label,
                    timeout_ms = timeout.as_millis(),
                    "Timeout waiting for response"
                );
                return Err(Error::Timeout);
            }
        }
    }
}

/// Drop `pending` and every byte `reader` can yield without waiting.
///
/// Called before each request so a reply that arrived after its read timed
/// out is not taken as the answer to the next command. Returns the number of
/// bytes discarded. Read errors and end-of-stream end the drain quietly; the
/// next read reports them.
pub(crate) async fn discard_stale<R>(reader: &mut R, pending: &mut Vec<u8>, label: &str) -> usize
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut discarded = pending.len();
    pending.clear();

    let mut scratch = [0u8; 256];
    while let Ok(Ok(n)) = tokio::time::timeout(Duration::ZERO, reader.read(&mut scratch)).await {
        if n == 0 {
            break;
        }
        discarded += n;
    }

    if discarded > 0 {
        tracing::debug!(link = %label, bytes = discarded, "Discarding stale response data");
    }
    discarded
}

/// Map a data-path I/O error to the appropriate [`Error`] variant.
pub(crate) fn map_io_error(e: std::io::Error) -> Error {
    match e.kind() {
        std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::BrokenPipe
        | std::io::ErrorKind::NotConnected
        | std::io::ErrorKind::ConnectionAborted => Error::ConnectionLost,
        _ => Error::Io(e),
    }
}
