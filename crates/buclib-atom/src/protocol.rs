//! ATOM monitor-and-control text protocol.
//!
//! # Request format
//!
//! ```text
//! <verb>[ <params>]<CR>
//! ```
//!
//! - `verb`: lowercase command word (e.g. `getsn`, `setdat`).
//! - `params`: space-separated `name value` pairs (e.g. `value 12`).
//! - Terminator: carriage return (0x0D).
//!
//! # Response format
//!
//! ```text
//! <CR><LF>ok[ <keyword> <value> ...]<CR><LF>
//! <CR><LF>err "<message>"<CR><LF>
//! ```
//!
//! Responses are handled as text. The first space-separated token of a
//! successful response contains `ok`; when the response carries values,
//! the second token names the first value and the third token is that value.

/// Request terminator.
pub const TERMINATOR: char = '\r';

/// Result for an empty response, whatever the command.
pub const EMPTY_RESPONSE: &str = "Unexpected error: response string is null or empty";

/// First token of a device error response.
pub const ERROR_TOKEN: &str = "err";

/// Encode a request line.
///
/// `params` is appended after a single space unless empty.
///
/// # Example
///
/// ```
/// use buclib_atom::protocol::encode_command;
///
/// assert_eq!(encode_command("getsn", ""), "getsn\r");
/// assert_eq!(encode_command("setdat", "value 12"), "setdat value 12\r");
/// ```
pub fn encode_command(verb: &str, params: &str) -> String {
    let mut cmd = String::with_capacity(verb.len() + params.len() + 2);
    cmd.push_str(verb);
    if !params.is_empty() {
        cmd.push(' ');
        cmd.push_str(params);
    }
    cmd.push(TERMINATOR);
    cmd
}

/// Return the raw value following `keyword` in a successful response.
///
/// Matches only when the response has more than two space-separated tokens,
/// the first contains `ok`, and the second is exactly `keyword`. The value
/// is returned untrimmed.
pub fn field_after_ok<'a>(response: &'a str, keyword: &str) -> Option<&'a str> {
    let mut tokens = response.split(' ');
    let status = tokens.next()?;
    let name = tokens.next()?;
    let value = tokens.next()?;
    (status.contains("ok") && name == keyword).then_some(value)
}

/// Extract a keyword value, or fall back to the whole response.
///
/// Empty input yields [`EMPTY_RESPONSE`]. Otherwise the matched value (or,
/// failing a match, the full response) is returned trimmed, so device error
/// lines pass through verbatim.
pub fn keyword_value(response: &str, keyword: &str) -> String {
    if response.is_empty() {
        return EMPTY_RESPONSE.to_string();
    }
    field_after_ok(response, keyword)
        .unwrap_or(response)
        .trim()
        .to_string()
}

/// Return the trimmed response, or [`EMPTY_RESPONSE`] if it is empty.
pub fn passthrough(response: &str) -> String {
    if response.is_empty() {
        EMPTY_RESPONSE.to_string()
    } else {
        response.trim().to_string()
    }
}

/// If `response` is a device error line, return its message without quotes.
///
/// ```
/// use buclib_atom::protocol::device_error;
///
/// assert_eq!(device_error("\r\nerr \"Invalid Command\"\r\n"), Some("Invalid Command"));
/// assert_eq!(device_error("\r\nok\r\n"), None);
/// ```
pub fn device_error(response: &str) -> Option<&str> {
    let rest = response.trim().strip_prefix(ERROR_TOKEN)?;
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    let message = rest.trim();
    // The device manual shows typographic quotes in places; accept both.
    Some(message.trim_matches(|c| c == '"' || c == '\u{201C}' || c == '\u{201D}'))
}
