//! ATOM command builders and response parsers.
//!
//! Builders return complete request lines ready for a transport. Parsers turn
//! a raw response into the result string delivered to the caller; they never
//! fail, since device errors and unexpected text are results in their own
//! right.
//!
//! All functions are pure. [`AtomParser`] adapts [`parse_response`] to the
//! dispatch queue.

use buclib_core::{CommandKind, Error, PowerDirection, Result};
use buclib_dispatch::ResponseParser;

use crate::protocol::{EMPTY_RESPONSE, device_error, encode_command, keyword_value, passthrough};

// ---------------------------------------------------------------
// Limits
// ---------------------------------------------------------------

/// Lowest power module id accepted by `gettemp`.
pub const MIN_TEMPERATURE_ID: u8 = 1;
/// Highest power module id accepted by `gettemp`.
pub const MAX_TEMPERATURE_ID: u8 = 5;
/// Highest digital attenuator value accepted by `setdat`.
pub const MAX_ATTENUATION: u16 = 63;

/// Rendered mute state for gate value `0`.
pub const UNMUTED: &str = "0 (Unmuted)";
/// Rendered mute state for gate value `1`.
pub const MUTED: &str = "1 (Muted)";

// ---------------------------------------------------------------
// Command builders
// ---------------------------------------------------------------

/// Read the temperature of power module 1 (`gettemp id 1`).
pub fn cmd_get_temperature() -> String {
    encode_command("gettemp", "id 1")
}

/// Read the temperature of power module `id` (`gettemp id <id>`).
///
/// Sensors without a power module attached always read -40 °C.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] if `id` is outside 1–5.
pub fn cmd_get_temperature_of(id: u8) -> Result<String> {
    if !(MIN_TEMPERATURE_ID..=MAX_TEMPERATURE_ID).contains(&id) {
        return Err(Error::InvalidParameter(format!(
            "temperature sensor id {id} out of range {MIN_TEMPERATURE_ID}-{MAX_TEMPERATURE_ID}"
        )));
    }
    Ok(encode_command("gettemp", &format!("id {id}")))
}

/// Build a `setmute` request with the mute-invert, mute-bias and software
/// mute fields all set to `value`.
fn cmd_set_mute(value: &str) -> String {
    // Each value carries its own trailing space, including the last one.
    encode_command("setmute", &format!("uc {value} bias {value} cmd {value} "))
}

/// Enable the software mute (`setmute uc 1 bias 1 cmd 1 `).
pub fn cmd_mute() -> String {
    cmd_set_mute("1")
}

/// Disable the software mute (`setmute uc 0 bias 0 cmd 0 `).
pub fn cmd_unmute() -> String {
    cmd_set_mute("0")
}

/// Read the mute status (`getmute`).
pub fn cmd_get_mute_state() -> String {
    encode_command("getmute", "")
}

/// Read the digital attenuator value (`getdat`).
pub fn cmd_get_attenuation() -> String {
    encode_command("getdat", "")
}

/// Write the digital attenuator value (`setdat value <N>`).
///
/// The value is the raw DAT code, not dB.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] if `value` exceeds 63.
pub fn cmd_set_attenuation(value: u16) -> Result<String> {
    if value > MAX_ATTENUATION {
        return Err(Error::InvalidParameter(format!(
            "attenuation value {value} out of range 0-{MAX_ATTENUATION}"
        )));
    }
    Ok(encode_command("setdat", &format!("value {value}")))
}

/// Read the serial number (`getsn`).
pub fn cmd_get_serial_number() -> String {
    encode_command("getsn", "")
}

/// Read RF forward power (`getrfpwr dir 1`).
pub fn cmd_get_power() -> String {
    cmd_get_power_direction(PowerDirection::Forward)
}

/// Read RF power in the given direction (`getrfpwr dir <1|2>`).
pub fn cmd_get_power_direction(direction: PowerDirection) -> String {
    encode_command("getrfpwr", &format!("dir {}", direction.code()))
}

/// Read every fault flag (`getfaults`).
pub fn cmd_get_all_faults() -> String {
    encode_command("getfaults", "")
}

// ---------------------------------------------------------------
// Response parsers
// ---------------------------------------------------------------

/// The value keyword a successful response carries for `kind`, if any.
pub fn response_keyword(kind: CommandKind) -> Option<&'static str> {
    match kind {
        CommandKind::GetTemperature => Some("tempC"),
        CommandKind::GetAttenuation => Some("value"),
        CommandKind::GetSerialNumber => Some("sn"),
        CommandKind::GetPower => Some("dBm"),
        CommandKind::MuteBUC
        | CommandKind::UnmuteBUC
        | CommandKind::GetMuteState
        | CommandKind::SetAttenuation
        | CommandKind::GetStatusOfAllFaults => None,
    }
}

/// Parse a `getmute` response into `"0 (Unmuted)"` or `"1 (Muted)"`.
///
/// Anything other than `ok gate <0|1> ...` is returned trimmed.
pub fn parse_mute_state(response: &str) -> String {
    if response.is_empty() {
        return EMPTY_RESPONSE.to_string();
    }
    let mut tokens = response.split(' ');
    if let (Some(status), Some("gate"), Some(gate)) = (tokens.next(), tokens.next(), tokens.next())
    {
        if status.contains("ok") {
            match gate.trim() {
                "0" => return UNMUTED.to_string(),
                "1" => return MUTED.to_string(),
                _ => {}
            }
        }
    }
    response.trim().to_string()
}

/// Translate a raw response for `kind` into its result string.
///
/// # Example
///
/// ```
/// use buclib_atom::commands::parse_response;
/// use buclib_core::CommandKind;
///
/// assert_eq!(parse_response(CommandKind::GetSerialNumber, "ok sn 123456\r\n"), "123456");
/// assert_eq!(parse_response(CommandKind::MuteBUC, "\r\nok\r\n"), "ok");
/// ```
pub fn parse_response(kind: CommandKind, response: &str) -> String {
    match kind {
        CommandKind::GetMuteState => parse_mute_state(response),
        CommandKind::MuteBUC
        | CommandKind::UnmuteBUC
        | CommandKind::SetAttenuation
        | CommandKind::GetStatusOfAllFaults => passthrough(response),
        CommandKind::GetTemperature
        | CommandKind::GetAttenuation
        | CommandKind::GetSerialNumber
        | CommandKind::GetPower => match response_keyword(kind) {
            Some(keyword) => keyword_value(response, keyword),
            None => passthrough(response),
        },
    }
}

/// [`ResponseParser`] for ATOM devices.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtomParser;

impl ResponseParser for AtomParser {
    fn parse(&self, kind: CommandKind, raw: &str) -> String {
        if let Some(message) = device_error(raw) {
            tracing::warn!(kind = %kind, message, "device rejected command");
        }
        parse_response(kind, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---------------------------------------------------------------
    // Builders
    // ---------------------------------------------------------------

    #[test]
    fn cmd_get_temperature_default_id() {
        assert_eq!(cmd_get_temperature(), "gettemp id 1\r");
    }

    #[test]
    fn cmd_get_temperature_of_each_module() {
        for id in 1..=5u8 {
            assert_eq!(
                cmd_get_temperature_of(id).unwrap(),
                format!("gettemp id {id}\r")
            );
        }
    }

    #[test]
    fn cmd_get_temperature_of_out_of_range() {
        assert!(matches!(
            cmd_get_temperature_of(0),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            cmd_get_temperature_of(6),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn cmd_mute_bytes() {
        assert_eq!(cmd_mute(), "setmute uc 1 bias 1 cmd 1 \r");
    }

    #[test]
    fn cmd_unmute_bytes() {
        assert_eq!(cmd_unmute(), "setmute uc 0 bias 0 cmd 0 \r");
    }

    #[test]
    fn cmd_simple_reads() {
        assert_eq!(cmd_get_mute_state(), "getmute\r");
        assert_eq!(cmd_get_attenuation(), "getdat\r");
        assert_eq!(cmd_get_serial_number(), "getsn\r");
        assert_eq!(cmd_get_all_faults(), "getfaults\r");
    }

    #[test]
    fn cmd_set_attenuation_bounds() {
        assert_eq!(cmd_set_attenuation(0).unwrap(), "setdat value 0\r");
        assert_eq!(cmd_set_attenuation(63).unwrap(), "setdat value 63\r");
        let err = cmd_set_attenuation(64).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid parameter: attenuation value 64 out of range 0-63"
        );
    }

    #[test]
    fn cmd_get_power_directions() {
        assert_eq!(cmd_get_power(), "getrfpwr dir 1\r");
        assert_eq!(
            cmd_get_power_direction(PowerDirection::Reverse),
            "getrfpwr dir 2\r"
        );
    }

    // ---------------------------------------------------------------
    // Parsers
    // ---------------------------------------------------------------

    #[test]
    fn parse_temperature() {
        assert_eq!(
            parse_response(
                CommandKind::GetTemperature,
                "\r\nok tempC 32 binary 520 adc 1410\r\n"
            ),
            "32"
        );
    }

    #[test]
    fn parse_disconnected_temperature_sensor() {
        assert_eq!(
            parse_response(
                CommandKind::GetTemperature,
                "\r\nok tempC -40 binary 0 adc 0\r\n"
            ),
            "-40"
        );
    }

    #[test]
    fn parse_attenuation() {
        assert_eq!(
            parse_response(CommandKind::GetAttenuation, "\r\nok value 12\r\n"),
            "12"
        );
    }

    #[test]
    fn parse_serial_number() {
        assert_eq!(
            parse_response(CommandKind::GetSerialNumber, "ok sn 123456\r\n"),
            "123456"
        );
    }

    #[test]
    fn parse_power() {
        assert_eq!(
            parse_response(CommandKind::GetPower, "\r\nok dBm +18.5 binary 585 adc 19\r\n"),
            "+18.5"
        );
    }

    #[test]
    fn parse_set_commands_pass_through() {
        for kind in [
            CommandKind::MuteBUC,
            CommandKind::UnmuteBUC,
            CommandKind::SetAttenuation,
        ] {
            assert_eq!(parse_response(kind, "\r\nok\r\n"), "ok");
            assert_eq!(
                parse_response(kind, "\r\nerr \"Missing Parameter\"\r\n"),
                "err \"Missing Parameter\""
            );
        }
    }

    #[test]
    fn parse_faults_pass_through() {
        assert_eq!(
            parse_response(
                CommandKind::GetStatusOfAllFaults,
                "\r\nok mute 0 overTemp 0 pll 0\r\n"
            ),
            "ok mute 0 overTemp 0 pll 0"
        );
    }

    #[test]
    fn parse_mute_state_muted() {
        assert_eq!(
            parse_response(
                CommandKind::GetMuteState,
                "\r\nok gate 1 uc 1 in 0 bias 1 ovrd 0 cmd 1 fault 0\r\n"
            ),
            MUTED
        );
    }

    #[test]
    fn parse_mute_state_unmuted() {
        assert_eq!(
            parse_response(CommandKind::GetMuteState, "ok gate 0 uc 0\r\n"),
            UNMUTED
        );
    }

    #[test]
    fn parse_mute_state_gate_value_with_terminator() {
        assert_eq!(
            parse_response(CommandKind::GetMuteState, "ok gate 1\r\n"),
            MUTED
        );
    }

    #[test]
    fn parse_mute_state_error_passes_through() {
        assert_eq!(
            parse_response(CommandKind::GetMuteState, "err \"Invalid Command\""),
            "err \"Invalid Command\""
        );
    }

    #[test]
    fn parse_mute_state_unknown_gate_passes_through() {
        assert_eq!(
            parse_response(CommandKind::GetMuteState, "ok gate 7 uc 1"),
            "ok gate 7 uc 1"
        );
    }

    #[test]
    fn parse_value_command_error_passes_through() {
        assert_eq!(
            parse_response(CommandKind::GetSerialNumber, "\r\nerr \"Invalid Command\"\r\n"),
            "err \"Invalid Command\""
        );
    }

    #[test]
    fn parse_wrong_keyword_returns_whole_response() {
        assert_eq!(
            parse_response(CommandKind::GetPower, "\r\nok value 12\r\n"),
            "ok value 12"
        );
    }

    #[test]
    fn parse_empty_response_is_sentinel_for_every_kind() {
        for kind in CommandKind::ALL {
            assert_eq!(parse_response(kind, ""), EMPTY_RESPONSE, "{kind}");
        }
    }

    #[test]
    fn keywords_cover_value_commands_only() {
        let with_keyword: Vec<_> = CommandKind::ALL
            .into_iter()
            .filter(|k| response_keyword(*k).is_some())
            .collect();
        assert_eq!(
            with_keyword,
            [
                CommandKind::GetTemperature,
                CommandKind::GetAttenuation,
                CommandKind::GetSerialNumber,
                CommandKind::GetPower,
            ]
        );
    }

    #[test]
    fn atom_parser_matches_parse_response() {
        let parser = AtomParser;
        assert_eq!(
            parser.parse(CommandKind::GetAttenuation, "\r\nok value 5\r\n"),
            "5"
        );
        assert_eq!(
            parser.parse(CommandKind::GetAttenuation, "\r\nerr \"Invalid Command\"\r\n"),
            "err \"Invalid Command\""
        );
    }
}
