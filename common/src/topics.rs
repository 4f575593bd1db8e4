use std::num::IntErrorKind;

use thiserror::Error;

use crate::convert::MAX_PERCENT;

pub const TOPIC_LIGHT_TIMER_STATE: &str = "lighttimer/state";

pub const TOPIC_CMD_ON: &str = "lighttimer/cmnd/on";
pub const TOPIC_CMD_BRIGHTNESS: &str = "lighttimer/cmnd/brightness";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("invalid on payload {0:?}, expected ON/OFF, true/false or 1/0")]
    InvalidOn(String),
    #[error("invalid brightness payload {0:?}, expected 0-100")]
    InvalidBrightness(String),
}

pub fn parse_on_payload(payload: &str) -> Result<bool, CommandError> {
    match payload.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        _ => Err(CommandError::InvalidOn(payload.to_string())),
    }
}

/// Values above 100 are accepted and clamped, however large. Negatives and
/// non-numeric text are rejected.
pub fn parse_brightness_payload(payload: &str) -> Result<u8, CommandError> {
    match payload.trim().parse::<u32>() {
        Ok(value) => Ok(value.min(u32::from(MAX_PERCENT)) as u8),
        Err(err) if *err.kind() == IntErrorKind::PosOverflow => Ok(MAX_PERCENT),
        Err(_) => Err(CommandError::InvalidBrightness(payload.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_on_variants() {
        for payload in ["ON", "on", " true ", "1"] {
            assert_eq!(parse_on_payload(payload), Ok(true));
        }
        for payload in ["OFF", "False", "0"] {
            assert_eq!(parse_on_payload(payload), Ok(false));
        }
        assert_eq!(
            parse_on_payload("toggle"),
            Err(CommandError::InvalidOn("toggle".to_string()))
        );
    }

    #[test]
    fn parses_and_clamps_brightness() {
        assert_eq!(parse_brightness_payload("0"), Ok(0));
        assert_eq!(parse_brightness_payload(" 42\n"), Ok(42));
        assert_eq!(parse_brightness_payload("250"), Ok(100));
        assert_eq!(parse_brightness_payload("4294967296"), Ok(100));
        assert_eq!(parse_brightness_payload("99999999999999999999"), Ok(100));
        assert!(parse_brightness_payload("-5").is_err());
        assert!(parse_brightness_payload("half").is_err());
        assert!(parse_brightness_payload("-99999999999999999999").is_err());
    }
}
