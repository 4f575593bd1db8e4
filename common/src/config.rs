use serde::{Deserialize, Serialize};

/// Value of `always_on_enabled` that turns the always-on zone on. Anything
/// else is normalized to 0 by [`TimerConfig::sanitize`].
pub const ALWAYS_ON_ENABLED: i32 = 1;

pub const MIN_STEP: i32 = 1;
pub const MAX_STEP: i32 = 100;
pub const MIN_START_VALUE: i32 = 1;
pub const MAX_START_VALUE: i32 = 100;

/// Auto-off timer settings as they are stored.
///
/// Fields keep their raw integer representation so that whatever the store
/// hands back deserializes; [`TimerConfig::sanitize`] then pulls every field
/// into range before the timer model reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Seconds of countdown per 1% of the dial. 0 disables auto-off.
    pub rate: i32,
    /// Brightness step advertised to the controller, 1..=100.
    pub step: i32,
    /// 1 when dial values above 95% mean "stay on".
    pub always_on_enabled: i32,
    /// Percent used when a plain on toggle re-arms the countdown, 1..=100.
    pub start_value: i32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            rate: 0,
            step: 1,
            always_on_enabled: 0,
            start_value: 100,
        }
    }
}

impl TimerConfig {
    pub fn sanitize(&mut self) {
        if self.rate < 0 {
            self.rate = 0;
        }

        self.step = self.step.clamp(MIN_STEP, MAX_STEP);

        if self.always_on_enabled != ALWAYS_ON_ENABLED {
            self.always_on_enabled = 0;
        }

        self.start_value = self.start_value.clamp(MIN_START_VALUE, MAX_START_VALUE);
    }

    pub fn rate_secs(&self) -> u32 {
        self.rate.max(0) as u32
    }

    pub fn step_pct(&self) -> u8 {
        self.step.clamp(MIN_STEP, MAX_STEP) as u8
    }

    pub fn start_value_pct(&self) -> u8 {
        self.start_value.clamp(MIN_START_VALUE, MAX_START_VALUE) as u8
    }

    pub fn always_on(&self) -> bool {
        self.always_on_enabled == ALWAYS_ON_ENABLED
    }

    pub fn auto_off_enabled(&self) -> bool {
        self.rate > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchConfig {
    pub id: u32,
    pub name: String,
    /// Last commanded output state, restored at boot.
    pub state: bool,
    /// Flip the "On" characteristic relative to the physical output.
    pub inverted: bool,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            id: 1,
            name: "Light Timer".to_string(),
            state: false,
            inverted: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "127.0.0.1".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub switch: SwitchConfig,
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        self.timer.sanitize();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn clamps_out_of_range_values() {
        let mut config = TimerConfig {
            rate: -3,
            step: 0,
            always_on_enabled: 0,
            start_value: 150,
        };
        config.sanitize();

        assert_eq!(
            config,
            TimerConfig {
                rate: 0,
                step: 1,
                always_on_enabled: 0,
                start_value: 100,
            }
        );
    }

    #[test]
    fn clamps_upper_step_and_lower_start_value() {
        let mut config = TimerConfig {
            rate: 12,
            step: 250,
            always_on_enabled: 1,
            start_value: -7,
        };
        config.sanitize();

        assert_eq!(config.rate, 12);
        assert_eq!(config.step, 100);
        assert_eq!(config.start_value, 1);
        assert!(config.always_on());
    }

    #[test]
    fn non_canonical_always_on_becomes_disabled() {
        for raw in [2, -1, 255] {
            let mut config = TimerConfig {
                always_on_enabled: raw,
                ..TimerConfig::default()
            };
            config.sanitize();
            assert_eq!(config.always_on_enabled, 0);
            assert!(!config.always_on());
        }
    }

    #[test]
    fn sanitize_is_idempotent() {
        let mut once = TimerConfig {
            rate: -1,
            step: 101,
            always_on_enabled: 7,
            start_value: 0,
        };
        once.sanitize();
        let mut twice = once.clone();
        twice.sanitize();

        assert_eq!(once, twice);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let raw = r#"{"timer":{"rate":10,"step":5,"always_on_enabled":1,"start_value":50}}"#;
        let runtime: RuntimeConfig = serde_json::from_str(raw).unwrap();

        assert_eq!(runtime.switch, SwitchConfig::default());
        assert_eq!(runtime.timer.rate_secs(), 10);
        assert_eq!(runtime.timer.step_pct(), 5);
        assert_eq!(runtime.network.mqtt_port, 1883);
    }

    #[test]
    fn partial_timer_section_keeps_field_defaults() {
        let runtime: RuntimeConfig = serde_json::from_str(r#"{"timer":{"rate":30}}"#).unwrap();

        assert_eq!(runtime.timer.rate, 30);
        assert_eq!(runtime.timer.step, 1);
        assert_eq!(runtime.timer.start_value, 100);
        assert!(!runtime.timer.always_on());
    }
}
