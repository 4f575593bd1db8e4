use serde::Serialize;

/// Who asked for an output or dial change. Only used for logging and for
/// the host to decide what to persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    Init,
    Http,
    Mqtt,
    AutoOff,
    SetOutputState,
}

impl ChangeReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Http => "HTTP",
            Self::Mqtt => "MQTT",
            Self::AutoOff => "AUTO_OFF",
            Self::SetOutputState => "SET_OUTPUT_STATE",
        }
    }
}

impl core::fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoOffMode {
    /// rate is 0, no countdown ever runs.
    Disabled,
    /// Feature enabled, nothing counting and not held on.
    Idle,
    CountingDown,
    /// Output held on by a dial value in the always-on zone.
    AlwaysOn,
}

impl AutoOffMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "DISABLED",
            Self::Idle => "IDLE",
            Self::CountingDown => "COUNTING_DOWN",
            Self::AlwaysOn => "ALWAYS_ON",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessoryAction {
    /// Observer should re-read the characteristics.
    Notify,
    /// The physical output changed and `cfg.state` with it.
    OutputChanged { on: bool, reason: ChangeReason },
}

/// Shape of the brightness characteristic as advertised to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BrightnessSpec {
    pub min: u8,
    pub max: u8,
    pub step: u8,
    #[serde(rename = "supportsNotification")]
    pub supports_notification: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LightTimerStatus {
    pub id: u32,
    pub name: String,
    pub on: bool,
    #[serde(rename = "outputOn")]
    pub output_on: bool,
    pub brightness: u8,
    /// Dial value the observer was last notified with, if any.
    #[serde(rename = "reportedBrightness")]
    pub reported_brightness: Option<u8>,
    pub mode: &'static str,
    #[serde(rename = "remainingMs")]
    pub remaining_ms: u64,
    #[serde(rename = "remainingSecs")]
    pub remaining_secs: u64,
    #[serde(rename = "countdownMs")]
    pub countdown_ms: Option<u64>,
    #[serde(rename = "refreshArmed")]
    pub refresh_armed: bool,
    pub rate: u32,
    #[serde(rename = "alwaysOnEnabled")]
    pub always_on_enabled: bool,
    #[serde(rename = "startValue")]
    pub start_value: u8,
    #[serde(rename = "brightnessSpec")]
    pub brightness_spec: BrightnessSpec,
}

/// Retained state published to the observer on every notification.
#[derive(Debug, Clone, Serialize)]
pub struct LightTimerStatePayload {
    pub on: bool,
    pub brightness: u8,
    pub mode: &'static str,
    #[serde(rename = "remainingSecs")]
    pub remaining_secs: u64,
}
