pub mod auto_off;
pub mod config;
pub mod convert;
pub mod light_timer;
pub mod refresh;
pub mod switch;
pub mod topics;
pub mod types;

pub use auto_off::AutoOffTimer;
pub use config::{NetworkConfig, RuntimeConfig, SwitchConfig, TimerConfig};
pub use convert::{percent_to_duration_ms, remaining_to_percent};
pub use light_timer::LightTimer;
pub use refresh::{ObservedState, RefreshScheduler};
pub use switch::{OutputDriver, OutputSwitch, SwitchBase};
pub use topics::*;
pub use types::{
    AccessoryAction, AutoOffMode, BrightnessSpec, ChangeReason, LightTimerStatePayload,
    LightTimerStatus,
};
