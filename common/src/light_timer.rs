use tracing::{debug, info};

use crate::{
    auto_off::AutoOffTimer,
    config::{SwitchConfig, TimerConfig},
    convert::{
        percent_to_duration_ms, remaining_to_percent, ALWAYS_ON_THRESHOLD_PCT, MAX_PERCENT,
    },
    refresh::{ObservedState, RefreshScheduler},
    switch::SwitchBase,
    types::{
        AccessoryAction, AutoOffMode, BrightnessSpec, ChangeReason, LightTimerStatePayload,
        LightTimerStatus,
    },
};

/// A switch whose brightness dial doubles as its auto-off countdown.
///
/// Wraps a base switch and intercepts output changes so that turning the
/// output on arms a fresh countdown and any other transition cancels it.
/// All entry points take the current monotonic time and return the actions
/// the host has to carry out.
#[derive(Debug, Clone)]
pub struct LightTimer<S> {
    base: S,
    timer: TimerConfig,
    auto_off: AutoOffTimer,
    refresh: RefreshScheduler,
    observed: ObservedState,
}

impl<S: SwitchBase> LightTimer<S> {
    pub fn new(base: S, mut timer: TimerConfig) -> Self {
        timer.sanitize();
        Self {
            base,
            timer,
            auto_off: AutoOffTimer::new(),
            refresh: RefreshScheduler::new(),
            observed: ObservedState::new(),
        }
    }

    pub fn init(&mut self) {
        self.base.init();
        self.timer.sanitize();
        info!(
            "light timer {} ready: rate {} s/%, step {}, always on {}, start value {}%",
            self.base.config().id,
            self.timer.rate,
            self.timer.step,
            self.timer.always_on(),
            self.timer.start_value
        );
    }

    pub fn base(&self) -> &S {
        &self.base
    }

    pub fn switch_config(&self) -> &SwitchConfig {
        self.base.config()
    }

    pub fn timer_config(&self) -> &TimerConfig {
        &self.timer
    }

    pub fn auto_off(&self) -> &AutoOffTimer {
        &self.auto_off
    }

    pub fn is_counting_down(&self) -> bool {
        self.auto_off.is_armed()
    }

    pub fn is_refresh_armed(&self) -> bool {
        self.refresh.is_armed()
    }

    pub fn observed(&self) -> &ObservedState {
        &self.observed
    }

    /// Replaces the timer settings. Any running countdown is dropped since
    /// its length was derived from the old rate.
    pub fn set_timer_config(&mut self, mut timer: TimerConfig) -> Vec<AccessoryAction> {
        timer.sanitize();
        self.timer = timer;
        self.disarm();
        info!("timer config replaced, auto off timer disarmed");
        vec![AccessoryAction::Notify]
    }

    pub fn set_output_state(
        &mut self,
        on: bool,
        reason: ChangeReason,
        now_ms: u64,
    ) -> Vec<AccessoryAction> {
        let cancelled = if on && !self.base.persisted_state() && self.timer.auto_off_enabled() {
            self.set_auto_off_percent(
                self.timer.start_value_pct(),
                ChangeReason::SetOutputState,
                now_ms,
            );
            false
        } else {
            let was_armed = self.auto_off.is_armed();
            self.disarm();
            info!("auto off timer disarmed ({reason})");
            was_armed
        };

        let mut actions = Vec::new();
        if self.base.set_output_state(on, reason) {
            actions.push(AccessoryAction::OutputChanged { on, reason });
            actions.push(AccessoryAction::Notify);
        } else if cancelled {
            // The dial moved even though the output did not.
            actions.push(AccessoryAction::Notify);
        }
        actions
    }

    /// Arms, re-arms or disarms the countdown from a dial value.
    ///
    /// Three outcomes: a countdown of `percent * rate` seconds; nothing at
    /// all when the feature is off or the dial is at 0; or no countdown
    /// because the dial sits in the always-on zone.
    pub fn set_auto_off_percent(&mut self, percent: u8, reason: ChangeReason, now_ms: u64) {
        let percent = percent.min(MAX_PERCENT);
        let rate = self.timer.rate_secs();
        info!("set auto_off percent ({reason}): {percent}");

        if percent > 0
            && rate > 0
            && (percent <= ALWAYS_ON_THRESHOLD_PCT || !self.timer.always_on())
        {
            let duration_ms = percent_to_duration_ms(percent, rate);
            info!(
                "set new auto_off time ({reason}): {percent}% -> {} seconds",
                duration_ms / 1_000
            );
            self.auto_off.arm(duration_ms, now_ms);
            self.arm_update_timer(now_ms);
        } else {
            info!(
                "auto off disabled ({reason}), requested: {percent}%, rate: 1% = {rate} sec, \
                 95% always on enabled: {}",
                if self.timer.always_on() { "on" } else { "off" }
            );
            self.disarm();
        }
    }

    pub fn arm_update_timer(&mut self, now_ms: u64) {
        self.refresh.arm(self.auto_off.is_armed(), now_ms);
    }

    pub fn remaining_percent(&self, now_ms: u64) -> u8 {
        let remaining_ms = self.auto_off.remaining_ms(now_ms);
        let percent = remaining_to_percent(
            remaining_ms,
            self.timer.rate_secs(),
            self.base.output_state(),
            self.timer.always_on(),
        );
        debug!(
            "auto off remaining seconds: {}, percent: {percent}%",
            remaining_ms / 1_000
        );
        percent
    }

    /// Drives expiry and the refresh tick; call it from the host loop.
    pub fn poll(&mut self, now_ms: u64) -> Vec<AccessoryAction> {
        let mut actions = Vec::new();

        if self.auto_off.is_expired(now_ms) {
            info!("auto off timer expired, switching off");
            self.auto_off.clear();
            actions.extend(self.set_output_state(false, ChangeReason::AutoOff, now_ms));
            if !actions.contains(&AccessoryAction::Notify) {
                actions.push(AccessoryAction::Notify);
            }
        }

        if self.refresh.take_due(now_ms) {
            self.refresh_tick(now_ms, &mut actions);
        }

        actions
    }

    pub fn read_on(&self) -> bool {
        self.base.output_state() ^ self.base.config().inverted
    }

    pub fn write_on(
        &mut self,
        value: bool,
        reason: ChangeReason,
        now_ms: u64,
    ) -> Vec<AccessoryAction> {
        let on = value ^ self.base.config().inverted;
        self.set_output_state(on, reason, now_ms)
    }

    pub fn read_brightness(&self, now_ms: u64) -> u8 {
        let value = self.remaining_percent(now_ms);
        info!("get brightness: {value}%");
        value
    }

    /// Always notifies, whether or not the dial moved.
    pub fn write_brightness(
        &mut self,
        value: u8,
        reason: ChangeReason,
        now_ms: u64,
    ) -> Vec<AccessoryAction> {
        info!("brightness write {}: {value}", self.base.config().id);
        self.set_auto_off_percent(value, reason, now_ms);
        vec![AccessoryAction::Notify]
    }

    pub fn brightness_spec(&self) -> BrightnessSpec {
        BrightnessSpec {
            min: 0,
            max: MAX_PERCENT,
            step: self.timer.step_pct(),
            supports_notification: true,
        }
    }

    pub fn mode(&self) -> AutoOffMode {
        if !self.timer.auto_off_enabled() {
            AutoOffMode::Disabled
        } else if self.auto_off.is_armed() {
            AutoOffMode::CountingDown
        } else if self.base.output_state() && self.timer.always_on() {
            AutoOffMode::AlwaysOn
        } else {
            AutoOffMode::Idle
        }
    }

    pub fn status(&self, now_ms: u64) -> LightTimerStatus {
        let config = self.base.config();
        let remaining_ms = self.auto_off.remaining_ms(now_ms);
        LightTimerStatus {
            id: config.id,
            name: config.name.clone(),
            on: self.read_on(),
            output_on: self.base.output_state(),
            brightness: self.remaining_percent(now_ms),
            reported_brightness: self.observed.last_percent(),
            mode: self.mode().as_str(),
            remaining_ms,
            remaining_secs: remaining_ms / 1_000,
            countdown_ms: self.auto_off.duration_ms(),
            refresh_armed: self.refresh.is_armed(),
            rate: self.timer.rate_secs(),
            always_on_enabled: self.timer.always_on(),
            start_value: self.timer.start_value_pct(),
            brightness_spec: self.brightness_spec(),
        }
    }

    pub fn state_payload(&self, now_ms: u64) -> LightTimerStatePayload {
        LightTimerStatePayload {
            on: self.read_on(),
            brightness: self.remaining_percent(now_ms),
            mode: self.mode().as_str(),
            remaining_secs: self.auto_off.remaining_ms(now_ms) / 1_000,
        }
    }

    fn refresh_tick(&mut self, now_ms: u64, actions: &mut Vec<AccessoryAction>) {
        let percent = self.remaining_percent(now_ms);
        let output_on = self.base.output_state();

        if self.observed.record(percent, output_on) && !actions.contains(&AccessoryAction::Notify)
        {
            actions.push(AccessoryAction::Notify);
        }
    }

    fn disarm(&mut self) {
        self.auto_off.clear();
        self.refresh.clear();
    }
}
