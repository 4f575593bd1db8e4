use tracing::info;

use crate::{config::SwitchConfig, types::ChangeReason};

/// Physical output the switch drives.
pub trait OutputDriver {
    fn state(&self) -> bool;
    fn set_state(&mut self, on: bool, reason: ChangeReason);
}

/// Behavior every switch variant provides and a variant may wrap.
pub trait SwitchBase {
    fn init(&mut self);
    fn output_state(&self) -> bool;
    /// Last commanded state as stored in the configuration.
    fn persisted_state(&self) -> bool;
    /// Returns whether the output actually changed.
    fn set_output_state(&mut self, on: bool, reason: ChangeReason) -> bool;
    fn config(&self) -> &SwitchConfig;
}

/// Plain switch: one output and its persisted state.
#[derive(Debug, Clone)]
pub struct OutputSwitch<O> {
    output: O,
    config: SwitchConfig,
}

impl<O: OutputDriver> OutputSwitch<O> {
    pub fn new(output: O, config: SwitchConfig) -> Self {
        Self { output, config }
    }

    pub fn output(&self) -> &O {
        &self.output
    }
}

impl<O: OutputDriver> SwitchBase for OutputSwitch<O> {
    fn init(&mut self) {
        let restored = self.config.state;
        if self.output.state() != restored {
            self.output.set_state(restored, ChangeReason::Init);
        }
        info!(
            "switch {} ({}) initialized, state: {}",
            self.config.id, self.config.name, restored
        );
    }

    fn output_state(&self) -> bool {
        self.output.state()
    }

    fn persisted_state(&self) -> bool {
        self.config.state
    }

    fn set_output_state(&mut self, on: bool, reason: ChangeReason) -> bool {
        let changed = self.output.state() != on;
        if changed {
            self.output.set_state(on, reason);
            info!("switch {}: output {} ({reason})", self.config.id, on);
        }
        self.config.state = on;
        changed
    }

    fn config(&self) -> &SwitchConfig {
        &self.config
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    #[derive(Debug, Clone, Default)]
    pub struct MemoryOutput {
        pub on: bool,
        pub writes: Vec<(bool, ChangeReason)>,
    }

    impl OutputDriver for MemoryOutput {
        fn state(&self) -> bool {
            self.on
        }

        fn set_state(&mut self, on: bool, reason: ChangeReason) {
            self.on = on;
            self.writes.push((on, reason));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{testing::MemoryOutput, *};

    #[test]
    fn init_restores_persisted_state() {
        let config = SwitchConfig {
            state: true,
            ..SwitchConfig::default()
        };
        let mut switch = OutputSwitch::new(MemoryOutput::default(), config);
        switch.init();

        assert!(switch.output_state());
        assert_eq!(switch.output().writes, vec![(true, ChangeReason::Init)]);
    }

    #[test]
    fn set_output_state_persists_and_reports_change() {
        let mut switch = OutputSwitch::new(MemoryOutput::default(), SwitchConfig::default());

        assert!(switch.set_output_state(true, ChangeReason::Http));
        assert!(switch.persisted_state());
        assert!(!switch.set_output_state(true, ChangeReason::Http));
        assert_eq!(switch.output().writes.len(), 1);

        assert!(switch.set_output_state(false, ChangeReason::AutoOff));
        assert!(!switch.persisted_state());
    }
}
