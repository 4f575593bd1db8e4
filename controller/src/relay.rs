use tracing::info;

use light_timer_common::{ChangeReason, OutputDriver};

/// In-memory stand-in for the relay; the host build has no GPIO.
#[derive(Debug, Clone, Default)]
pub struct RelayOutput {
    on: bool,
    switch_count: u64,
}

impl RelayOutput {
    pub fn switch_count(&self) -> u64 {
        self.switch_count
    }
}

impl OutputDriver for RelayOutput {
    fn state(&self) -> bool {
        self.on
    }

    fn set_state(&mut self, on: bool, reason: ChangeReason) {
        self.on = on;
        self.switch_count = self.switch_count.saturating_add(1);
        info!("relay {} ({reason})", if on { "ON" } else { "OFF" });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_state_and_switch_count() {
        let mut relay = RelayOutput::default();
        assert!(!relay.state());

        relay.set_state(true, ChangeReason::Http);
        relay.set_state(false, ChangeReason::AutoOff);

        assert!(!relay.state());
        assert_eq!(relay.switch_count(), 2);
    }
}
