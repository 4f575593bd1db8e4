use tracing::info;

pub const REFRESH_PERIOD_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TickHandle {
    next_due_ms: u64,
}

/// Repeating 1-second tick that drives re-evaluation of the dial while a
/// countdown runs. Holds no state beyond its own schedule.
#[derive(Debug, Clone, Default)]
pub struct RefreshScheduler {
    handle: Option<TickHandle>,
}

impl RefreshScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re)installs the tick, or drops it when there is no countdown to watch.
    /// Returns whether the tick is running afterwards.
    pub fn arm(&mut self, countdown_armed: bool, now_ms: u64) -> bool {
        if !countdown_armed {
            info!("auto off timer is not running, skip arming update timer");
            self.handle = None;
            return false;
        }

        info!("arming update timer");
        self.handle = Some(TickHandle {
            next_due_ms: now_ms.saturating_add(REFRESH_PERIOD_MS),
        });
        true
    }

    pub fn clear(&mut self) {
        self.handle = None;
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }

    pub fn next_due_ms(&self) -> Option<u64> {
        self.handle.map(|handle| handle.next_due_ms)
    }

    /// Consumes a due tick. Periods missed by a late poll collapse into one.
    pub fn take_due(&mut self, now_ms: u64) -> bool {
        let Some(handle) = self.handle.as_mut() else {
            return false;
        };
        if now_ms < handle.next_due_ms {
            return false;
        }

        let missed = (now_ms - handle.next_due_ms) / REFRESH_PERIOD_MS;
        handle.next_due_ms += (missed + 1) * REFRESH_PERIOD_MS;
        true
    }
}

/// Last dial/output pair reported to the observer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObservedState {
    last_percent: Option<u8>,
    last_output_on: bool,
}

impl ObservedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_percent(&self) -> Option<u8> {
        self.last_percent
    }

    /// Records the pair and returns whether it differs from what was last
    /// reported. Nothing reported yet always counts as a difference.
    pub fn record(&mut self, percent: u8, output_on: bool) -> bool {
        let changed = self.last_percent != Some(percent) || output_on != self.last_output_on;
        if changed {
            self.last_percent = Some(percent);
            self.last_output_on = output_on;
        }
        changed
    }
}
