#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Countdown {
    Disarmed,
    Armed { deadline_ms: u64, duration_ms: u64 },
}

/// The single auto-off countdown owned by a light timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoOffTimer {
    countdown: Countdown,
}

impl Default for AutoOffTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl AutoOffTimer {
    pub const fn new() -> Self {
        Self {
            countdown: Countdown::Disarmed,
        }
    }

    /// Replaces any running countdown with one of `duration_ms`.
    pub fn arm(&mut self, duration_ms: u64, now_ms: u64) {
        self.countdown = Countdown::Armed {
            deadline_ms: now_ms.saturating_add(duration_ms),
            duration_ms,
        };
    }

    pub fn clear(&mut self) {
        self.countdown = Countdown::Disarmed;
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.countdown, Countdown::Armed { .. })
    }

    pub fn deadline_ms(&self) -> Option<u64> {
        match self.countdown {
            Countdown::Armed { deadline_ms, .. } => Some(deadline_ms),
            Countdown::Disarmed => None,
        }
    }

    pub fn duration_ms(&self) -> Option<u64> {
        match self.countdown {
            Countdown::Armed { duration_ms, .. } => Some(duration_ms),
            Countdown::Disarmed => None,
        }
    }

    /// Milliseconds left, 0 when disarmed or past the deadline.
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.deadline_ms()
            .map(|deadline| deadline.saturating_sub(now_ms))
            .unwrap_or(0)
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.deadline_ms()
            .map(|deadline| now_ms >= deadline)
            .unwrap_or(false)
    }
}
