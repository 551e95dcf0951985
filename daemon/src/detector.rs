//! Debounced low-activity trigger
//!
//! Counts consecutive low-activity decision ticks. Reaching the configured
//! number of ticks latches `shutdown_pending`, which only a restart clears.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TriggerState {
    pub consecutive_low_activity: u32,
    pub shutdown_pending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Unchanged,
    /// Another low-activity tick was counted. `initiate` is set on the tick
    /// that reaches the threshold.
    Counted { count: u32, initiate: bool },
    /// Activity came back after `previous` low-activity ticks.
    ActivityResumed { previous: u32 },
    /// A blackout window wiped `previous` low-activity ticks.
    BlackedOut { previous: u32 },
}

#[derive(Debug, Clone)]
pub struct TriggerDetector {
    state: TriggerState,
    threshold: u32,
}

impl TriggerDetector {
    pub fn new(threshold: u32) -> Self {
        Self { state: TriggerState::default(), threshold: threshold.max(1) }
    }

    pub fn observe(&mut self, low_activity: bool) -> Decision {
        if low_activity {
            if self.state.shutdown_pending {
                return Decision::Unchanged;
            }
            self.state.consecutive_low_activity += 1;
            let count = self.state.consecutive_low_activity;
            let initiate = count >= self.threshold;
            if initiate {
                self.state.shutdown_pending = true;
            }
            return Decision::Counted { count, initiate };
        }

        self.clear_count().map_or(Decision::Unchanged, |previous| Decision::ActivityResumed { previous })
    }

    pub fn blackout(&mut self) -> Decision {
        self.clear_count().map_or(Decision::Unchanged, |previous| Decision::BlackedOut { previous })
    }

    fn clear_count(&mut self) -> Option<u32> {
        let previous = self.state.consecutive_low_activity;
        if previous == 0 {
            return None;
        }
        self.state.consecutive_low_activity = 0;
        Some(previous)
    }

    /// Ticks still needed before shutdown after `count` low-activity ticks.
    pub fn remaining_ticks(&self, count: u32) -> u32 {
        self.threshold.saturating_sub(count)
    }

    pub fn reset(&mut self) {
        self.state = TriggerState::default();
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}
