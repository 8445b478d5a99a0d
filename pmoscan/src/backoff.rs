//! Stale-tick escalation
//!
//! A tick is stale when no channel's `got_time` advanced since the previous
//! tick. Consecutive stale ticks stretch the loop interval tier by tier and
//! eventually stop the loop altogether.

use crate::config::{BackoffConfig, BackoffTier};
use std::time::Duration;

/// Counter of consecutive stale ticks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackoffState {
    pub consecutive_stale_ticks: u32,
}

impl BackoffState {
    pub fn reset(&mut self) {
        self.consecutive_stale_ticks = 0;
    }
}

/// Outcome of one re-arm decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffDecision {
    /// Re-arm after the loop interval times this multiplier
    Continue(u32),
    /// Too many stale ticks; stop re-arming
    Stop,
}

impl BackoffDecision {
    /// Apply the decision to a loop interval, saturating on overflow
    pub fn delay(self, interval: Duration) -> Option<Duration> {
        match self {
            BackoffDecision::Continue(multiplier) => {
                Some(interval.checked_mul(multiplier).unwrap_or(Duration::MAX))
            }
            BackoffDecision::Stop => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackoffController {
    state: BackoffState,
    tiers: Vec<BackoffTier>,
    terminal_after: u32,
}

impl BackoffController {
    pub fn new(config: &BackoffConfig) -> Self {
        let mut tiers = config.tiers.clone();
        tiers.sort_by_key(|tier| tier.until);
        Self {
            state: BackoffState::default(),
            tiers,
            terminal_after: config.terminal_after,
        }
    }

    pub fn state(&self) -> BackoffState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Record one tick and decide how long to wait before the next.
    pub fn next(&mut self, advanced: bool) -> BackoffDecision {
        if advanced {
            self.state.reset();
            return BackoffDecision::Continue(1);
        }

        self.state.consecutive_stale_ticks = self.state.consecutive_stale_ticks.saturating_add(1);
        let count = self.state.consecutive_stale_ticks;
        if count >= self.terminal_after {
            return BackoffDecision::Stop;
        }
        match self.tiers.iter().find(|tier| count < tier.until) {
            Some(tier) => BackoffDecision::Continue(tier.multiplier.max(1)),
            None => BackoffDecision::Stop,
        }
    }
}

impl Default for BackoffController {
    fn default() -> Self {
        Self::new(&BackoffConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn after_stale_ticks(count: u32) -> BackoffDecision {
        let mut controller = BackoffController::default();
        let mut decision = BackoffDecision::Continue(1);
        for _ in 0..count {
            decision = controller.next(false);
        }
        decision
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(after_stale_ticks(99), BackoffDecision::Continue(1));
        assert_eq!(after_stale_ticks(101), BackoffDecision::Continue(10));
        assert_eq!(after_stale_ticks(151), BackoffDecision::Continue(20));
        assert_eq!(after_stale_ticks(741), BackoffDecision::Continue(50));
        assert_eq!(after_stale_ticks(4001), BackoffDecision::Stop);
    }

    #[test]
    fn test_advance_resets_counter() {
        let mut controller = BackoffController::default();
        for _ in 0..120 {
            controller.next(false);
        }
        assert_eq!(controller.state().consecutive_stale_ticks, 120);
        assert_eq!(controller.next(true), BackoffDecision::Continue(1));
        assert_eq!(controller.state().consecutive_stale_ticks, 0);
        assert_eq!(controller.next(false), BackoffDecision::Continue(1));
    }

    #[test]
    fn test_custom_tiers() {
        let config = BackoffConfig {
            tiers: vec![BackoffTier { until: 3, multiplier: 2 }],
            terminal_after: 5,
        };
        let mut controller = BackoffController::new(&config);
        assert_eq!(controller.next(false), BackoffDecision::Continue(2));
        assert_eq!(controller.next(false), BackoffDecision::Continue(2));
        // Past the last tier but below the terminal threshold
        assert_eq!(controller.next(false), BackoffDecision::Stop);
    }

    #[test]
    fn test_delay() {
        let base = Duration::from_millis(100);
        assert_eq!(BackoffDecision::Continue(10).delay(base), Some(Duration::from_secs(1)));
        assert_eq!(BackoffDecision::Stop.delay(base), None);
    }

    #[test]
    fn test_delay_saturates() {
        let huge = Duration::from_secs(u64::MAX / 2);
        assert_eq!(BackoffDecision::Continue(50).delay(huge), Some(Duration::MAX));
    }
}
