//! Restart rate limiter backing Phase 1 of the Unified Health Monitor
//! (spec.md §4.4): bounds how often the Relay subprocess may be restarted.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::models::RestartHistory;

/// Gate on `relay.stop()+relay.start()`: allowed iff enough time has passed
/// since the last restart and the window isn't already saturated.
pub struct RestartLimiter {
    history: RestartHistory,
    cooldown: Duration,
    window: Duration,
    max_per_window: usize,
}

impl RestartLimiter {
    pub fn new(capacity: usize, cooldown: Duration, window: Duration, max_per_window: usize) -> Self {
        Self {
            history: RestartHistory::new(capacity),
            cooldown,
            window,
            max_per_window,
        }
    }

    /// `allowed()` (spec.md §4.4): "(a) time since last restart ≥
    /// RESTART_COOLDOWN, and (b) fewer than MAX_RESTARTS_PER_WINDOW restarts
    /// occurred in the last RESTART_WINDOW".
    pub fn allowed(&self, now: DateTime<Utc>) -> bool {
        if let Some(last) = self.history.last() {
            let since_last = now.signed_duration_since(last);
            if since_last < chrono::Duration::from_std(self.cooldown).unwrap_or_default() {
                return false;
            }
        }
        let window_start = now - chrono::Duration::from_std(self.window).unwrap_or_default();
        self.history.count_since(window_start) < self.max_per_window
    }

    pub fn record(&self, at: DateTime<Utc>) {
        self.history.record(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbids_restart_within_cooldown() {
        let limiter = RestartLimiter::new(10, Duration::from_secs(120), Duration::from_secs(600), 5);
        let t0 = Utc::now();
        limiter.record(t0);
        assert!(!limiter.allowed(t0 + chrono::Duration::seconds(10)));
        assert!(limiter.allowed(t0 + chrono::Duration::seconds(121)));
    }

    #[test]
    fn forbids_restart_beyond_window_cap() {
        let limiter = RestartLimiter::new(10, Duration::from_secs(0), Duration::from_secs(600), 2);
        let t0 = Utc::now();
        limiter.record(t0);
        limiter.record(t0 + chrono::Duration::seconds(1));
        assert!(!limiter.allowed(t0 + chrono::Duration::seconds(2)));
    }
}
