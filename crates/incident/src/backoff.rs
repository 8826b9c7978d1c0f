//! Per-provider exponential backoff.
//!
//! Every consecutive failure doubles the wait before the next attempt, capped
//! at [`MAX_BACKOFF_MULTIPLIER`] base intervals. A single success clears it.

use std::{collections::HashMap, time::Duration};

use tokio::time::Instant;

/// Upper bound on the multiplier applied to the base interval.
pub const MAX_BACKOFF_MULTIPLIER: u32 = 8;

/// Hard ceiling on any single backoff delay.
pub const MAX_BACKOFF_DELAY: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Poll bookkeeping for one provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderPollState {
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// Start of the most recent attempt.
    pub last_attempt: Option<Instant>,
}

impl ProviderPollState {
    /// Instant before which the provider must not be polled, `None` when it may be polled now.
    pub fn next_allowed_at(&self, base: Duration) -> Option<Instant> {
        if self.consecutive_failures == 0 {
            return None;
        }
        let delay = backoff_delay(base, self.consecutive_failures);
        self.last_attempt.map(|last| last.checked_add(delay).unwrap_or(last + MAX_BACKOFF_DELAY))
    }
}

/// Delay after `failures` consecutive failures: `base × min(2^(failures-1), 8)`,
/// never more than [`MAX_BACKOFF_DELAY`].
pub fn backoff_delay(base: Duration, failures: u32) -> Duration {
    if failures == 0 {
        return Duration::ZERO;
    }
    let multiplier = 2u32.saturating_pow(failures - 1).min(MAX_BACKOFF_MULTIPLIER);
    base.saturating_mul(multiplier).min(MAX_BACKOFF_DELAY)
}

/// Failure counters keyed by provider.
#[derive(Debug, Clone)]
pub struct BackoffTracker {
    base_interval: Duration,
    states: HashMap<String, ProviderPollState>,
}

impl BackoffTracker {
    /// Creates a tracker whose delays are multiples of `base_interval`.
    pub fn new(base_interval: Duration) -> Self {
        Self { base_interval, states: HashMap::new() }
    }

    /// Unit of backoff delay.
    pub const fn base_interval(&self) -> Duration {
        self.base_interval
    }

    /// Poll state for `key`, if it was ever attempted.
    pub fn state(&self, key: &str) -> Option<&ProviderPollState> {
        self.states.get(key)
    }

    /// Failures since the last success.
    pub fn consecutive_failures(&self, key: &str) -> u32 {
        self.states.get(key).map_or(0, |s| s.consecutive_failures)
    }

    /// Instant before which `key` must not be polled, `None` for no delay.
    pub fn next_allowed_at(&self, key: &str) -> Option<Instant> {
        self.states.get(key).and_then(|s| s.next_allowed_at(self.base_interval))
    }

    /// Whether `key` may be polled at `now`.
    pub fn is_due(&self, key: &str, now: Instant) -> bool {
        self.next_allowed_at(key).is_none_or(|at| now >= at)
    }

    /// Stamps the start of an attempt.
    pub fn record_attempt(&mut self, key: &str, now: Instant) {
        self.states.entry(key.to_owned()).or_default().last_attempt = Some(now);
    }

    /// Clears the failure count. Returns the previous count when this is a recovery.
    pub fn record_success(&mut self, key: &str) -> Option<u32> {
        let state = self.states.entry(key.to_owned()).or_default();
        let previous = std::mem::take(&mut state.consecutive_failures);
        (previous > 0).then_some(previous)
    }

    /// Counts a failure and returns the delay before the next attempt.
    pub fn record_failure(&mut self, key: &str) -> Duration {
        let state = self.states.entry(key.to_owned()).or_default();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        backoff_delay(self.base_interval, state.consecutive_failures)
    }
}
