use std::time::Duration;

use crate::BackoffPolicy;

/// Consecutive-failure tracker driven by a [`BackoffPolicy`].
///
/// Each call to [`next_delay`](Self::next_delay) records one more failure and
/// returns the delay for it; [`reset`](Self::reset) is called on the first
/// success after a failure streak.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    policy: BackoffPolicy,
    failures: u32,
}

impl ExponentialBackoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            failures: 0,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        self.policy.delay_for(self.failures)
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// Length of the current failure streak.
    pub fn failures(&self) -> u32 {
        self.failures
    }
}
