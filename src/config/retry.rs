use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Exponential backoff template used by polling adapters
///
/// The delay before the Nth consecutive retry is
/// `min(base_delay_ms * multiplier^(N-1), max_delay_ms)`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Backoff base (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Growth factor applied after every consecutive failure
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,

    /// Maximum backoff time (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl BackoffPolicy {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Delay to wait after `failures` consecutive failures (1-based).
    pub fn delay_for(
        &self,
        failures: u32,
    ) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let factor = self.multiplier.saturating_pow(failures - 1);
        self.base_delay().saturating_mul(factor).min(self.max_delay())
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_delay_ms == 0 {
            return Err(Error::config("backoff base_delay_ms must be greater than 0"));
        }
        if self.multiplier == 0 {
            return Err(Error::config("backoff multiplier must be at least 1"));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(Error::config(format!(
                "backoff max_delay_ms ({}) must not be less than base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            )));
        }
        Ok(())
    }
}

/// Fixed delays used by session-oriented watch adapters
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Pause before re-registering a watch after a transient failure (unit: milliseconds)
    #[serde(default = "default_rewatch_delay_ms")]
    pub rewatch_delay_ms: u64,

    /// Pause between observing a lost session and reconnecting (unit: milliseconds)
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Session timeout used when a source does not set one (unit: milliseconds)
    #[serde(default = "default_session_timeout_ms")]
    pub default_timeout_ms: u64,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            rewatch_delay_ms: default_rewatch_delay_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            default_timeout_ms: default_session_timeout_ms(),
        }
    }
}

impl SessionPolicy {
    pub fn rewatch_delay(&self) -> Duration {
        Duration::from_millis(self.rewatch_delay_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rewatch_delay_ms == 0 {
            return Err(Error::config("session rewatch_delay_ms must be greater than 0"));
        }
        if self.reconnect_delay_ms == 0 {
            return Err(Error::config("session reconnect_delay_ms must be greater than 0"));
        }
        if self.default_timeout_ms == 0 {
            return Err(Error::config("session default_timeout_ms must be greater than 0"));
        }
        Ok(())
    }
}

fn default_base_delay_ms() -> u64 {
    1000
}
fn default_multiplier() -> u32 {
    2
}
fn default_max_delay_ms() -> u64 {
    30_000
}
fn default_rewatch_delay_ms() -> u64 {
    2000
}
fn default_reconnect_delay_ms() -> u64 {
    1000
}
fn default_session_timeout_ms() -> u64 {
    5000
}
