//! Configuration for the aggregator and for the sources it registers.
//!
//! Aggregator timing policies are loaded hierarchically:
//! 1. Default values (hardcoded)
//! 2. Config file named by `CONFIG_PATH`
//! 3. Environment variables prefixed `CONFBRIDGE__` (highest priority)
//!
//! Source registrations are described either by a raw [`SourceSpec`] (provider
//! tag plus an untyped property bag) or directly by a typed [`SourceConfig`].
//! Both are validated before any adapter is constructed.

mod retry;
mod source;
pub use retry::*;
pub use source::*;


use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

const ENV_PREFIX: &str = "CONFBRIDGE";

/// Timing policies shared by every adapter the aggregator builds
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregatorConfig {
    /// Long-poll retry policy for remote key/value adapters
    #[serde(default)]
    pub polling: BackoffPolicy,
    /// Re-watch and reconnect delays for session-oriented adapters
    #[serde(default)]
    pub session: SessionPolicy,
}

impl AggregatorConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Callers MUST call `validate()` before using the configuration.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("CONFBRIDGE__POLLING__MAX_DELAY_MS", "10000");
    /// let cfg = AggregatorConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional overrides from a config file, then the environment.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    pub fn validate(self) -> Result<Self> {
        self.polling.validate()?;
        self.session.validate()?;
        Ok(self)
    }
}
