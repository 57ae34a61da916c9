//! Configuration Aggregator Error Hierarchy
//!
//! Only construction and registration surface these errors to callers.
//! Background watch, poll and reconnect loops log failures and keep serving the
//! last good settings instead.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid required property, or a malformed aggregator config
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A session or client connection could not be (re-)established
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// A payload could not be decoded into a settings mapping
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Backend read failures that are not connectivity problems
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The provider tag does not name any known backend family
    #[error("Unknown provider type: {0}")]
    UnknownProvider(String),

    /// Unrecoverable failures
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Endpoint could not be reached
    #[error("Failed to connect to {endpoint}: {reason}")]
    Unreachable { endpoint: String, reason: String },

    /// Session or client was closed underneath the caller
    #[error("Connection closed")]
    Closed,

    /// Backend-specific connection failure
    #[error("Backend connection error: {0}")]
    Backend(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("YAML decode failed: {0}")]
    Yaml(String),

    /// The payload parsed, but its top level is not a mapping
    #[error("Expected a mapping at the top level, found {found}")]
    NotAMap { found: &'static str },
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Remote path not found: {path}")]
    NotFound { path: String },

    #[error("Remote request rejected: {0}")]
    Rejected(String),
}

impl Error {
    /// Shorthand for validation failures reported as configuration errors.
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Config(ConfigError::Message(msg.into()))
    }

    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}
