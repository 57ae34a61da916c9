//! Per-source registration input.
//!
//! [`SourceSpec`] mirrors the untyped registration shape (`provider` tag,
//! backend-specific `properties`, document `sources`, `config_type`).
//! [`SourceSpec::validate`] turns it into a typed [`SourceConfig`], rejecting
//! unknown providers and missing properties up front.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::utils::time::parse_duration;
use crate::ConfigFormat;
use crate::Error;
use crate::Result;

/// Backend-specific connection parameters, kept opaque until validation.
pub type Properties = Map<String, Value>;

pub const PROPERTY_ENDPOINT: &str = "endpoint";
pub const PROPERTY_PATH: &str = "path";
pub const PROPERTY_TIMEOUT: &str = "timeout";

/// One remote document served by a document store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentSource {
    pub data_id: String,
    pub group: String,
}

impl DocumentSource {
    pub fn new(
        data_id: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        Self {
            data_id: data_id.into(),
            group: group.into(),
        }
    }

    /// Fragment identifier inside a document-store adapter: `group:data_id`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.group, self.data_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KvBackend {
    Etcd,
    Consul,
    Firestore,
}

impl KvBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            KvBackend::Etcd => "etcd",
            KvBackend::Consul => "consul",
            KvBackend::Firestore => "firestore",
        }
    }
}

/// Backend family selected by a provider tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    DocumentStore,
    RemoteKv(KvBackend),
    SessionWatch,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::DocumentStore => "nacos",
            ProviderKind::RemoteKv(backend) => backend.as_str(),
            ProviderKind::SessionWatch => "zookeeper",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(tag: &str) -> Result<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "nacos" | "document_store" => Ok(ProviderKind::DocumentStore),
            "etcd" => Ok(ProviderKind::RemoteKv(KvBackend::Etcd)),
            "consul" => Ok(ProviderKind::RemoteKv(KvBackend::Consul)),
            "firestore" => Ok(ProviderKind::RemoteKv(KvBackend::Firestore)),
            "zookeeper" | "session_watch" => Ok(ProviderKind::SessionWatch),
            _ => Err(Error::UnknownProvider(tag.to_string())),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Untyped registration input for one source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSpec {
    pub provider: String,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub sources: Vec<DocumentSource>,
    #[serde(default)]
    pub config_type: ConfigFormat,
}

impl SourceSpec {
    /// Validates every provider-specific requirement and builds the typed config.
    pub fn validate(&self) -> Result<SourceConfig> {
        let kind: ProviderKind = self.provider.parse()?;
        let provider = match kind {
            ProviderKind::DocumentStore => ProviderConfig::DocumentStore(DocumentStoreConfig {
                properties: self.properties.clone(),
                sources: self.sources.clone(),
            }),
            ProviderKind::RemoteKv(backend) => ProviderConfig::RemoteKv(RemoteKvConfig {
                backend,
                endpoint: required_str(&self.properties, PROPERTY_ENDPOINT)?,
                path: required_str(&self.properties, PROPERTY_PATH)?,
            }),
            ProviderKind::SessionWatch => {
                let endpoint = required_str(&self.properties, PROPERTY_ENDPOINT)?;
                let path = required_str(&self.properties, PROPERTY_PATH)?;
                let timeout = self.properties.get(PROPERTY_TIMEOUT).map(parse_timeout).transpose()?;
                ProviderConfig::SessionWatch(SessionWatchConfig {
                    servers: split_endpoint(&endpoint),
                    path,
                    timeout,
                })
            }
        };

        let config = SourceConfig {
            provider,
            format: self.config_type,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Typed registration input for one source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    pub provider: ProviderConfig,
    pub format: ConfigFormat,
}

impl SourceConfig {
    pub fn new(
        provider: ProviderConfig,
        format: ConfigFormat,
    ) -> Self {
        Self { provider, format }
    }

    pub fn kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    pub fn validate(&self) -> Result<()> {
        match &self.provider {
            ProviderConfig::DocumentStore(c) => c.validate(),
            ProviderConfig::RemoteKv(c) => c.validate(),
            ProviderConfig::SessionWatch(c) => c.validate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderConfig {
    DocumentStore(DocumentStoreConfig),
    RemoteKv(RemoteKvConfig),
    SessionWatch(SessionWatchConfig),
}

impl ProviderConfig {
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderConfig::DocumentStore(_) => ProviderKind::DocumentStore,
            ProviderConfig::RemoteKv(c) => ProviderKind::RemoteKv(c.backend),
            ProviderConfig::SessionWatch(_) => ProviderKind::SessionWatch,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentStoreConfig {
    /// Client and server descriptors handed to the document client factory as-is
    pub properties: Properties,
    pub sources: Vec<DocumentSource>,
}

impl DocumentStoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.properties.is_empty() {
            return Err(Error::config("properties is required"));
        }
        if self.sources.is_empty() {
            return Err(Error::config("sources is required"));
        }
        for source in &self.sources {
            if source.data_id.trim().is_empty() || source.group.trim().is_empty() {
                return Err(Error::config(format!(
                    "source {:?} must name both data_id and group",
                    source
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteKvConfig {
    pub backend: KvBackend,
    pub endpoint: String,
    pub path: String,
}

impl RemoteKvConfig {
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(Error::config("endpoint is required"));
        }
        if self.path.trim().is_empty() {
            return Err(Error::config("path is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionWatchConfig {
    pub servers: Vec<String>,
    pub path: String,
    /// Session timeout; `None` uses [`crate::SessionPolicy::default_timeout`]
    pub timeout: Option<Duration>,
}

impl SessionWatchConfig {
    /// `endpoint` is a comma-separated host list.
    pub fn new(
        endpoint: &str,
        path: impl Into<String>,
    ) -> Self {
        Self {
            servers: split_endpoint(endpoint),
            path: path.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.servers.is_empty() {
            return Err(Error::config("endpoint is required"));
        }
        if self.path.trim().is_empty() {
            return Err(Error::config("path is required"));
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(Error::config("timeout must be greater than 0"));
        }
        Ok(())
    }
}

fn required_str(
    properties: &Properties,
    name: &str,
) -> Result<String> {
    if properties.is_empty() {
        return Err(Error::config("properties is required"));
    }
    match properties.get(name).and_then(Value::as_str) {
        Some(value) if !value.trim().is_empty() => Ok(value.to_string()),
        _ => Err(Error::config(format!("{name} is required"))),
    }
}

fn split_endpoint(endpoint: &str) -> Vec<String> {
    endpoint
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Session timeout property: integer or float milliseconds, or a duration
/// literal such as `"5s"` or `"1m30s"`.
pub fn parse_timeout(value: &Value) -> Result<Duration> {
    match value {
        Value::Number(n) => {
            if let Some(ms) = n.as_u64() {
                return Ok(Duration::from_millis(ms));
            }
            match n.as_f64() {
                Some(ms) if ms.is_finite() && ms >= 0.0 => {
                    Ok(Duration::from_nanos((ms * 1_000_000.0).round() as u64))
                }
                _ => Err(Error::config(format!("invalid timeout value: {n}"))),
            }
        }
        Value::String(literal) => parse_duration(literal),
        other => Err(Error::config(format!("invalid timeout type: {other}"))),
    }
}
