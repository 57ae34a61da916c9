//! Payload codecs: raw bytes fetched from a backend to a [`Settings`] tree.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::DecodeError;
use crate::Result;
use crate::Settings;

/// Format of the remote documents served by one source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFormat {
    #[default]
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Parses a format tag. Anything that is not `json` is read as YAML.
    pub fn from_tag(tag: &str) -> Self {
        if tag.eq_ignore_ascii_case("json") {
            ConfigFormat::Json
        } else {
            ConfigFormat::Yaml
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Json => "json",
        }
    }

    pub fn codec(&self) -> Arc<dyn Codec> {
        match self {
            ConfigFormat::Json => Arc::new(JsonCodec),
            ConfigFormat::Yaml => Arc::new(YamlCodec),
        }
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait Codec: Send + Sync + 'static {
    fn decode(
        &self,
        data: &[u8],
    ) -> Result<Settings>;

    fn encode(
        &self,
        settings: &Settings,
    ) -> Result<Vec<u8>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn decode(
        &self,
        data: &[u8],
    ) -> Result<Settings> {
        if is_blank(data) {
            return Ok(Settings::new());
        }
        let value: Value = serde_json::from_slice(data).map_err(DecodeError::Json)?;
        into_settings(value)
    }

    fn encode(
        &self,
        settings: &Settings,
    ) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(settings).map_err(DecodeError::Json)?)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct YamlCodec;

impl Codec for YamlCodec {
    fn decode(
        &self,
        data: &[u8],
    ) -> Result<Settings> {
        if is_blank(data) {
            return Ok(Settings::new());
        }
        let text = std::str::from_utf8(data).map_err(|e| DecodeError::Yaml(e.to_string()))?;
        let value: Value = serde_saphyr::from_str_with_options(
            text,
            serde_saphyr::Options {
                strict_booleans: true,
                ..serde_saphyr::Options::default()
            },
        )
        .map_err(|e| DecodeError::Yaml(e.to_string()))?;
        into_settings(value)
    }

    fn encode(
        &self,
        settings: &Settings,
    ) -> Result<Vec<u8>> {
        let text = serde_saphyr::to_string(settings).map_err(|e| DecodeError::Yaml(e.to_string()))?;
        Ok(text.into_bytes())
    }
}

fn is_blank(data: &[u8]) -> bool {
    data.iter().all(u8::is_ascii_whitespace)
}

/// A document whose top level is `null` (e.g. only comments) is empty settings.
fn into_settings(value: Value) -> Result<Settings> {
    match value {
        Value::Object(map) => Ok(Settings::from(map)),
        Value::Null => Ok(Settings::new()),
        other => Err(DecodeError::NotAMap {
            found: value_kind(&other),
        }
        .into()),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}
