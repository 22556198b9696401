//! Document normalization
//!
//! Schemas and configurations arrive as JSON or YAML text. Both are parsed
//! into a `serde_json::Value`, which is the canonical form used for
//! compilation, validation, checksums, and storage.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Surface syntax used when rendering a stored document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

/// Parse JSON or YAML text into canonical form.
///
/// JSON is tried first so that tab-indented JSON (not valid YAML) is still
/// accepted; anything else goes through the YAML parser, whose error is the
/// one reported.
pub fn parse(text: &str) -> Result<Value, serde_yaml::Error> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Ok(value);
    }
    serde_yaml::from_str::<Value>(text)
}

/// Compact JSON text of a canonical document. Object keys come out sorted.
pub fn to_canonical_string(value: &Value) -> String {
    value.to_string()
}

/// Render a canonical document in the requested surface syntax
pub fn render(value: &Value, format: OutputFormat) -> Result<String, serde_yaml::Error> {
    match format {
        OutputFormat::Yaml => serde_yaml::to_string(value),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())),
    }
}
