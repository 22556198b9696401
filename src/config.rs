//! Configuration management for the schema registry
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (schema-registry.toml)
//! - Environment variables (SCHEMA_REGISTRY__*)
//!
//! ## Example config file (schema-registry.toml):
//! ```toml
//! [storage]
//! backend = "fs"
//! path = "./registry-data"
//! timeout_ms = 5000
//!
//! [auth]
//! secret_key = "change-me"
//!
//! [namespaces]
//! known = ["acme/prod", "acme/dev"]
//!
//! [events]
//! max_attempts = 3
//! retry_backoff_ms = 200
//!
//! [output]
//! format = "yaml"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::document::OutputFormat;
use crate::events::DispatchPolicy;

/// Main configuration for the schema registry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub namespaces: NamespaceConfig,

    #[serde(default)]
    pub events: EventsConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Which backend holds the schemas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    #[default]
    Fs,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: BackendKind,

    /// Root directory of the file-system backend
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,

    /// Bound on each backend call
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Permission token settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 key used to verify caller tokens. Without it every caller is allowed.
    #[serde(default)]
    pub secret_key: Option<String>,
}

/// Known namespaces, written `organization/namespace`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamespaceConfig {
    #[serde(default)]
    pub known: Vec<String>,
}

/// Relationship registration delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

// Default value functions
fn default_storage_path() -> PathBuf {
    PathBuf::from("./registry-data")
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    200
}

fn default_queue_capacity() -> usize {
    256
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            path: default_storage_path(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl StorageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl EventsConfig {
    pub fn policy(&self) -> DispatchPolicy {
        DispatchPolicy {
            max_attempts: self.max_attempts,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            queue_capacity: self.queue_capacity,
        }
    }
}

impl RegistryConfig {
    /// Load configuration, layering an explicit file over the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "schema-registry.toml",
            ".schema-registry.toml",
            "config/schema-registry.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "schema-registry") {
            let xdg_config = config_dir.config_dir().join("schema-registry.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // SCHEMA_REGISTRY__STORAGE__TIMEOUT_MS=1000
        builder = builder.add_source(
            Environment::with_prefix("SCHEMA_REGISTRY")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Storage root with relative paths resolved against the working directory
    pub fn storage_path(&self) -> PathBuf {
        if self.storage.path.is_absolute() {
            self.storage.path.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.storage.path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();
        assert_eq!(config.storage.backend, BackendKind::Fs);
        assert_eq!(config.storage.timeout(), Duration::from_secs(5));
        assert!(config.auth.secret_key.is_none());
        assert_eq!(config.output.format, OutputFormat::Yaml);
        assert_eq!(config.events.policy().max_attempts, 3);
    }

    #[test]
    fn test_serialize_config() {
        let config = RegistryConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[storage]"));
        assert!(toml_str.contains("[events]"));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.toml");
        std::fs::write(
            &path,
            "[storage]\nbackend = \"memory\"\ntimeout_ms = 250\n\n[namespaces]\nknown = [\"acme/prod\"]\n",
        )
        .unwrap();

        let config = RegistryConfig::load_from(path.to_str()).unwrap();
        assert_eq!(config.storage.backend, BackendKind::Memory);
        assert_eq!(config.storage.timeout_ms, 250);
        assert_eq!(config.namespaces.known, vec!["acme/prod".to_string()]);
    }
}
