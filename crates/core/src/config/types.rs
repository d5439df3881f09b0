use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::converter::ConverterConfig;

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "tracksmith.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub converter: ConverterConfig,

    #[serde(default)]
    pub host_app: HostAppConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Path to the catalog database.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Encryption key of the catalog database, if it is encrypted.
    #[serde(default)]
    pub key: Option<String>,
}

/// The application that owns the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostAppConfig {
    /// Process names checked before writing. Empty disables the check.
    #[serde(default = "default_process_names")]
    pub process_names: Vec<String>,
}

impl Default for HostAppConfig {
    fn default() -> Self {
        Self {
            process_names: default_process_names(),
        }
    }
}

fn default_process_names() -> Vec<String> {
    crate::orchestrator::DEFAULT_OWNING_APP
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive (overridden by RUST_LOG).
    #[serde(default = "default_level")]
    pub level: String,

    /// Also write logs to this file.
    #[serde(default)]
    pub file: Option<PathBuf>,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: None,
            format: LogFormat::default(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Config {
    /// Copy with secrets redacted, for logging.
    pub fn redacted(&self) -> Config {
        let mut config = self.clone();
        if config.catalog.key.is_some() {
            config.catalog.key = Some("<redacted>".to_string());
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.catalog.path.is_none());
        assert_eq!(config.host_app.process_names, vec!["rekordbox".to_string()]);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Text);
        assert_eq!(config.converter.mp3_bitrate_kbps, 320);
    }

    #[test]
    fn test_redacted_hides_key() {
        let mut config = Config::default();
        config.catalog.key = Some("secret".to_string());
        let redacted = config.redacted();
        assert_eq!(redacted.catalog.key.as_deref(), Some("<redacted>"));
        assert!(!format!("{:?}", redacted).contains("secret"));
    }
}
