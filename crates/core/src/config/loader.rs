use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{
    types::{Config, DEFAULT_CONFIG_FILE},
    ConfigError,
};

/// Prefix of environment variable overrides, e.g. `TRACKSMITH_CATALOG__PATH`.
pub const ENV_PREFIX: &str = "TRACKSMITH_";

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    extract(Figment::new().merge(Toml::file(path)))
}

/// Load configuration from an explicit file, else `tracksmith.toml` if present,
/// else defaults. Environment overrides apply in every case.
pub fn load_config_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.exists() {
                load_config(default)
            } else {
                extract(Figment::new())
            }
        }
    }
}

fn extract(figment: Figment) -> Result<Config, ConfigError> {
    figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFormat;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[catalog]
path = "/data/master.db"

[converter]
mp3_bitrate_kbps = 256

[logging]
level = "debug"
format = "json"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.catalog.path, Some(PathBuf::from("/data/master.db")));
        assert_eq!(config.converter.mp3_bitrate_kbps, 256);
        assert_eq!(config.converter.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_load_config_from_str_empty_uses_defaults() {
        let config = load_config_from_str("").unwrap();
        assert!(config.catalog.path.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_config_from_str_bad_type() {
        let toml = r#"
[converter]
mp3_bitrate_kbps = "fast"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/tracksmith.toml"));
        assert!(matches!(result.unwrap_err(), ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[catalog]
path = "/data/master.db"

[host_app]
process_names = ["rekordbox", "rekordboxAgent"]
"#
        )
        .unwrap();

        let config = load_config_or_default(Some(temp_file.path())).unwrap();
        assert_eq!(config.catalog.path, Some(PathBuf::from("/data/master.db")));
        assert_eq!(config.host_app.process_names.len(), 2);
    }
}
