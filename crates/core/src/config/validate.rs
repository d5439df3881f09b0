use super::{types::Config, ConfigError};

const FFMPEG_LOG_LEVELS: [&str; 9] = [
    "quiet", "panic", "fatal", "error", "warning", "info", "verbose", "debug", "trace",
];

/// Validate configuration
/// Currently validates:
/// - Catalog path is set and not empty
/// - Converter tool paths are not empty
/// - ffmpeg log level is one ffmpeg accepts
/// - MP3 bit rate is within what LAME supports
/// - Owning application names are not blank
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    match &config.catalog.path {
        None => {
            return Err(ConfigError::ValidationError(
                "catalog.path is required (set it in the config file, TRACKSMITH_CATALOG__PATH, or --db)"
                    .to_string(),
            ))
        }
        Some(path) if path.as_os_str().is_empty() => {
            return Err(ConfigError::ValidationError(
                "catalog.path cannot be empty".to_string(),
            ))
        }
        Some(_) => {}
    }

    let converter = &config.converter;
    if converter.ffmpeg_path.as_os_str().is_empty() || converter.ffprobe_path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "converter.ffmpeg_path and converter.ffprobe_path cannot be empty".to_string(),
        ));
    }

    if !FFMPEG_LOG_LEVELS.contains(&converter.ffmpeg_log_level.as_str()) {
        return Err(ConfigError::ValidationError(format!(
            "converter.ffmpeg_log_level must be one of {}",
            FFMPEG_LOG_LEVELS.join(", ")
        )));
    }

    if !(32..=320).contains(&converter.mp3_bitrate_kbps) {
        return Err(ConfigError::ValidationError(
            "converter.mp3_bitrate_kbps must be between 32 and 320".to_string(),
        ));
    }

    if config.host_app.process_names.iter().any(|n| n.trim().is_empty()) {
        return Err(ConfigError::ValidationError(
            "host_app.process_names cannot contain empty names".to_string(),
        ));
    }

    Ok(())
}
