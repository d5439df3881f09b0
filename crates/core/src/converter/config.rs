//! Configuration for the converter module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the FFmpeg-based converter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// Optional wall-clock limit for a single encode. Unset means no limit.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,

    /// Additional ffmpeg output arguments.
    #[serde(default)]
    pub extra_ffmpeg_args: Vec<String>,

    /// Bit rate used for lossy targets.
    #[serde(default = "default_mp3_bitrate")]
    pub mp3_bitrate_kbps: u32,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_log_level() -> String {
    "error".to_string()
}

fn default_mp3_bitrate() -> u32 {
    320
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            timeout_secs: None,
            ffmpeg_log_level: default_log_level(),
            extra_ffmpeg_args: Vec::new(),
            mp3_bitrate_kbps: default_mp3_bitrate(),
        }
    }
}

impl ConverterConfig {
    /// Creates a new config with custom ffmpeg/ffprobe paths.
    pub fn with_paths(ffmpeg_path: PathBuf, ffprobe_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
            ..Default::default()
        }
    }

    /// Sets the timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    /// Sets the bit rate for lossy targets.
    pub fn with_mp3_bitrate(mut self, kbps: u32) -> Self {
        self.mp3_bitrate_kbps = kbps;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConverterConfig::default();
        assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(config.ffprobe_path, PathBuf::from("ffprobe"));
        assert_eq!(config.timeout_secs, None);
        assert_eq!(config.mp3_bitrate_kbps, 320);
    }

    #[test]
    fn test_config_builder() {
        let config = ConverterConfig::with_paths(
            PathBuf::from("/usr/local/bin/ffmpeg"),
            PathBuf::from("/usr/local/bin/ffprobe"),
        )
        .with_timeout(600)
        .with_mp3_bitrate(256);

        assert_eq!(config.ffmpeg_path, PathBuf::from("/usr/local/bin/ffmpeg"));
        assert_eq!(config.timeout_secs, Some(600));
        assert_eq!(config.mp3_bitrate_kbps, 256);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ConverterConfig = toml::from_str("ffmpeg_log_level = \"warning\"").unwrap();
        assert_eq!(config.ffmpeg_log_level, "warning");
        assert_eq!(config.ffprobe_path, PathBuf::from("ffprobe"));
    }
}
