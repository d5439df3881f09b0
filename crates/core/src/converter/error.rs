//! Error types for the converter module.

use std::path::PathBuf;
use thiserror::Error;

/// Guidance shown when ffmpeg or ffprobe cannot be found.
pub const INSTALL_GUIDANCE: &str = "FFmpeg is required. Install it from https://ffmpeg.org/download.html \
     (or via your package manager) and make sure ffmpeg and ffprobe are on PATH";

/// Errors that can occur while probing or encoding.
#[derive(Debug, Error)]
pub enum ConverterError {
    /// The external tool is not discoverable.
    #[error("{tool} not found at {}. {}", .path.display(), INSTALL_GUIDANCE)]
    ToolNotAvailable { tool: &'static str, path: PathBuf },

    /// Input file not found.
    #[error("Input file not found: {}", .path.display())]
    InputNotFound { path: PathBuf },

    /// The probed file has no audio stream.
    #[error("No audio stream found in {}", .path.display())]
    NoAudioStream { path: PathBuf },

    /// None of the bit depth fields yielded a usable value.
    #[error("No valid bit depth found for {}", .path.display())]
    UnresolvedBitDepth { path: PathBuf },

    /// Neither the stream bit rate nor the computed fallback is available.
    #[error("No valid bitrate found for {}", .path.display())]
    UnresolvedBitRate { path: PathBuf },

    /// ffprobe ran but reported failure.
    #[error("Failed to probe media file: {reason}")]
    ProbeFailed { reason: String },

    /// ffmpeg ran but the encode did not complete.
    #[error("Encode failed: {reason}")]
    EncodeFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// Encode exceeded the configured timeout.
    #[error("Encode timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// I/O error while running a tool.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse ffprobe output.
    #[error("Failed to parse media info: {reason}")]
    ParseError { reason: String },
}

impl ConverterError {
    /// Creates an encode failure carrying captured diagnostics.
    pub fn encode_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::EncodeFailed {
            reason: reason.into(),
            stderr,
        }
    }

    /// Creates a new probe failed error.
    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
        }
    }

    /// Diagnostic output captured from the tool, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::EncodeFailed { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }

    /// Whether the error means a tool is missing rather than a file problem.
    pub fn is_tool_missing(&self) -> bool {
        matches!(self, Self::ToolNotAvailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_not_available_carries_guidance() {
        let err = ConverterError::ToolNotAvailable {
            tool: "ffprobe",
            path: PathBuf::from("ffprobe"),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("ffprobe not found at ffprobe."));
        assert!(msg.contains("FFmpeg is required"));
        assert!(err.is_tool_missing());
    }

    #[test]
    fn test_encode_failed_keeps_stderr() {
        let err = ConverterError::encode_failed("exit code 1", Some("Invalid data".into()));
        assert_eq!(err.stderr(), Some("Invalid data"));
        assert_eq!(err.to_string(), "Encode failed: exit code 1");
    }
}
