//! Types for the converter module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::format::AudioFormat;

/// Audio stream fields as reported by ffprobe.
///
/// ffprobe emits some numeric fields as strings, so they are kept raw here and
/// parsed during resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioStream {
    pub codec_type: Option<String>,
    pub codec_name: Option<String>,
    pub sample_fmt: Option<String>,
    pub sample_rate: Option<String>,
    pub channels: Option<u32>,
    pub bits_per_sample: Option<u32>,
    pub bits_per_raw_sample: Option<String>,
    pub bit_rate: Option<String>,
}

/// Properties of a lossless audio file, every load-bearing field resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioProperties {
    /// Bits per sample.
    pub bit_depth: u32,
    /// Sample rate in Hz, when reported.
    pub sample_rate: Option<u32>,
    /// Channel count, when reported.
    pub channels: Option<u32>,
    /// Bit rate in kbps.
    pub bit_rate_kbps: u32,
}

/// Properties of an encoded output file.
///
/// Lossy outputs carry no intrinsic bit depth, so it is optional here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputProperties {
    pub bit_depth: Option<u32>,
    pub sample_rate: Option<u32>,
    pub bit_rate_kbps: u32,
}

/// A single encode request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeJob {
    /// Identifier used in logs (the catalog record ID).
    pub job_id: String,
    /// Source file.
    pub input_path: PathBuf,
    /// Destination file. Any existing file is overwritten.
    pub output_path: PathBuf,
    /// Target format.
    pub format: AudioFormat,
    /// FFmpeg audio codec.
    pub codec: String,
}

/// Result of a completed encode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeResult {
    pub job_id: String,
    pub output_path: PathBuf,
    /// Size of the written file, when it could be read back.
    pub output_size_bytes: Option<u64>,
    pub duration_ms: u64,
}
