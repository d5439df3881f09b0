//! Mock converter for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::converter::{AudioStream, Converter, ConverterError, EncodeJob, EncodeResult};

use super::fixtures;

/// A recorded encode for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedEncode {
    /// The job that was submitted.
    pub job: EncodeJob,
    /// Whether the encode succeeded.
    pub success: bool,
}

/// Mock implementation of the Converter trait.
///
/// Encodes write a small file at the output path and remember the stream a
/// real encoder would have produced for the requested codec, so probing the
/// output afterwards behaves like ffprobe would.
///
/// # Example
///
/// ```rust,ignore
/// use tracksmith_core::testing::{fixtures, MockConverter};
///
/// let converter = MockConverter::new();
/// converter.set_probe_result("/music/a.flac", fixtures::flac_stream(24)).await;
/// converter.fail_encode_for("/music/b.flac", "disk full").await;
///
/// let encodes = converter.recorded_encodes().await;
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockConverter {
    encodes: Arc<RwLock<Vec<RecordedEncode>>>,
    /// Streams set by the test. They win over encoded outputs.
    probe_results: Arc<RwLock<HashMap<PathBuf, AudioStream>>>,
    /// Streams of outputs written by `encode`.
    written: Arc<RwLock<HashMap<PathBuf, AudioStream>>>,
    failing_inputs: Arc<RwLock<HashMap<PathBuf, String>>>,
    /// Inputs whose encode fails before anything is written.
    unreadable_inputs: Arc<RwLock<HashMap<PathBuf, String>>>,
    /// Inputs whose encode reports success without writing a file.
    missing_outputs: Arc<RwLock<HashSet<PathBuf>>>,
    validate_error: Arc<RwLock<Option<PathBuf>>>,
    encode_delay: Arc<RwLock<Duration>>,
}

impl MockConverter {
    /// Create a new mock converter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded encodes.
    pub async fn recorded_encodes(&self) -> Vec<RecordedEncode> {
        self.encodes.read().await.clone()
    }

    /// Number of encodes attempted.
    pub async fn encode_count(&self) -> usize {
        self.encodes.read().await.len()
    }

    /// Set the stream returned when probing a path.
    pub async fn set_probe_result(&self, path: impl AsRef<Path>, stream: AudioStream) {
        self.probe_results
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), stream);
    }

    /// Make the encode of an input fail after writing a partial output.
    pub async fn fail_encode_for(&self, input: impl AsRef<Path>, reason: &str) {
        self.failing_inputs
            .write()
            .await
            .insert(input.as_ref().to_path_buf(), reason.to_string());
    }

    /// Make the encode of an input fail without touching the output path.
    pub async fn fail_encode_unwritten(&self, input: impl AsRef<Path>, reason: &str) {
        self.unreadable_inputs
            .write()
            .await
            .insert(input.as_ref().to_path_buf(), reason.to_string());
    }

    /// Make the encode of an input succeed without producing a file.
    pub async fn skip_output_for(&self, input: impl AsRef<Path>) {
        self.missing_outputs
            .write()
            .await
            .insert(input.as_ref().to_path_buf());
    }

    /// Make `validate` report ffmpeg missing at the given path.
    pub async fn set_tool_missing(&self, path: impl AsRef<Path>) {
        *self.validate_error.write().await = Some(path.as_ref().to_path_buf());
    }

    /// Delay every encode.
    pub async fn set_encode_delay(&self, delay: Duration) {
        *self.encode_delay.write().await = delay;
    }

    async fn record(&self, job: &EncodeJob, success: bool) {
        self.encodes.write().await.push(RecordedEncode {
            job: job.clone(),
            success,
        });
    }
}

/// Stream a real encoder would produce for `codec` from `source`.
fn encoded_stream(codec: &str, source: &AudioStream) -> AudioStream {
    let depth = source.resolve_bit_depth();
    let sample_rate = source.sample_rate.clone();
    let channels = source.channels;

    if let Some(rest) = codec.strip_prefix("pcm_s") {
        let bits: u32 = rest
            .trim_end_matches(|c: char| c.is_ascii_alphabetic())
            .parse()
            .unwrap_or(16);
        let bit_rate = match (source.resolve_sample_rate(), channels) {
            (Some(rate), Some(ch)) => Some((u64::from(rate) * u64::from(bits) * u64::from(ch)).to_string()),
            _ => None,
        };
        return AudioStream {
            codec_type: Some("audio".to_string()),
            codec_name: Some(codec.to_string()),
            sample_fmt: Some(format!("s{}", bits)),
            sample_rate,
            channels,
            bits_per_sample: Some(bits),
            bits_per_raw_sample: None,
            bit_rate,
        };
    }

    match codec {
        "flac" | "alac" => AudioStream {
            codec_type: Some("audio".to_string()),
            codec_name: Some(codec.to_string()),
            sample_fmt: depth.map(|d| format!("s{}p", d)),
            sample_rate,
            channels,
            bits_per_sample: None,
            bits_per_raw_sample: depth.map(|d| d.to_string()),
            bit_rate: None,
        },
        "libmp3lame" => AudioStream {
            codec_type: Some("audio".to_string()),
            codec_name: Some("mp3".to_string()),
            sample_fmt: Some("fltp".to_string()),
            sample_rate,
            channels,
            bits_per_sample: Some(0),
            bits_per_raw_sample: None,
            bit_rate: Some("320000".to_string()),
        },
        _ => source.clone(),
    }
}

#[async_trait]
impl Converter for MockConverter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(&self, path: &Path) -> Result<AudioStream, ConverterError> {
        if !path.exists() {
            return Err(ConverterError::InputNotFound {
                path: path.to_path_buf(),
            });
        }
        if let Some(stream) = self.probe_results.read().await.get(path) {
            return Ok(stream.clone());
        }
        if let Some(stream) = self.written.read().await.get(path) {
            return Ok(stream.clone());
        }
        Ok(fixtures::flac_stream(16))
    }

    async fn encode(&self, job: EncodeJob) -> Result<EncodeResult, ConverterError> {
        let delay = *self.encode_delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let unreadable = self.unreadable_inputs.read().await.get(&job.input_path).cloned();
        if let Some(reason) = unreadable {
            self.record(&job, false).await;
            return Err(ConverterError::encode_failed(
                format!("ffmpeg exited with status 1: {}", reason),
                Some(reason),
            ));
        }

        let failure = self.failing_inputs.read().await.get(&job.input_path).cloned();
        if let Some(reason) = failure {
            tokio::fs::write(&job.output_path, b"partial").await?;
            self.record(&job, false).await;
            return Err(ConverterError::encode_failed(
                format!("ffmpeg exited with status 1: {}", reason),
                Some(reason),
            ));
        }

        let source = match self.probe(&job.input_path).await {
            Ok(stream) => stream,
            Err(e) => {
                self.record(&job, false).await;
                return Err(e);
            }
        };

        let mut size = None;
        if !self.missing_outputs.read().await.contains(&job.input_path) {
            let bytes = format!("{}:{}", job.codec, job.job_id);
            tokio::fs::write(&job.output_path, bytes.as_bytes()).await?;
            size = Some(bytes.len() as u64);
            self.written
                .write()
                .await
                .insert(job.output_path.clone(), encoded_stream(&job.codec, &source));
        }

        self.record(&job, true).await;
        Ok(EncodeResult {
            job_id: job.job_id,
            output_path: job.output_path,
            output_size_bytes: size,
            duration_ms: delay.as_millis() as u64,
        })
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        match self.validate_error.read().await.clone() {
            Some(path) => Err(ConverterError::ToolNotAvailable {
                tool: "ffmpeg",
                path,
            }),
            None => Ok(()),
        }
    }
}
