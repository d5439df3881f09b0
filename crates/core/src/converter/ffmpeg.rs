//! FFmpeg-based converter implementation.

use async_trait::async_trait;
use regex_lite::Regex;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::OnceCell;
use tokio::time::{timeout, Duration};
use tracing::{debug, trace};

use super::config::ConverterConfig;
use super::error::ConverterError;
use super::traits::Converter;
use super::types::{AudioStream, EncodeJob, EncodeResult};
use crate::format::AudioFormat;

/// Number of trailing diagnostic lines kept from ffmpeg stderr.
const STDERR_TAIL_LINES: usize = 40;

/// A `-progress` key/value line.
static PROGRESS_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-z_0-9]+)=(.*)$").expect("progress line pattern"));

/// FFmpeg-based converter implementation.
pub struct FfmpegConverter {
    config: ConverterConfig,
    ffmpeg_ready: OnceCell<()>,
    ffprobe_ready: OnceCell<()>,
}

impl FfmpegConverter {
    /// Creates a new FFmpeg converter with the given configuration.
    pub fn new(config: ConverterConfig) -> Self {
        Self {
            config,
            ffmpeg_ready: OnceCell::new(),
            ffprobe_ready: OnceCell::new(),
        }
    }

    /// Creates a converter with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ConverterConfig::default())
    }

    /// Runs `<tool> -version` once and caches a successful result.
    async fn ensure_tool(
        cell: &OnceCell<()>,
        tool: &'static str,
        path: &Path,
    ) -> Result<(), ConverterError> {
        cell.get_or_try_init(|| async {
            let output = Command::new(path)
                .arg("-version")
                .stdin(Stdio::null())
                .output()
                .await
                .map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        ConverterError::ToolNotAvailable {
                            tool,
                            path: path.to_path_buf(),
                        }
                    } else {
                        ConverterError::Io(e)
                    }
                })?;

            if !output.status.success() {
                return Err(ConverterError::ToolNotAvailable {
                    tool,
                    path: path.to_path_buf(),
                });
            }
            Ok(())
        })
        .await
        .map(|_| ())
    }

    /// Builds ffmpeg arguments for an encode.
    fn build_encode_args(&self, job: &EncodeJob) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-nostdin".to_string(),
            "-i".to_string(),
            job.input_path.to_string_lossy().to_string(),
            "-map_metadata".to_string(),
            "0".to_string(),
            "-c:a".to_string(),
            job.codec.clone(),
        ];

        if !job.format.is_lossless() {
            args.extend([
                "-b:a".to_string(),
                format!("{}k", self.config.mp3_bitrate_kbps),
            ]);
        }

        // ID3v2 tags are a muxer option of the AIFF and MP3 muxers only
        if matches!(job.format, AudioFormat::Aiff | AudioFormat::Mp3) {
            args.extend(["-write_id3v2".to_string(), "1".to_string()]);
        }

        args.extend([
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            "-progress".to_string(),
            "pipe:2".to_string(),
            "-nostats".to_string(),
        ]);

        args.extend(self.config.extra_ffmpeg_args.iter().cloned());

        args.push(job.output_path.to_string_lossy().to_string());

        args
    }

    /// Parses ffprobe JSON output and returns the first audio stream.
    fn parse_probe_output(path: &Path, output: &str) -> Result<AudioStream, ConverterError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            #[serde(default)]
            streams: Vec<AudioStream>,
        }

        let probe: ProbeOutput =
            serde_json::from_str(output).map_err(|e| ConverterError::ParseError {
                reason: format!("Failed to parse ffprobe output: {}", e),
            })?;

        probe
            .streams
            .into_iter()
            .find(AudioStream::is_audio)
            .ok_or_else(|| ConverterError::NoAudioStream {
                path: path.to_path_buf(),
            })
    }

    /// Runs ffmpeg and waits for it to report completion.
    async fn run_encode(&self, job: &EncodeJob) -> Result<EncodeResult, ConverterError> {
        let start = Instant::now();
        let args = self.build_encode_args(job);
        debug!("Running {} {}", self.config.ffmpeg_path.display(), args.join(" "));

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ConverterError::ToolNotAvailable {
                        tool: "ffmpeg",
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    ConverterError::Io(e)
                }
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ConverterError::encode_failed("ffmpeg stderr was not captured", None))?;
        let mut reader = BufReader::new(stderr).lines();

        let run = async {
            let mut diagnostics: Vec<String> = Vec::new();
            let mut finished = false;

            while let Some(line) = reader.next_line().await? {
                let progress = PROGRESS_LINE.captures(&line).and_then(|caps| {
                    let key = caps.get(1)?.as_str().to_string();
                    let value = caps.get(2)?.as_str().to_string();
                    Some((key, value))
                });

                match progress {
                    Some((key, value)) => {
                        if key == "progress" && value == "end" {
                            finished = true;
                        } else if key == "out_time" {
                            trace!("{}: encoded up to {}", job.job_id, value);
                        }
                    }
                    None => {
                        if diagnostics.len() == STDERR_TAIL_LINES {
                            diagnostics.remove(0);
                        }
                        diagnostics.push(line);
                    }
                }
            }

            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, finished, diagnostics))
        };

        let outcome = match self.config.timeout_secs {
            Some(secs) => timeout(Duration::from_secs(secs), run)
                .await
                .map_err(|_| ConverterError::Timeout { timeout_secs: secs })?,
            None => run.await,
        };

        let (status, finished, diagnostics) = outcome?;
        let stderr = if diagnostics.is_empty() {
            None
        } else {
            Some(diagnostics.join("\n"))
        };

        if !status.success() {
            return Err(ConverterError::encode_failed(
                format!("ffmpeg exited with code: {:?}", status.code()),
                stderr,
            ));
        }

        if !finished {
            return Err(ConverterError::encode_failed(
                "ffmpeg exited without reporting completion",
                stderr,
            ));
        }

        let output_size_bytes = tokio::fs::metadata(&job.output_path)
            .await
            .ok()
            .map(|m| m.len());

        Ok(EncodeResult {
            job_id: job.job_id.clone(),
            output_path: job.output_path.clone(),
            output_size_bytes,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[async_trait]
impl Converter for FfmpegConverter {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn probe(&self, path: &Path) -> Result<AudioStream, ConverterError> {
        Self::ensure_tool(&self.ffprobe_ready, "ffprobe", &self.config.ffprobe_path).await?;

        if !path.exists() {
            return Err(ConverterError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        let output = Command::new(&self.config.ffprobe_path)
            .args(["-v", "quiet", "-print_format", "json", "-show_streams"])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(ConverterError::probe_failed(format!(
                "ffprobe failed on {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Self::parse_probe_output(path, &stdout)
    }

    async fn encode(&self, job: EncodeJob) -> Result<EncodeResult, ConverterError> {
        Self::ensure_tool(&self.ffmpeg_ready, "ffmpeg", &self.config.ffmpeg_path).await?;
        self.run_encode(&job).await
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        Self::ensure_tool(&self.ffmpeg_ready, "ffmpeg", &self.config.ffmpeg_path).await?;
        Self::ensure_tool(&self.ffprobe_ready, "ffprobe", &self.config.ffprobe_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn job(format: AudioFormat, codec: &str) -> EncodeJob {
        EncodeJob {
            job_id: "1".to_string(),
            input_path: PathBuf::from("/music/in.flac"),
            output_path: PathBuf::from(format!("/music/in{}", format.extension())),
            format,
            codec: codec.to_string(),
        }
    }

    #[test]
    fn test_build_encode_args_aiff() {
        let converter = FfmpegConverter::with_defaults();
        let args = converter.build_encode_args(&job(AudioFormat::Aiff, "pcm_s24be"));

        assert_eq!(args[0], "-y");
        assert!(args.windows(2).any(|w| w == ["-c:a", "pcm_s24be"]));
        assert!(args.windows(2).any(|w| w == ["-map_metadata", "0"]));
        assert!(args.windows(2).any(|w| w == ["-write_id3v2", "1"]));
        assert!(!args.contains(&"-b:a".to_string()));
        assert_eq!(args.last().unwrap(), "/music/in.aiff");
    }

    #[test]
    fn test_build_encode_args_mp3_sets_bitrate() {
        let converter =
            FfmpegConverter::new(ConverterConfig::default().with_mp3_bitrate(256));
        let args = converter.build_encode_args(&job(AudioFormat::Mp3, "libmp3lame"));

        assert!(args.windows(2).any(|w| w == ["-c:a", "libmp3lame"]));
        assert!(args.windows(2).any(|w| w == ["-b:a", "256k"]));
    }

    #[test]
    fn test_build_encode_args_flac_has_no_id3() {
        let converter = FfmpegConverter::with_defaults();
        let args = converter.build_encode_args(&job(AudioFormat::Flac, "flac"));

        assert!(!args.contains(&"-write_id3v2".to_string()));
        assert!(args.windows(2).any(|w| w == ["-progress", "pipe:2"]));
    }

    #[test]
    fn test_parse_probe_output_picks_audio_stream() {
        let json = r#"{
            "streams": [
                {
                    "codec_type": "video",
                    "codec_name": "mjpeg"
                },
                {
                    "codec_type": "audio",
                    "codec_name": "flac",
                    "sample_fmt": "s16",
                    "sample_rate": "44100",
                    "channels": 2,
                    "bits_per_sample": 0,
                    "bits_per_raw_sample": "16"
                }
            ]
        }"#;

        let stream = FfmpegConverter::parse_probe_output(Path::new("a.flac"), json).unwrap();
        assert_eq!(stream.codec_name.as_deref(), Some("flac"));
        assert_eq!(stream.resolve_bit_depth(), Some(16));
        assert_eq!(stream.resolve_sample_rate(), Some(44100));
    }

    #[test]
    fn test_parse_probe_output_without_audio() {
        let json = r#"{ "streams": [ { "codec_type": "video" } ] }"#;
        let err = FfmpegConverter::parse_probe_output(Path::new("a.png"), json).unwrap_err();
        assert!(matches!(err, ConverterError::NoAudioStream { .. }));

        let err = FfmpegConverter::parse_probe_output(Path::new("a.png"), "{}").unwrap_err();
        assert!(matches!(err, ConverterError::NoAudioStream { .. }));
    }

    #[test]
    fn test_parse_probe_output_garbage() {
        let err = FfmpegConverter::parse_probe_output(Path::new("a"), "not json").unwrap_err();
        assert!(matches!(err, ConverterError::ParseError { .. }));
    }

    #[tokio::test]
    async fn test_missing_probe_tool_is_reported() {
        let converter = FfmpegConverter::new(ConverterConfig::with_paths(
            PathBuf::from("/nonexistent/ffmpeg"),
            PathBuf::from("/nonexistent/ffprobe"),
        ));

        let err = converter.probe(Path::new("/music/a.flac")).await.unwrap_err();
        assert!(matches!(
            err,
            ConverterError::ToolNotAvailable { tool: "ffprobe", .. }
        ));

        let err = converter.validate().await.unwrap_err();
        assert!(matches!(
            err,
            ConverterError::ToolNotAvailable { tool: "ffmpeg", .. }
        ));
    }
}
