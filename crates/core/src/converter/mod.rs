//! Converter module: ffprobe/ffmpeg adapters.
//!
//! `Converter` probes audio streams and encodes single files. Stream fields are
//! resolved into [`AudioProperties`] with a fixed fallback order, and missing
//! data is reported as an error rather than replaced with defaults.
//!
//! # Example
//!
//! ```ignore
//! use tracksmith_core::converter::{Converter, EncodeJob, FfmpegConverter};
//! use tracksmith_core::format::AudioFormat;
//!
//! let converter = FfmpegConverter::with_defaults();
//! converter.validate().await?;
//!
//! let props = converter.probe_properties(Path::new("/music/song.flac")).await?;
//! let codec = AudioFormat::Aiff.codec_for(props.bit_depth);
//!
//! converter
//!     .encode(EncodeJob {
//!         job_id: "42".to_string(),
//!         input_path: PathBuf::from("/music/song.flac"),
//!         output_path: PathBuf::from("/music/song.aiff"),
//!         format: AudioFormat::Aiff,
//!         codec: codec.codec,
//!     })
//!     .await?;
//! ```

mod config;
mod error;
mod ffmpeg;
mod probe;
mod traits;
mod types;

pub use config::ConverterConfig;
pub use error::{ConverterError, INSTALL_GUIDANCE};
pub use ffmpeg::FfmpegConverter;
pub use traits::Converter;
pub use types::{AudioProperties, AudioStream, EncodeJob, EncodeResult, OutputProperties};
