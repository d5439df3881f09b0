//! Trait definitions for the converter module.

use async_trait::async_trait;
use std::path::Path;

use super::error::ConverterError;
use super::types::{AudioProperties, AudioStream, EncodeJob, EncodeResult, OutputProperties};

/// Probes and encodes audio files through an external tool.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Returns the name of this converter implementation.
    fn name(&self) -> &str;

    /// Returns the first audio stream of a file.
    ///
    /// Fails with `NoAudioStream` when the file has none.
    async fn probe(&self, path: &Path) -> Result<AudioStream, ConverterError>;

    /// Encodes one file, overwriting the destination unconditionally.
    async fn encode(&self, job: EncodeJob) -> Result<EncodeResult, ConverterError>;

    /// Checks that the encoder and probe tools are resolvable.
    async fn validate(&self) -> Result<(), ConverterError>;

    /// Probes a file and resolves strict audio properties.
    async fn probe_properties(&self, path: &Path) -> Result<AudioProperties, ConverterError> {
        let stream = self.probe(path).await?;
        AudioProperties::resolve(path, &stream)
    }

    /// Probes an encoded output.
    async fn probe_output(
        &self,
        path: &Path,
        require_bit_depth: bool,
    ) -> Result<OutputProperties, ConverterError> {
        let stream = self.probe(path).await?;
        OutputProperties::resolve(path, &stream, require_bit_depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::AudioFormat;
    use std::path::PathBuf;

    struct FixedConverter;

    #[async_trait]
    impl Converter for FixedConverter {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn probe(&self, _path: &Path) -> Result<AudioStream, ConverterError> {
            Ok(AudioStream {
                codec_type: Some("audio".to_string()),
                codec_name: Some("flac".to_string()),
                sample_rate: Some("44100".to_string()),
                channels: Some(2),
                bits_per_raw_sample: Some("16".to_string()),
                ..Default::default()
            })
        }

        async fn encode(&self, job: EncodeJob) -> Result<EncodeResult, ConverterError> {
            Ok(EncodeResult {
                job_id: job.job_id,
                output_path: job.output_path,
                output_size_bytes: None,
                duration_ms: 0,
            })
        }

        async fn validate(&self) -> Result<(), ConverterError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_probe_properties_resolves_stream() {
        let props = FixedConverter
            .probe_properties(Path::new("/music/a.flac"))
            .await
            .unwrap();
        assert_eq!(props.bit_depth, 16);
        assert_eq!(props.bit_rate_kbps, 1411);
    }

    #[tokio::test]
    async fn test_encode_passes_job_through() {
        let job = EncodeJob {
            job_id: "7".to_string(),
            input_path: PathBuf::from("/music/a.flac"),
            output_path: PathBuf::from("/music/a.aiff"),
            format: AudioFormat::Aiff,
            codec: "pcm_s16be".to_string(),
        };
        let result = FixedConverter.encode(job).await.unwrap();
        assert_eq!(result.job_id, "7");
        assert_eq!(result.output_path, PathBuf::from("/music/a.aiff"));
    }
}
