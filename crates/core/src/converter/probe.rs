//! Resolution of ffprobe stream fields into audio properties.

use regex_lite::Regex;
use std::path::Path;
use std::sync::LazyLock;

use super::error::ConverterError;
use super::types::{AudioProperties, AudioStream, OutputProperties};

const SAMPLE_FMT_DEPTHS: [u32; 3] = [16, 24, 32];

static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("digit pattern"));

impl AudioStream {
    /// Whether ffprobe classified this stream as audio.
    pub fn is_audio(&self) -> bool {
        self.codec_type.as_deref() == Some("audio")
    }

    /// Bit depth from, in order: `bits_per_sample`, `bits_per_raw_sample`,
    /// then the digits of `sample_fmt`.
    pub fn resolve_bit_depth(&self) -> Option<u32> {
        if let Some(bits) = self.bits_per_sample.filter(|b| *b > 0) {
            return Some(bits);
        }

        if let Some(bits) = self
            .bits_per_raw_sample
            .as_deref()
            .and_then(|b| b.trim().parse::<u32>().ok())
            .filter(|b| *b > 0)
        {
            return Some(bits);
        }

        let fmt = self.sample_fmt.as_deref()?;
        DIGITS
            .find_iter(fmt)
            .filter_map(|m| m.as_str().parse::<u32>().ok())
            .find(|d| SAMPLE_FMT_DEPTHS.contains(d))
    }

    /// Sample rate in Hz.
    pub fn resolve_sample_rate(&self) -> Option<u32> {
        self.sample_rate
            .as_deref()
            .and_then(|r| r.trim().parse::<u32>().ok())
            .filter(|r| *r > 0)
    }

    /// Channel count.
    pub fn resolve_channels(&self) -> Option<u32> {
        self.channels.filter(|c| *c > 0)
    }

    /// Bit rate reported on the stream, in kbps.
    pub fn stream_bit_rate_kbps(&self) -> Option<u32> {
        self.bit_rate
            .as_deref()
            .and_then(|b| b.trim().parse::<u64>().ok())
            .filter(|b| *b > 0)
            .and_then(|b| u32::try_from(b / 1000).ok())
    }

    /// Bit rate from the stream field, else computed from the PCM parameters.
    fn resolve_bit_rate_kbps(&self, bit_depth: Option<u32>) -> Option<u32> {
        if let Some(kbps) = self.stream_bit_rate_kbps() {
            return Some(kbps);
        }
        let depth = u64::from(bit_depth?);
        let rate = u64::from(self.resolve_sample_rate()?);
        let channels = u64::from(self.resolve_channels()?);
        u32::try_from(rate * depth * channels / 1000).ok()
    }
}

impl AudioProperties {
    /// Resolves strict properties from a probed stream.
    ///
    /// Fails instead of defaulting when bit depth or bit rate is unrecoverable.
    pub fn resolve(path: &Path, stream: &AudioStream) -> Result<Self, ConverterError> {
        let bit_depth =
            stream
                .resolve_bit_depth()
                .ok_or_else(|| ConverterError::UnresolvedBitDepth {
                    path: path.to_path_buf(),
                })?;

        let bit_rate_kbps = stream.resolve_bit_rate_kbps(Some(bit_depth)).ok_or_else(|| {
            ConverterError::UnresolvedBitRate {
                path: path.to_path_buf(),
            }
        })?;

        Ok(Self {
            bit_depth,
            sample_rate: stream.resolve_sample_rate(),
            channels: stream.resolve_channels(),
            bit_rate_kbps,
        })
    }
}

impl OutputProperties {
    /// Resolves output properties.
    ///
    /// With `require_bit_depth` the strict rules apply. Without it a missing
    /// depth is tolerated, but the bit rate must still resolve.
    pub fn resolve(
        path: &Path,
        stream: &AudioStream,
        require_bit_depth: bool,
    ) -> Result<Self, ConverterError> {
        if require_bit_depth {
            let props = AudioProperties::resolve(path, stream)?;
            return Ok(Self {
                bit_depth: Some(props.bit_depth),
                sample_rate: props.sample_rate,
                bit_rate_kbps: props.bit_rate_kbps,
            });
        }

        let bit_depth = stream.resolve_bit_depth();
        let bit_rate_kbps = stream.resolve_bit_rate_kbps(bit_depth).ok_or_else(|| {
            ConverterError::UnresolvedBitRate {
                path: path.to_path_buf(),
            }
        })?;

        Ok(Self {
            bit_depth,
            sample_rate: stream.resolve_sample_rate(),
            bit_rate_kbps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream() -> AudioStream {
        AudioStream {
            codec_type: Some("audio".into()),
            codec_name: Some("flac".into()),
            sample_rate: Some("44100".into()),
            channels: Some(2),
            ..Default::default()
        }
    }

    #[test]
    fn test_bits_per_sample_wins() {
        let s = AudioStream {
            bits_per_sample: Some(24),
            bits_per_raw_sample: Some("16".into()),
            sample_fmt: Some("s32".into()),
            ..stream()
        };
        assert_eq!(s.resolve_bit_depth(), Some(24));
    }

    #[test]
    fn test_zero_bits_per_sample_falls_through_to_raw() {
        let s = AudioStream {
            bits_per_sample: Some(0),
            bits_per_raw_sample: Some("24".into()),
            ..stream()
        };
        assert_eq!(s.resolve_bit_depth(), Some(24));
    }

    #[test]
    fn test_sample_fmt_digits() {
        let s = AudioStream {
            bits_per_sample: Some(0),
            bits_per_raw_sample: Some("0".into()),
            sample_fmt: Some("s32p".into()),
            ..stream()
        };
        assert_eq!(s.resolve_bit_depth(), Some(32));

        let s = AudioStream {
            sample_fmt: Some("fltp".into()),
            ..stream()
        };
        assert_eq!(s.resolve_bit_depth(), None);
    }

    #[test]
    fn test_sample_fmt_fallback_is_repeatable() {
        let cases = [
            ("s16", Some(16)),
            ("u8", None),
            ("s24le", Some(24)),
            ("s16", Some(16)),
        ];
        for (fmt, expected) in cases {
            let s = AudioStream {
                bits_per_sample: None,
                bits_per_raw_sample: None,
                sample_fmt: Some(fmt.into()),
                ..stream()
            };
            assert_eq!(s.resolve_bit_depth(), expected, "sample_fmt {}", fmt);
        }
    }

    #[test]
    fn test_unresolved_bit_depth_fails() {
        let s = AudioStream {
            sample_fmt: Some("fltp".into()),
            bit_rate: Some("320000".into()),
            ..stream()
        };
        let err = AudioProperties::resolve(Path::new("a.flac"), &s).unwrap_err();
        assert!(matches!(err, ConverterError::UnresolvedBitDepth { .. }));
    }

    #[test]
    fn test_stream_bit_rate_preferred() {
        let s = AudioStream {
            bits_per_sample: Some(16),
            bit_rate: Some("1411200".into()),
            ..stream()
        };
        let props = AudioProperties::resolve(Path::new("a.wav"), &s).unwrap();
        assert_eq!(props.bit_rate_kbps, 1411);
        assert_eq!(props.sample_rate, Some(44100));
    }

    #[test]
    fn test_bit_rate_computed_from_pcm_parameters() {
        let s = AudioStream {
            bits_per_raw_sample: Some("24".into()),
            sample_rate: Some("48000".into()),
            ..stream()
        };
        let props = AudioProperties::resolve(Path::new("a.flac"), &s).unwrap();
        assert_eq!(props.bit_depth, 24);
        assert_eq!(props.bit_rate_kbps, 48000 * 24 * 2 / 1000);
    }

    #[test]
    fn test_missing_sample_rate_fails_bit_rate() {
        let s = AudioStream {
            bits_per_sample: Some(16),
            sample_rate: None,
            ..stream()
        };
        let err = AudioProperties::resolve(Path::new("a.flac"), &s).unwrap_err();
        assert!(matches!(err, ConverterError::UnresolvedBitRate { .. }));
    }

    #[test]
    fn test_lossy_output_tolerates_missing_depth() {
        let s = AudioStream {
            codec_name: Some("mp3".into()),
            sample_fmt: Some("fltp".into()),
            bit_rate: Some("320000".into()),
            ..stream()
        };
        let props = OutputProperties::resolve(Path::new("a.mp3"), &s, false).unwrap();
        assert_eq!(props.bit_depth, None);
        assert_eq!(props.bit_rate_kbps, 320);

        let err = OutputProperties::resolve(Path::new("a.mp3"), &s, true).unwrap_err();
        assert!(matches!(err, ConverterError::UnresolvedBitDepth { .. }));
    }
}
