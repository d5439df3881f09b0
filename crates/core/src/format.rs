//! Format registry.
//!
//! Static mapping between catalog format codes, format names, file extensions
//! and the encoder codec used for each target format.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Catalog format code (the `FileType` column).
pub type FormatCode = i64;

/// Errors returned by registry lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// The format name is empty or not recognized.
    #[error("{}", unknown_name_message(.name))]
    UnknownFormat { name: String },

    /// The catalog format code has no mapping.
    #[error("Unknown format code: {code}")]
    UnknownCode { code: FormatCode },
}

fn unknown_name_message(name: &str) -> String {
    if name.trim().is_empty() {
        "Format name cannot be empty".to_string()
    } else {
        format!("Unknown format: {}", name)
    }
}

/// Audio formats known to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// MPEG-1 Layer III.
    Mp3,
    /// AAC in an MPEG-4 container.
    M4a,
    /// Apple Lossless in an MPEG-4 container.
    Alac,
    /// Free Lossless Audio Codec.
    Flac,
    /// Little-endian PCM in a RIFF container.
    Wav,
    /// Big-endian PCM in an AIFF container.
    Aiff,
}

/// Formats accepted as conversion targets.
pub const TARGET_FORMATS: [AudioFormat; 5] = [
    AudioFormat::Aiff,
    AudioFormat::Flac,
    AudioFormat::Wav,
    AudioFormat::Alac,
    AudioFormat::Mp3,
];

/// Format codes whose content is lossy and never used as a conversion source.
pub const LOSSY_CODES: [FormatCode; 3] = [0, 1, 4];

const PCM_DEPTHS: [u32; 3] = [16, 24, 32];

impl AudioFormat {
    /// Looks up a format by name, ignoring case and surrounding whitespace.
    pub fn from_name(name: &str) -> Result<Self, FormatError> {
        let unknown = || FormatError::UnknownFormat {
            name: name.to_string(),
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "mp3" => Ok(Self::Mp3),
            "m4a" => Ok(Self::M4a),
            "alac" => Ok(Self::Alac),
            "flac" => Ok(Self::Flac),
            "wav" => Ok(Self::Wav),
            "aiff" => Ok(Self::Aiff),
            _ => Err(unknown()),
        }
    }

    /// Canonical format for a catalog code.
    ///
    /// Code 4 maps to `M4a`: the catalog does not distinguish AAC from ALAC.
    pub fn from_code(code: FormatCode) -> Result<Self, FormatError> {
        match code {
            0 | 1 => Ok(Self::Mp3),
            4 => Ok(Self::M4a),
            5 => Ok(Self::Flac),
            11 => Ok(Self::Wav),
            12 => Ok(Self::Aiff),
            _ => Err(FormatError::UnknownCode { code }),
        }
    }

    /// Lowercase format name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::M4a => "m4a",
            Self::Alac => "alac",
            Self::Flac => "flac",
            Self::Wav => "wav",
            Self::Aiff => "aiff",
        }
    }

    /// Catalog code written for files of this format.
    pub fn code(&self) -> FormatCode {
        match self {
            Self::Mp3 => 1,
            Self::M4a | Self::Alac => 4,
            Self::Flac => 5,
            Self::Wav => 11,
            Self::Aiff => 12,
        }
    }

    /// File extension including the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => ".mp3",
            Self::M4a | Self::Alac => ".m4a",
            Self::Flac => ".flac",
            Self::Wav => ".wav",
            Self::Aiff => ".aiff",
        }
    }

    /// Whether this format preserves the source exactly.
    pub fn is_lossless(&self) -> bool {
        matches!(self, Self::Alac | Self::Flac | Self::Wav | Self::Aiff)
    }

    /// Whether conversions may target this format.
    pub fn is_target(&self) -> bool {
        TARGET_FORMATS.contains(self)
    }

    /// Every catalog code that maps back to this format's display name.
    pub fn matching_codes(&self) -> &'static [FormatCode] {
        match self {
            Self::Mp3 => &[0, 1],
            Self::M4a | Self::Alac => &[4],
            Self::Flac => &[5],
            Self::Wav => &[11],
            Self::Aiff => &[12],
        }
    }

    /// Selects the encoder codec for this target given the source bit depth.
    ///
    /// PCM containers keep the source depth. A depth with no exact codec falls
    /// back to the lowest defined one and the substitution is reported in the
    /// returned selection.
    pub fn codec_for(&self, bit_depth: u32) -> CodecSelection {
        let pcm = |prefix: &str, suffix: &str| {
            let (used, substituted) = if PCM_DEPTHS.contains(&bit_depth) {
                (bit_depth, None)
            } else {
                (
                    PCM_DEPTHS[0],
                    Some(DepthSubstitution {
                        requested: bit_depth,
                        used: PCM_DEPTHS[0],
                    }),
                )
            };
            CodecSelection {
                codec: format!("{}{}{}", prefix, used, suffix),
                substitution: substituted,
            }
        };

        match self {
            Self::Aiff => pcm("pcm_s", "be"),
            Self::Wav => pcm("pcm_s", "le"),
            Self::Flac => CodecSelection::fixed("flac"),
            Self::Alac => CodecSelection::fixed("alac"),
            Self::Mp3 => CodecSelection::fixed("libmp3lame"),
            Self::M4a => CodecSelection::fixed("aac"),
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AudioFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

/// Codec chosen for an encode, with any bit depth substitution applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecSelection {
    /// FFmpeg audio codec name.
    pub codec: String,
    /// Set when the source depth had no exact PCM codec.
    pub substitution: Option<DepthSubstitution>,
}

impl CodecSelection {
    fn fixed(codec: &str) -> Self {
        Self {
            codec: codec.to_string(),
            substitution: None,
        }
    }
}

/// A PCM bit depth replaced by the lowest supported depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthSubstitution {
    pub requested: u32,
    pub used: u32,
}

/// Catalog code for a format name.
pub fn format_code_for(name: &str) -> Result<FormatCode, FormatError> {
    AudioFormat::from_name(name).map(|f| f.code())
}

/// File extension for a format name.
pub fn extension_for(name: &str) -> Result<&'static str, FormatError> {
    AudioFormat::from_name(name).map(|f| f.extension())
}

/// Human readable name for a catalog code.
pub fn display_name_for(code: FormatCode) -> Result<&'static str, FormatError> {
    match code {
        0 | 1 => Ok("MP3"),
        4 => Ok("M4A"),
        5 => Ok("FLAC"),
        11 => Ok("WAV"),
        12 => Ok("AIFF"),
        _ => Err(FormatError::UnknownCode { code }),
    }
}

/// Codec selection for a format name and source bit depth.
pub fn codec_params_for(name: &str, bit_depth: u32) -> Result<CodecSelection, FormatError> {
    AudioFormat::from_name(name).map(|f| f.codec_for(bit_depth))
}

/// Whether a catalog code denotes lossy content.
pub fn is_lossy_code(code: FormatCode) -> bool {
    LOSSY_CODES.contains(&code)
}
