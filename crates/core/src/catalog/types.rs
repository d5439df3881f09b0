//! Types for the library catalog.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::format::FormatCode;

/// A track row in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// Catalog-defined identifier.
    pub id: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// File name, extension included.
    pub file_name: String,
    /// Absolute path of the file, file name included.
    pub folder_path: String,
    /// Catalog format code.
    pub format_code: FormatCode,
    pub sample_rate: Option<u32>,
    pub bit_depth: Option<u32>,
    pub bit_rate: Option<u32>,
}

impl CatalogRecord {
    /// Absolute path of the audio file.
    pub fn source_path(&self) -> PathBuf {
        PathBuf::from(&self.folder_path)
    }

    /// Bit depth recorded by the catalog. Zero means unknown.
    pub fn recorded_bit_depth(&self) -> Option<u32> {
        self.bit_depth.filter(|d| *d > 0)
    }
}

/// Field changes staged for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordUpdate {
    pub file_name: String,
    pub folder_path: String,
    pub format_code: FormatCode,
    pub bit_rate: u32,
}

/// Errors that can occur in catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Database error.
    #[error("database error: {0}")]
    Database(String),

    /// Record not found.
    #[error("Content record with ID {0} not found")]
    NotFound(String),

    /// The session was already committed or rolled back.
    #[error("catalog session is closed")]
    SessionClosed,

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for CatalogError {
    fn from(e: rusqlite::Error) -> Self {
        CatalogError::Database(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_bit_depth_treats_zero_as_unknown() {
        let mut record = CatalogRecord {
            id: "1".to_string(),
            title: None,
            artist: None,
            album: None,
            file_name: "a.flac".to_string(),
            folder_path: "/music/a.flac".to_string(),
            format_code: 5,
            sample_rate: Some(44100),
            bit_depth: Some(0),
            bit_rate: None,
        };
        assert_eq!(record.recorded_bit_depth(), None);
        record.bit_depth = Some(24);
        assert_eq!(record.recorded_bit_depth(), Some(24));
        assert_eq!(record.source_path(), PathBuf::from("/music/a.flac"));
    }

    #[test]
    fn test_not_found_message() {
        let err = CatalogError::NotFound("42".to_string());
        assert_eq!(err.to_string(), "Content record with ID 42 not found");
    }
}
