//! Types for the conversion orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::catalog::{CatalogError, CatalogRecord};
use crate::converter::ConverterError;
use crate::format::AudioFormat;

use super::rollback::RollbackReport;

/// Stages of one conversion run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    Precheck,
    Query,
    ConflictCheck,
    Preview,
    Confirm,
    ConvertLoop,
    Commit,
    Postprocess,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Precheck => "precheck",
            Self::Query => "query",
            Self::ConflictCheck => "conflict check",
            Self::Preview => "preview",
            Self::Confirm => "confirm",
            Self::ConvertLoop => "convert loop",
            Self::Commit => "commit",
            Self::Postprocess => "postprocess",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// One record selected for conversion, with its derived output location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionTask {
    pub record: CatalogRecord,
    pub source_path: PathBuf,
    /// Source stem with the target extension, in the source directory.
    pub output_path: PathBuf,
    pub output_file_name: String,
    pub target: AudioFormat,
}

impl ConversionTask {
    /// Derives the output location for a record.
    pub fn new(record: CatalogRecord, target: AudioFormat) -> Result<Self, OrchestratorError> {
        let source_path = record.source_path();
        let invalid = |reason: &str| OrchestratorError::InvalidRecord {
            record_id: record.id.clone(),
            reason: reason.to_string(),
        };

        let stem = source_path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid("source path has no file name"))?;
        let output_file_name = format!("{}{}", stem, target.extension());
        let output_path = match source_path.parent() {
            Some(dir) => dir.join(&output_file_name),
            None => PathBuf::from(&output_file_name),
        };

        if output_path == source_path {
            return Err(invalid("output path equals source path"));
        }

        Ok(Self {
            record,
            source_path,
            output_path,
            output_file_name,
            target,
        })
    }

    pub fn record_id(&self) -> &str {
        &self.record.id
    }
}

/// A record converted during this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertedFile {
    pub record_id: String,
    pub source_path: PathBuf,
    pub output_path: PathBuf,
}

/// A source file that could not be deleted after commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Summary of a committed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionSummary {
    pub run_id: String,
    pub target: AudioFormat,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub converted: Vec<ConvertedFile>,
    /// Records skipped during the loop (declined or output appeared).
    pub skipped: usize,
    pub sources_deleted: Vec<PathBuf>,
    pub deletion_failures: Vec<DeletionFailure>,
}

impl ConversionSummary {
    pub fn converted_count(&self) -> usize {
        self.converted.len()
    }
}

/// How a run ended without error.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// No record matched the filter and was eligible.
    NothingToDo,
    /// Every candidate was excluded by an existing output.
    NothingToConvert { excluded: usize },
    /// Dry run: candidates were listed, nothing changed.
    DryRun { candidates: Vec<String> },
    /// The operator answered no at a confirmation.
    Declined { stage: Stage },
    /// The operator quit. Carries the rollback report when changes were undone.
    Quit {
        stage: Stage,
        rollback: Option<RollbackReport>,
    },
    /// The loop finished without converting anything.
    NoFilesConverted { skipped: usize },
    /// Changes were committed.
    Completed(ConversionSummary),
    /// A termination signal arrived.
    Interrupted {
        stage: Stage,
        rollback: Option<RollbackReport>,
    },
}

impl RunOutcome {
    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Interrupted { .. } => 130,
            _ => 0,
        }
    }
}

/// A condition that prevents the run from starting.
#[derive(Debug, Error)]
pub enum PreconditionError {
    #[error("{name} is running (pid {pid}); close it before converting in unattended mode")]
    OwningAppRunning { name: String, pid: u32 },

    #[error("{name} is running (pid {pid}); conversion declined")]
    OwningAppDeclined { name: String, pid: u32 },

    #[error("encoder unavailable: {0}")]
    EncoderUnavailable(#[source] ConverterError),

    #[error("cannot open catalog session: {0}")]
    NoSession(#[source] CatalogError),
}

/// A failure inside the convert loop or at commit. Always fatal to the batch.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("source file not found for record {record_id}: {}", .path.display())]
    SourceVanished { record_id: String, path: PathBuf },

    #[error("probe failed for record {record_id} ({}): {source}", .path.display())]
    Probe {
        record_id: String,
        path: PathBuf,
        source: ConverterError,
    },

    #[error("encode failed for record {record_id} ({}): {source}", .path.display())]
    Encode {
        record_id: String,
        path: PathBuf,
        source: ConverterError,
    },

    #[error("converted file not found for record {record_id}: {}", .path.display())]
    OutputMissing { record_id: String, path: PathBuf },

    #[error("bit depth mismatch for record {record_id}: catalog shows {expected}-bit, converted file is {actual}-bit")]
    BitDepthMismatch {
        record_id: String,
        expected: u32,
        actual: u32,
    },

    #[error("catalog update failed for record {record_id}: {source}")]
    Catalog {
        record_id: String,
        source: CatalogError,
    },

    #[error("commit failed: {0}")]
    CommitFailed(#[source] CatalogError),
}

impl BatchError {
    /// The record being processed when the batch failed, if any.
    pub fn record_id(&self) -> Option<&str> {
        match self {
            Self::SourceVanished { record_id, .. }
            | Self::Probe { record_id, .. }
            | Self::Encode { record_id, .. }
            | Self::OutputMissing { record_id, .. }
            | Self::BitDepthMismatch { record_id, .. }
            | Self::Catalog { record_id, .. } => Some(record_id),
            Self::CommitFailed(_) => None,
        }
    }

    pub(crate) fn source_vanished(record_id: &str, path: &Path) -> Self {
        Self::SourceVanished {
            record_id: record_id.to_string(),
            path: path.to_path_buf(),
        }
    }
}

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    #[error("catalog query failed: {0}")]
    Query(#[source] CatalogError),

    #[error("invalid catalog record {record_id}: {reason}")]
    InvalidRecord { record_id: String, reason: String },

    #[error("{}", batch_aborted_message(.stage, .cause, .rollback))]
    BatchAborted {
        stage: Stage,
        cause: BatchError,
        rollback: RollbackReport,
    },
}

fn batch_aborted_message(stage: &Stage, cause: &BatchError, rollback: &RollbackReport) -> String {
    format!(
        "conversion aborted during {}: {} (catalog {}, {} output files removed)",
        stage,
        cause,
        if rollback.catalog_rolled_back {
            "rolled back"
        } else {
            "NOT rolled back"
        },
        rollback.files_removed.len()
    )
}

impl OrchestratorError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        1
    }

    /// Rollback report of an aborted batch.
    pub fn rollback_report(&self) -> Option<&RollbackReport> {
        match self {
            Self::BatchAborted { rollback, .. } => Some(rollback),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_task_output_path_uses_source_stem() {
        let record = fixtures::track("7", "/music/set/intro.flac", 5, Some(16));
        let task = ConversionTask::new(record, AudioFormat::Aiff).unwrap();
        assert_eq!(task.output_path, PathBuf::from("/music/set/intro.aiff"));
        assert_eq!(task.output_file_name, "intro.aiff");
        assert_eq!(task.record_id(), "7");
    }

    #[test]
    fn test_task_rejects_same_path() {
        let record = fixtures::track("8", "/music/a.aiff", 12, Some(16));
        let err = ConversionTask::new(record, AudioFormat::Aiff).unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidRecord { .. }));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunOutcome::NothingToDo.exit_code(), 0);
        assert_eq!(
            RunOutcome::Quit {
                stage: Stage::Confirm,
                rollback: None
            }
            .exit_code(),
            0
        );
        assert_eq!(
            RunOutcome::Interrupted {
                stage: Stage::ConvertLoop,
                rollback: None
            }
            .exit_code(),
            130
        );
    }

    #[test]
    fn test_batch_aborted_display() {
        let err = OrchestratorError::BatchAborted {
            stage: Stage::ConvertLoop,
            cause: BatchError::BitDepthMismatch {
                record_id: "3".to_string(),
                expected: 24,
                actual: 16,
            },
            rollback: RollbackReport {
                catalog_rolled_back: true,
                catalog_error: None,
                files_removed: vec![PathBuf::from("/a.aiff")],
                errors: vec![],
            },
        };
        assert_eq!(
            err.to_string(),
            "conversion aborted during convert loop: bit depth mismatch for record 3: \
             catalog shows 24-bit, converted file is 16-bit (catalog rolled back, 1 output files removed)"
        );
        assert_eq!(err.exit_code(), 1);
        assert!(err.rollback_report().is_some());
    }
}
