//! Undo of a failed batch: catalog rollback and output cleanup.

use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, warn};

use crate::catalog::CatalogSession;

use super::types::ConvertedFile;

/// Files written by the current run that must go if the run does not commit.
#[derive(Debug, Clone)]
pub struct RollbackPlan {
    pub run_id: String,
    /// Completed conversions, in processing order.
    pub converted: Vec<ConvertedFile>,
    /// Output of the encode currently running, if any.
    pub in_flight: Option<PathBuf>,
}

impl RollbackPlan {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            converted: Vec::new(),
            in_flight: None,
        }
    }

    /// Marks an output as being written.
    pub fn begin_output(&mut self, path: PathBuf) {
        self.in_flight = Some(path);
    }

    /// Records a fully processed conversion and clears the in-flight output.
    pub fn record_conversion(&mut self, file: ConvertedFile) {
        self.in_flight = None;
        self.converted.push(file);
    }

    /// Returns true if there's anything to roll back.
    pub fn has_changes(&self) -> bool {
        !self.converted.is_empty() || self.in_flight.is_some()
    }

    /// Outputs to remove, newest first.
    pub fn outputs(&self) -> Vec<PathBuf> {
        self.in_flight
            .iter()
            .cloned()
            .chain(self.converted.iter().rev().map(|f| f.output_path.clone()))
            .collect()
    }
}

/// What a rollback achieved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackReport {
    pub catalog_rolled_back: bool,
    pub catalog_error: Option<String>,
    pub files_removed: Vec<PathBuf>,
    /// Cleanup failures. These never stop the cleanup.
    pub errors: Vec<String>,
}

impl RollbackReport {
    pub fn success(&self) -> bool {
        self.catalog_rolled_back && self.errors.is_empty()
    }
}

/// Rolls back the catalog session, then removes every output in the plan.
pub async fn execute_rollback(session: &mut dyn CatalogSession, plan: &RollbackPlan) -> RollbackReport {
    let mut report = RollbackReport::default();

    if session.is_open() {
        match session.rollback() {
            Ok(()) => {
                report.catalog_rolled_back = true;
                info!("Catalog changes rolled back");
            }
            Err(e) => {
                error!("Failed to roll back catalog changes: {}", e);
                report.catalog_error = Some(e.to_string());
            }
        }
    } else {
        error!("Catalog session already closed; nothing to roll back");
        report.catalog_error = Some("session already closed".to_string());
    }

    let (removed, errors) = cleanup_outputs(&plan.outputs()).await;
    report.files_removed = removed;
    report.errors = errors;
    report
}

/// Removes output files. A missing file is not an error.
pub async fn cleanup_outputs(paths: &[PathBuf]) -> (Vec<PathBuf>, Vec<String>) {
    let mut removed = Vec::new();
    let mut errors = Vec::new();

    for path in paths {
        match fs::remove_file(path).await {
            Ok(()) => {
                info!("Removed converted file {}", path.display());
                removed.push(path.clone());
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!("Failed to remove {}: {}", path.display(), e);
                errors.push(format!("Failed to remove {}: {}", path.display(), e));
            }
        }
    }

    (removed, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn converted(dir: &TempDir, name: &str) -> ConvertedFile {
        ConvertedFile {
            record_id: name.to_string(),
            source_path: dir.path().join(format!("{}.flac", name)),
            output_path: dir.path().join(format!("{}.aiff", name)),
        }
    }

    #[test]
    fn test_rollback_plan_new() {
        let plan = RollbackPlan::new("run-1");
        assert_eq!(plan.run_id, "run-1");
        assert!(!plan.has_changes());
        assert!(plan.outputs().is_empty());
    }

    #[test]
    fn test_outputs_newest_first() {
        let dir = TempDir::new().unwrap();
        let mut plan = RollbackPlan::new("run-1");
        plan.begin_output(dir.path().join("a.aiff"));
        plan.record_conversion(converted(&dir, "a"));
        plan.begin_output(dir.path().join("b.aiff"));
        plan.record_conversion(converted(&dir, "b"));
        plan.begin_output(dir.path().join("c.aiff"));

        let outputs = plan.outputs();
        assert_eq!(
            outputs,
            vec![
                dir.path().join("c.aiff"),
                dir.path().join("b.aiff"),
                dir.path().join("a.aiff"),
            ]
        );
    }

    #[tokio::test]
    async fn test_cleanup_skips_missing_files() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("present.aiff");
        tokio::fs::write(&present, b"data").await.unwrap();
        let missing = dir.path().join("missing.aiff");

        let (removed, errors) = cleanup_outputs(&[present.clone(), missing]).await;
        assert_eq!(removed, vec![present.clone()]);
        assert!(errors.is_empty());
        assert!(!present.exists());
    }

    #[test]
    fn test_report_success() {
        let mut report = RollbackReport {
            catalog_rolled_back: true,
            ..Default::default()
        };
        assert!(report.success());
        report.errors.push("boom".to_string());
        assert!(!report.success());
    }
}
