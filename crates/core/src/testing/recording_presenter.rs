//! Presenter that records what would have been shown.

use std::sync::{Arc, Mutex};

use crate::catalog::CatalogRecord;
use crate::orchestrator::{ConversionTask, ConvertedFile};
use crate::report::{Presenter, PreviewKind};

/// Records presenter calls for assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingPresenter {
    previews: Arc<Mutex<Vec<(PreviewKind, Vec<String>)>>>,
    converted: Arc<Mutex<Vec<String>>>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record IDs of each preview, with its kind.
    pub fn previews(&self) -> Vec<(PreviewKind, Vec<String>)> {
        self.previews.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Record IDs reported as converted.
    pub fn converted_ids(&self) -> Vec<String> {
        self.converted.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Presenter for RecordingPresenter {
    fn preview(&self, tasks: &[ConversionTask], kind: PreviewKind) {
        if let Ok(mut previews) = self.previews.lock() {
            previews.push((kind, tasks.iter().map(|t| t.record.id.clone()).collect()));
        }
    }

    fn converted(&self, files: &[ConvertedFile]) {
        if let Ok(mut converted) = self.converted.lock() {
            converted.extend(files.iter().map(|f| f.record_id.clone()));
        }
    }

    fn tracks(&self, _records: &[CatalogRecord]) {}
}
