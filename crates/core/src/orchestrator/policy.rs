//! Decisions that depend only on options: output conflicts and source deletion.

use std::collections::HashSet;
use std::path::Path;

use crate::format::AudioFormat;

use super::types::ConversionTask;

/// What the operator is told about conflicting outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictNotice {
    /// Conflicting records were dropped from the batch.
    Skipping(usize),
    /// Conflicting outputs will be replaced.
    Overwriting(usize),
}

/// Outcome of the conflict check.
#[derive(Debug, Clone, Default)]
pub struct ConflictResolution {
    pub proceed: Vec<ConversionTask>,
    pub excluded: Vec<ConversionTask>,
    /// Tasks whose output path an earlier task in the batch already claims.
    pub duplicates: Vec<ConversionTask>,
    pub notice: Option<ConflictNotice>,
}

/// Splits tasks by whether their output already exists.
///
/// Only the first task for a given output path is considered; later ones
/// land in `duplicates` whatever the flags say.
///
/// | overwrite | unattended | conflicting tasks      |
/// |-----------|------------|------------------------|
/// | no        | no         | excluded, with notice  |
/// | no        | yes        | excluded silently      |
/// | yes       | any        | kept, with notice      |
pub fn resolve_conflicts(
    tasks: Vec<ConversionTask>,
    overwrite: bool,
    unattended: bool,
    exists: impl Fn(&Path) -> bool,
) -> ConflictResolution {
    let (tasks, duplicates) = split_duplicate_outputs(tasks);
    let conflicts = tasks.iter().filter(|t| exists(&t.output_path)).count();

    if conflicts == 0 {
        return ConflictResolution {
            proceed: tasks,
            duplicates,
            ..Default::default()
        };
    }

    if overwrite {
        return ConflictResolution {
            proceed: tasks,
            excluded: Vec::new(),
            duplicates,
            notice: Some(ConflictNotice::Overwriting(conflicts)),
        };
    }

    let (excluded, proceed): (Vec<_>, Vec<_>) =
        tasks.into_iter().partition(|t| exists(&t.output_path));
    ConflictResolution {
        proceed,
        excluded,
        duplicates,
        notice: (!unattended).then_some(ConflictNotice::Skipping(conflicts)),
    }
}

/// Keeps the first task per output path, in batch order.
fn split_duplicate_outputs(
    tasks: Vec<ConversionTask>,
) -> (Vec<ConversionTask>, Vec<ConversionTask>) {
    let mut claimed = HashSet::new();
    tasks
        .into_iter()
        .partition(|t| claimed.insert(t.output_path.clone()))
}

/// Whether any filesystem entry exists at `path`, broken symlinks included.
pub fn entry_exists(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}

/// Whether sources are deleted after a committed run.
///
/// Lossless targets delete by default, lossy targets keep. An explicit choice wins.
pub fn deletes_sources(target: AudioFormat, explicit: Option<bool>) -> bool {
    explicit.unwrap_or_else(|| target.is_lossless())
}
