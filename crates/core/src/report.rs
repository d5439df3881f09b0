//! Operator-facing output: track tables and machine-readable ID lists.

use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::catalog::CatalogRecord;
use crate::format::display_name_for;
use crate::orchestrator::{ConversionTask, ConvertedFile};

/// What goes to standard output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Human-readable tables.
    #[default]
    Info,
    /// Space-separated record IDs.
    Ids,
    /// Nothing.
    Silent,
}

impl OutputMode {
    /// Whether the output is meant for scripts.
    pub fn is_machine(&self) -> bool {
        matches!(self, Self::Ids | Self::Silent)
    }
}

/// Why a candidate list is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewKind {
    /// Dry run: nothing will be converted.
    DryRun,
    /// Shown before asking for confirmation.
    BeforeConvert,
}

/// Renders results for the operator.
pub trait Presenter: Send + Sync {
    /// Shows the candidates about to be converted.
    fn preview(&self, tasks: &[ConversionTask], kind: PreviewKind);

    /// Shows the records converted by a committed run.
    fn converted(&self, files: &[ConvertedFile]);

    /// Shows search results.
    fn tracks(&self, records: &[CatalogRecord]);
}

/// Writes to standard output according to an [`OutputMode`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolePresenter {
    mode: OutputMode,
}

impl ConsolePresenter {
    pub fn new(mode: OutputMode) -> Self {
        Self { mode }
    }

    fn emit(&self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        // A closed pipe must not abort a run that already changed the catalog
        let _ = writeln!(stdout, "{}", text);
        let _ = stdout.flush();
    }
}

impl Presenter for ConsolePresenter {
    fn preview(&self, tasks: &[ConversionTask], kind: PreviewKind) {
        match self.mode {
            OutputMode::Info => {
                let records: Vec<CatalogRecord> = tasks.iter().map(|t| t.record.clone()).collect();
                let heading = match kind {
                    PreviewKind::DryRun => "Files that would be converted:",
                    PreviewKind::BeforeConvert => "Files to convert:",
                };
                self.emit(heading);
                self.emit(&render_track_table(&records));
            }
            OutputMode::Ids if kind == PreviewKind::DryRun => {
                self.emit(&join_ids(tasks.iter().map(|t| t.record.id.as_str())));
            }
            _ => {}
        }
    }

    fn converted(&self, files: &[ConvertedFile]) {
        if self.mode == OutputMode::Ids {
            self.emit(&join_ids(files.iter().map(|f| f.record_id.as_str())));
        }
    }

    fn tracks(&self, records: &[CatalogRecord]) {
        match self.mode {
            OutputMode::Info => self.emit(&render_track_table(records)),
            OutputMode::Ids => self.emit(&join_ids(records.iter().map(|r| r.id.as_str()))),
            OutputMode::Silent => {}
        }
    }
}

fn join_ids<'a>(ids: impl Iterator<Item = &'a str>) -> String {
    ids.collect::<Vec<_>>().join(" ")
}

const COLUMNS: [(&str, usize); 7] = [
    ("ID", 10),
    ("FileNameL", 40),
    ("Type", 8),
    ("SampleRate", 14),
    ("BitRate", 8),
    ("BitDepth", 8),
    ("FolderPath", 70),
];

/// Renders records as a fixed-width table. Long values are shortened in the middle.
pub fn render_track_table(records: &[CatalogRecord]) -> String {
    if records.is_empty() {
        return "No tracks found.".to_string();
    }

    let header = format_row(COLUMNS.iter().map(|(name, _)| name.to_string()));
    let mut lines = vec![header.clone(), "-".repeat(header.chars().count())];

    for record in records {
        let file_type = display_name_for(record.format_code)
            .map(str::to_string)
            .unwrap_or_else(|_| format!("Unk({})", record.format_code));
        let sample_rate = record
            .sample_rate
            .filter(|r| *r > 0)
            .map(|r| r.to_string())
            .unwrap_or_else(|| "--".to_string());
        let or_dashes = |v: Option<u32>| v.map(|v| v.to_string()).unwrap_or_else(|| "--".into());
        let or_na = |v: &str| if v.is_empty() { "N/A".to_string() } else { v.to_string() };

        lines.push(format_row([
            record.id.clone(),
            or_na(&record.file_name),
            file_type,
            sample_rate,
            or_dashes(record.bit_rate),
            or_dashes(record.bit_depth),
            or_na(&record.folder_path),
        ]));
    }

    lines.join("\n")
}

fn format_row(values: impl IntoIterator<Item = String>) -> String {
    let cells: Vec<String> = values
        .into_iter()
        .zip(COLUMNS.iter())
        .map(|(value, (_, width))| format!("{:<width$}", truncate_middle(&value, *width), width = *width))
        .collect();
    cells.join("   ").trim_end().to_string()
}

/// Shortens `value` to `width` characters by replacing its middle with "...".
pub fn truncate_middle(value: &str, width: usize) -> String {
    let len = value.chars().count();
    if len <= width || width <= 3 {
        return value.to_string();
    }
    let available = width - 3;
    let head = available / 2;
    let tail = available - head;
    let start: String = value.chars().take(head).collect();
    let end: String = value.chars().skip(len - tail).collect();
    format!("{}...{}", start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_truncate_middle() {
        assert_eq!(truncate_middle("short", 10), "short");
        let long = "abcdefghijklmnopqrstuvwxyz";
        let cut = truncate_middle(long, 10);
        assert_eq!(cut, "abc...vwxy");
        assert_eq!(cut.chars().count(), 10);
    }

    #[test]
    fn test_render_track_table() {
        let mut record = fixtures::track("42", "/music/a.flac", 5, Some(16));
        record.bit_rate = None;
        let table = render_track_table(&[record, fixtures::track("43", "/music/b.x", 3, None)]);
        let lines: Vec<&str> = table.lines().collect();

        assert!(lines[0].starts_with("ID         FileNameL"));
        assert!(lines[1].chars().all(|c| c == '-'));
        assert!(lines[2].starts_with("42 "));
        assert!(lines[2].contains("FLAC"));
        assert!(lines[2].contains("--"));
        assert!(lines[3].contains("Unk(3)"));
    }

    #[test]
    fn test_empty_table() {
        assert_eq!(render_track_table(&[]), "No tracks found.");
    }

    #[test]
    fn test_output_mode_machine() {
        assert!(OutputMode::Ids.is_machine());
        assert!(OutputMode::Silent.is_machine());
        assert!(!OutputMode::Info.is_machine());
    }
}
