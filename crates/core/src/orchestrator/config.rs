//! Options for a conversion run.

use serde::{Deserialize, Serialize};

use crate::format::AudioFormat;
use crate::report::OutputMode;

/// Options controlling a single conversion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertOptions {
    /// Target format. Must be one of the conversion targets.
    pub target: AudioFormat,

    /// List candidates and stop.
    #[serde(default)]
    pub dry_run: bool,

    /// Skip the batch confirmation.
    #[serde(default)]
    pub auto_confirm: bool,

    /// Confirm each record before converting it.
    #[serde(default)]
    pub interactive: bool,

    /// Replace existing outputs instead of skipping their records.
    #[serde(default)]
    pub overwrite: bool,

    /// Explicit source deletion choice. `None` uses the target's default.
    #[serde(default)]
    pub delete_sources: Option<bool>,

    #[serde(default)]
    pub output: OutputMode,
}

impl ConvertOptions {
    pub fn new(target: AudioFormat) -> Self {
        Self {
            target,
            dry_run: false,
            auto_confirm: false,
            interactive: false,
            overwrite: false,
            delete_sources: None,
            output: OutputMode::Info,
        }
    }

    /// No operator is expected to answer prompts.
    pub fn is_unattended(&self) -> bool {
        self.auto_confirm || self.output.is_machine()
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_auto_confirm(mut self, auto_confirm: bool) -> Self {
        self.auto_confirm = auto_confirm;
        self
    }

    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_delete_sources(mut self, delete: Option<bool>) -> Self {
        self.delete_sources = delete;
        self
    }

    pub fn with_output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self::new(AudioFormat::Aiff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ConvertOptions::default();
        assert_eq!(options.target, AudioFormat::Aiff);
        assert!(!options.dry_run);
        assert!(!options.is_unattended());
        assert_eq!(options.delete_sources, None);
    }

    #[test]
    fn test_unattended() {
        assert!(ConvertOptions::default().with_auto_confirm(true).is_unattended());
        assert!(ConvertOptions::default()
            .with_output(OutputMode::Ids)
            .is_unattended());
        assert!(!ConvertOptions::default().with_interactive(true).is_unattended());
    }
}
