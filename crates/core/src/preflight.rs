//! Detection of the catalog's owning application.
//!
//! The catalog must not be written while the application that owns it is
//! running. Process lookup shells out to the platform tool (`pgrep` on Unix,
//! `tasklist` on Windows).

use async_trait::async_trait;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// A running process matched by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningProcess {
    pub name: String,
    pub pid: u32,
}

/// Errors from process lookup.
#[derive(Debug, Error)]
pub enum ProcessProbeError {
    /// The lookup tool could not be run.
    #[error("process lookup with {tool} failed: {reason}")]
    LookupFailed { tool: &'static str, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Finds running processes by name.
#[async_trait]
pub trait ProcessProbe: Send + Sync {
    /// Returns the first running process whose name matches one of `names`.
    async fn find_running(
        &self,
        names: &[String],
    ) -> Result<Option<RunningProcess>, ProcessProbeError>;
}

/// Process lookup through the operating system's process tools.
#[derive(Debug, Default, Clone)]
pub struct SystemProcessProbe;

impl SystemProcessProbe {
    pub fn new() -> Self {
        Self
    }

    async fn lookup_unix(name: &str) -> Result<Option<u32>, ProcessProbeError> {
        let output = Command::new("pgrep")
            .arg("-x")
            .arg(name)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ProcessProbeError::LookupFailed {
                tool: "pgrep",
                reason: e.to_string(),
            })?;

        // pgrep exits 1 when nothing matched
        match output.status.code() {
            Some(0) => Ok(parse_pgrep_output(&String::from_utf8_lossy(&output.stdout))),
            Some(1) => Ok(None),
            code => Err(ProcessProbeError::LookupFailed {
                tool: "pgrep",
                reason: format!(
                    "exit code {:?}: {}",
                    code,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            }),
        }
    }

    async fn lookup_windows(name: &str) -> Result<Option<u32>, ProcessProbeError> {
        let image = if name.to_ascii_lowercase().ends_with(".exe") {
            name.to_string()
        } else {
            format!("{}.exe", name)
        };

        let output = Command::new("tasklist")
            .args(["/FI", &format!("IMAGENAME eq {}", image), "/FO", "CSV", "/NH"])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ProcessProbeError::LookupFailed {
                tool: "tasklist",
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(ProcessProbeError::LookupFailed {
                tool: "tasklist",
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(parse_tasklist_output(
            &String::from_utf8_lossy(&output.stdout),
            &image,
        ))
    }
}

#[async_trait]
impl ProcessProbe for SystemProcessProbe {
    async fn find_running(
        &self,
        names: &[String],
    ) -> Result<Option<RunningProcess>, ProcessProbeError> {
        for name in names {
            let pid = if cfg!(windows) {
                Self::lookup_windows(name).await?
            } else {
                Self::lookup_unix(name).await?
            };

            if let Some(pid) = pid {
                debug!("Found running process {} (pid {})", name, pid);
                return Ok(Some(RunningProcess {
                    name: name.clone(),
                    pid,
                }));
            }
        }
        Ok(None)
    }
}

/// First PID in `pgrep` output.
fn parse_pgrep_output(stdout: &str) -> Option<u32> {
    stdout
        .lines()
        .filter_map(|line| line.trim().parse::<u32>().ok())
        .next()
}

/// First PID in `tasklist /FO CSV /NH` output for the given image name.
fn parse_tasklist_output(stdout: &str, image: &str) -> Option<u32> {
    stdout.lines().find_map(|line| {
        let mut fields = line.split(',').map(|f| f.trim().trim_matches('"'));
        let name = fields.next()?;
        if !name.eq_ignore_ascii_case(image) {
            return None;
        }
        fields.next()?.parse::<u32>().ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pgrep_output() {
        assert_eq!(parse_pgrep_output("4321\n9876\n"), Some(4321));
        assert_eq!(parse_pgrep_output(""), None);
    }

    #[test]
    fn test_parse_tasklist_output() {
        let stdout = "\"rekordbox.exe\",\"12345\",\"Console\",\"1\",\"812,344 K\"\r\n";
        assert_eq!(parse_tasklist_output(stdout, "rekordbox.exe"), Some(12345));

        let none = "INFO: No tasks are running which match the specified criteria.\r\n";
        assert_eq!(parse_tasklist_output(none, "rekordbox.exe"), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unknown_process_is_not_running() {
        let probe = SystemProcessProbe::new();
        let names = vec!["tracksmith-no-such-process".to_string()];
        // Hosts without pgrep report a lookup failure instead
        if let Ok(found) = probe.find_running(&names).await {
            assert!(found.is_none());
        }
    }
}
