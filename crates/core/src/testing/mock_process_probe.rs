//! Mock process probe for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::preflight::{ProcessProbe, ProcessProbeError, RunningProcess};

#[derive(Debug, Clone)]
enum ProbeBehavior {
    NotRunning,
    Running(u32),
    Fails(String),
}

/// Mock implementation of the ProcessProbe trait.
#[derive(Debug, Clone)]
pub struct MockProcessProbe {
    behavior: Arc<RwLock<ProbeBehavior>>,
    calls: Arc<AtomicUsize>,
}

impl Default for MockProcessProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProcessProbe {
    /// A probe that finds nothing running.
    pub fn new() -> Self {
        Self {
            behavior: Arc::new(RwLock::new(ProbeBehavior::NotRunning)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A probe that reports the first requested name as running.
    pub fn running(pid: u32) -> Self {
        let mut probe = Self::new();
        probe.behavior = Arc::new(RwLock::new(ProbeBehavior::Running(pid)));
        probe
    }

    /// A probe whose lookup fails.
    pub fn failing(reason: &str) -> Self {
        let mut probe = Self::new();
        probe.behavior = Arc::new(RwLock::new(ProbeBehavior::Fails(reason.to_string())));
        probe
    }

    /// Number of lookups performed.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessProbe for MockProcessProbe {
    async fn find_running(
        &self,
        names: &[String],
    ) -> Result<Option<RunningProcess>, ProcessProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &*self.behavior.read().await {
            ProbeBehavior::NotRunning => Ok(None),
            ProbeBehavior::Running(pid) => Ok(names.first().map(|name| RunningProcess {
                name: name.clone(),
                pid: *pid,
            })),
            ProbeBehavior::Fails(reason) => Err(ProcessProbeError::LookupFailed {
                tool: "mock",
                reason: reason.clone(),
            }),
        }
    }
}
