//! Catalog wrapper that counts session calls.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::catalog::{
    Catalog, CatalogError, CatalogRecord, CatalogSession, RecordUpdate, TrackFilter,
};

#[derive(Debug, Default)]
struct Counters {
    sessions: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    staged: AtomicUsize,
    fail_commit: AtomicBool,
}

/// Wraps a catalog and records how its sessions end.
#[derive(Clone)]
pub struct RecordingCatalog {
    inner: Arc<dyn Catalog>,
    counters: Arc<Counters>,
}

impl RecordingCatalog {
    pub fn new(inner: Arc<dyn Catalog>) -> Self {
        Self {
            inner,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Make every commit fail without reaching the wrapped catalog.
    pub fn fail_commits(&self) {
        self.counters.fail_commit.store(true, Ordering::SeqCst);
    }

    pub fn sessions(&self) -> usize {
        self.counters.sessions.load(Ordering::SeqCst)
    }

    /// Successful commits.
    pub fn commits(&self) -> usize {
        self.counters.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.counters.rollbacks.load(Ordering::SeqCst)
    }

    pub fn staged_updates(&self) -> usize {
        self.counters.staged.load(Ordering::SeqCst)
    }
}

impl Catalog for RecordingCatalog {
    fn open_session(&self) -> Result<Box<dyn CatalogSession>, CatalogError> {
        let inner = self.inner.open_session()?;
        self.counters.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingSession {
            inner,
            counters: Arc::clone(&self.counters),
        }))
    }

    fn open_read_session(&self) -> Result<Box<dyn CatalogSession>, CatalogError> {
        let inner = self.inner.open_read_session()?;
        self.counters.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingSession {
            inner,
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct RecordingSession {
    inner: Box<dyn CatalogSession>,
    counters: Arc<Counters>,
}

impl CatalogSession for RecordingSession {
    fn query(&mut self, filter: &TrackFilter) -> Result<Vec<CatalogRecord>, CatalogError> {
        self.inner.query(filter)
    }

    fn get(&mut self, id: &str) -> Result<CatalogRecord, CatalogError> {
        self.inner.get(id)
    }

    fn stage_update(&mut self, id: &str, update: &RecordUpdate) -> Result<(), CatalogError> {
        self.inner.stage_update(id, update)?;
        self.counters.staged.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), CatalogError> {
        if self.counters.fail_commit.load(Ordering::SeqCst) {
            return Err(CatalogError::Database("database is locked".to_string()));
        }
        self.inner.commit()?;
        self.counters.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), CatalogError> {
        self.inner.rollback()?;
        self.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }
}
