//! Library catalog: track records behind a transactional session.
//!
//! A session spans one invocation. Reads and staged updates happen inside a
//! single transaction that ends with exactly one commit or rollback.

mod filter;
mod sqlite;
mod types;

pub use filter::TrackFilter;
pub use sqlite::{SqliteCatalog, SqliteSession};
pub use types::*;

/// A catalog able to open transactional sessions.
pub trait Catalog: Send + Sync {
    /// Opens a session with a transaction already started.
    fn open_session(&self) -> Result<Box<dyn CatalogSession>, CatalogError>;

    /// Opens a session that will only read. Defaults to `open_session`.
    fn open_read_session(&self) -> Result<Box<dyn CatalogSession>, CatalogError> {
        self.open_session()
    }

    /// Read-only search: opens a read session, queries, and rolls back.
    fn search(&self, filter: &TrackFilter) -> Result<Vec<CatalogRecord>, CatalogError> {
        let mut session = self.open_read_session()?;
        let records = session.query(filter);
        session.rollback()?;
        records
    }
}

/// One open transaction against the catalog.
///
/// After `commit` or `rollback` every further call fails with
/// `CatalogError::SessionClosed`.
pub trait CatalogSession: Send {
    /// Returns the records matching the filter, in catalog order.
    fn query(&mut self, filter: &TrackFilter) -> Result<Vec<CatalogRecord>, CatalogError>;

    /// Returns one record by ID.
    fn get(&mut self, id: &str) -> Result<CatalogRecord, CatalogError>;

    /// Applies field changes inside the transaction.
    fn stage_update(&mut self, id: &str, update: &RecordUpdate) -> Result<(), CatalogError>;

    /// Makes all staged changes durable and closes the session.
    fn commit(&mut self) -> Result<(), CatalogError>;

    /// Discards all staged changes and closes the session.
    fn rollback(&mut self) -> Result<(), CatalogError>;

    /// Whether the transaction is still open.
    fn is_open(&self) -> bool;
}
