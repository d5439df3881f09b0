//! Conversion orchestrator.
//!
//! Converts catalog records to a target format as one transaction: every
//! record is encoded, verified and staged, and only then committed. Any
//! failure rolls back the catalog and removes the files written so far.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tracksmith_core::{
//!     ConfirmationGate, ConsolePresenter, ConversionOrchestrator, ConvertOptions,
//!     FfmpegConverter, SqliteCatalog, StdinPrompter, TrackFilter, AudioFormat,
//! };
//!
//! let catalog = Arc::new(SqliteCatalog::open("master.db".as_ref())?);
//! let orchestrator = ConversionOrchestrator::new(
//!     FfmpegConverter::with_defaults(),
//!     catalog,
//!     ConfirmationGate::new(Arc::new(StdinPrompter::new())),
//!     Arc::new(ConsolePresenter::default()),
//! );
//!
//! let outcome = orchestrator
//!     .run(&TrackFilter::default(), &ConvertOptions::new(AudioFormat::Aiff))
//!     .await?;
//! ```

mod config;
mod policy;
mod rollback;
mod runner;
mod types;

pub use config::ConvertOptions;
pub use policy::{deletes_sources, entry_exists, resolve_conflicts, ConflictNotice, ConflictResolution};
pub use rollback::{cleanup_outputs, execute_rollback, RollbackPlan, RollbackReport};
pub use runner::{ConversionOrchestrator, DEFAULT_OWNING_APP};
pub use types::{
    BatchError, ConversionSummary, ConversionTask, ConvertedFile, DeletionFailure,
    OrchestratorError, PreconditionError, RunOutcome, Stage,
};
