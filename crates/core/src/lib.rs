//! Catalog maintenance for DJ libraries: search tracks and convert them to
//! another audio format without leaving the catalog and the filesystem out
//! of step.

pub mod catalog;
pub mod config;
pub mod converter;
pub mod format;
pub mod gate;
pub mod orchestrator;
pub mod preflight;
pub mod report;
pub mod testing;

pub use catalog::{
    Catalog, CatalogError, CatalogRecord, CatalogSession, RecordUpdate, SqliteCatalog,
    SqliteSession, TrackFilter,
};
pub use config::{
    load_config, load_config_from_str, load_config_or_default, validate_config, CatalogConfig,
    Config, ConfigError, HostAppConfig, LogFormat, LoggingConfig,
};
pub use converter::{
    AudioProperties, AudioStream, Converter, ConverterConfig, ConverterError, EncodeJob,
    EncodeResult, FfmpegConverter, OutputProperties,
};
pub use format::{AudioFormat, FormatCode, FormatError, TARGET_FORMATS};
pub use gate::{Answer, ConfirmMode, ConfirmationGate, GateError, Prompter, StdinPrompter};
pub use orchestrator::{
    BatchError, ConversionOrchestrator, ConversionSummary, ConversionTask, ConvertOptions,
    ConvertedFile, OrchestratorError, PreconditionError, RollbackReport, RunOutcome, Stage,
};
pub use preflight::{ProcessProbe, RunningProcess, SystemProcessProbe};
pub use report::{ConsolePresenter, OutputMode, Presenter, PreviewKind};
