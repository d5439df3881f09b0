//! Conversion orchestrator implementation.
//!
//! One run walks the stages in order:
//! precheck, query, conflict check, preview, confirm, convert loop, commit,
//! postprocess. Everything before commit is undone on any failure.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::catalog::{Catalog, CatalogRecord, CatalogSession, RecordUpdate, TrackFilter};
use crate::converter::{Converter, EncodeJob};
use crate::format::{is_lossy_code, AudioFormat};
use crate::gate::{Answer, ConfirmMode, ConfirmationGate, GateError};
use crate::preflight::{ProcessProbe, SystemProcessProbe};
use crate::report::{Presenter, PreviewKind};

use super::config::ConvertOptions;
use super::policy::{deletes_sources, entry_exists, resolve_conflicts, ConflictNotice};
use super::rollback::{execute_rollback, RollbackPlan, RollbackReport};
use super::types::{
    BatchError, ConversionSummary, ConversionTask, ConvertedFile, DeletionFailure,
    OrchestratorError, PreconditionError, RunOutcome, Stage,
};

/// Default names of the catalog's owning application.
pub const DEFAULT_OWNING_APP: &[&str] = &["rekordbox"];

/// Answer to a prompt raced against cancellation.
enum Confirmation {
    Yes,
    No,
    Quit,
    Interrupted,
}

/// Result of processing one candidate.
enum Step {
    Converted(ConvertedFile),
    Skipped,
    Interrupted,
}

/// Drives one conversion run against a catalog.
pub struct ConversionOrchestrator<C>
where
    C: Converter + 'static,
{
    converter: C,
    catalog: Arc<dyn Catalog>,
    gate: ConfirmationGate,
    presenter: Arc<dyn Presenter>,
    process_probe: Arc<dyn ProcessProbe>,
    owning_app: Vec<String>,
    cancel: CancellationToken,
}

impl<C> ConversionOrchestrator<C>
where
    C: Converter + 'static,
{
    /// Create a new orchestrator.
    pub fn new(
        converter: C,
        catalog: Arc<dyn Catalog>,
        gate: ConfirmationGate,
        presenter: Arc<dyn Presenter>,
    ) -> Self {
        Self {
            converter,
            catalog,
            gate,
            presenter,
            process_probe: Arc::new(SystemProcessProbe::new()),
            owning_app: DEFAULT_OWNING_APP.iter().map(|s| s.to_string()).collect(),
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the owning-application lookup.
    pub fn with_process_probe(mut self, probe: Arc<dyn ProcessProbe>, names: Vec<String>) -> Self {
        self.process_probe = probe;
        self.owning_app = names;
        self
    }

    /// Uses an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that interrupts the run when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Access the converter.
    pub fn converter(&self) -> &C {
        &self.converter
    }

    /// Runs one conversion.
    pub async fn run(
        &self,
        filter: &TrackFilter,
        options: &ConvertOptions,
    ) -> Result<RunOutcome, OrchestratorError> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("convert", run_id = %run_id, target = %options.target);
        self.run_inner(run_id, filter, options).instrument(span).await
    }

    async fn run_inner(
        &self,
        run_id: String,
        filter: &TrackFilter,
        options: &ConvertOptions,
    ) -> Result<RunOutcome, OrchestratorError> {
        debug!("Entering stage {}", Stage::Precheck);

        if let Some(outcome) = self.check_owning_app(options).await? {
            return Ok(outcome);
        }
        if self.cancel.is_cancelled() {
            return Ok(interrupted(Stage::Precheck, None));
        }

        self.converter
            .validate()
            .await
            .map_err(PreconditionError::EncoderUnavailable)?;

        let mut session = self
            .catalog
            .open_session()
            .map_err(PreconditionError::NoSession)?;

        let result = self
            .run_session(session.as_mut(), &run_id, filter, options)
            .await;

        // Paths that end without commit or rollback changed nothing
        if session.is_open() {
            if let Err(e) = session.rollback() {
                warn!("Failed to close catalog session: {}", e);
            }
        }

        result
    }

    async fn run_session(
        &self,
        session: &mut dyn CatalogSession,
        run_id: &str,
        filter: &TrackFilter,
        options: &ConvertOptions,
    ) -> Result<RunOutcome, OrchestratorError> {
        let started_at = Utc::now();
        let target = options.target;

        // QUERY
        let stage = Stage::Query;
        debug!("Entering stage {}", stage);
        if self.cancel.is_cancelled() {
            return Ok(interrupted(stage, None));
        }
        let records = session.query(filter).map_err(OrchestratorError::Query)?;
        let tasks = select_candidates(records, target);
        if tasks.is_empty() {
            info!("No files to convert. Nothing to do.");
            return Ok(RunOutcome::NothingToDo);
        }
        info!("Found {} files to convert", tasks.len());

        // CONFLICT_CHECK
        let stage = Stage::ConflictCheck;
        debug!("Entering stage {}", stage);
        let resolution = resolve_conflicts(tasks, options.overwrite, options.auto_confirm, entry_exists);
        for task in &resolution.duplicates {
            warn!(
                "Skipping record {}: {} is also the output of an earlier record in this batch",
                task.record_id(),
                task.output_path.display()
            );
        }
        match resolution.notice {
            Some(ConflictNotice::Skipping(count)) => warn!(
                "Skipping {} files whose output already exists (use --overwrite to replace them)",
                count
            ),
            Some(ConflictNotice::Overwriting(count)) => {
                warn!("{} output files already exist and will be overwritten", count)
            }
            None => {}
        }
        for task in &resolution.excluded {
            debug!("Excluded record {}: {} exists", task.record_id(), task.output_path.display());
        }
        let tasks = resolution.proceed;
        if tasks.is_empty() {
            info!("Nothing to convert");
            return Ok(RunOutcome::NothingToConvert {
                excluded: resolution.excluded.len() + resolution.duplicates.len(),
            });
        }

        // PREVIEW
        let stage = Stage::Preview;
        debug!("Entering stage {}", stage);
        if options.dry_run {
            self.presenter.preview(&tasks, PreviewKind::DryRun);
            info!("Dry run: {} files would be converted to {}", tasks.len(), target);
            return Ok(RunOutcome::DryRun {
                candidates: tasks.iter().map(|t| t.record.id.clone()).collect(),
            });
        }
        self.presenter.preview(&tasks, PreviewKind::BeforeConvert);

        // CONFIRM
        let stage = Stage::Confirm;
        debug!("Entering stage {}", stage);
        if !options.auto_confirm {
            let question = format!(
                "Convert {} files to {}?",
                tasks.len(),
                target.name().to_uppercase()
            );
            match self.confirm(&question, true, ConfirmMode::Standard).await {
                Confirmation::Yes => {}
                Confirmation::No => {
                    info!("Conversion cancelled, nothing changed");
                    return Ok(RunOutcome::Declined { stage });
                }
                Confirmation::Quit => {
                    info!("Quit before converting, nothing changed");
                    return Ok(RunOutcome::Quit {
                        stage,
                        rollback: None,
                    });
                }
                Confirmation::Interrupted => return Ok(interrupted(stage, None)),
            }
        }

        // CONVERT_LOOP
        let stage = Stage::ConvertLoop;
        debug!("Entering stage {}", stage);
        let mut plan = RollbackPlan::new(run_id);
        let mut skipped = 0;
        let total = tasks.len();

        for (index, task) in tasks.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Ok(self.interrupt(session, &plan, stage).await);
            }

            info!(
                "Processing {}/{}: {}",
                index + 1,
                total,
                task.source_path.display()
            );

            if options.interactive {
                let question = format!("Convert {}?", task.record.file_name);
                match self.confirm(&question, true, ConfirmMode::Standard).await {
                    Confirmation::Yes => {}
                    Confirmation::No => {
                        info!("Skipping {}", task.source_path.display());
                        skipped += 1;
                        continue;
                    }
                    Confirmation::Quit => {
                        info!("Quit requested, rolling back");
                        let report = execute_rollback(session, &plan).await;
                        return Ok(RunOutcome::Quit {
                            stage,
                            rollback: Some(report),
                        });
                    }
                    Confirmation::Interrupted => {
                        return Ok(self.interrupt(session, &plan, stage).await)
                    }
                }
            }

            match self.convert_one(session, task, options, &mut plan).await {
                Ok(Step::Converted(file)) => plan.record_conversion(file),
                Ok(Step::Skipped) => skipped += 1,
                Ok(Step::Interrupted) => return Ok(self.interrupt(session, &plan, stage).await),
                Err(cause) => return Err(self.abort(session, &plan, stage, cause).await),
            }
        }

        if plan.converted.is_empty() {
            info!("No files were converted");
            return Ok(RunOutcome::NoFilesConverted { skipped });
        }

        // COMMIT
        let stage = Stage::Commit;
        debug!("Entering stage {}", stage);
        if self.cancel.is_cancelled() {
            return Ok(self.interrupt(session, &plan, stage).await);
        }
        if let Err(e) = session.commit() {
            return Err(self
                .abort(session, &plan, stage, BatchError::CommitFailed(e))
                .await);
        }
        info!("Catalog changes committed for {} files", plan.converted.len());
        self.presenter.converted(&plan.converted);

        // POSTPROCESS
        let stage = Stage::Postprocess;
        debug!("Entering stage {}", stage);
        let mut sources_deleted = Vec::new();
        let mut deletion_failures = Vec::new();
        let mut cut_short = false;

        if deletes_sources(target, options.delete_sources) {
            for file in &plan.converted {
                if self.cancel.is_cancelled() {
                    warn!("Interrupted after commit; remaining source files are kept");
                    cut_short = true;
                    break;
                }
                match tokio::fs::remove_file(&file.source_path).await {
                    Ok(()) => {
                        debug!("Deleted {}", file.source_path.display());
                        sources_deleted.push(file.source_path.clone());
                    }
                    Err(e) => {
                        warn!("Failed to delete {}: {}", file.source_path.display(), e);
                        deletion_failures.push(DeletionFailure {
                            path: file.source_path.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }
            info!("Deleted {} original files", sources_deleted.len());
        } else {
            info!("Original files kept");
        }

        let summary = ConversionSummary {
            run_id: run_id.to_string(),
            target,
            started_at,
            finished_at: Utc::now(),
            converted: plan.converted,
            skipped,
            sources_deleted,
            deletion_failures,
        };
        info!(
            "Converted {} files to {} ({} skipped)",
            summary.converted_count(),
            target,
            summary.skipped
        );

        if cut_short {
            return Ok(interrupted(stage, None));
        }
        debug!("Entering stage {}", Stage::Done);
        Ok(RunOutcome::Completed(summary))
    }

    /// Steps 1 to 6 for one candidate. Any error is fatal to the batch.
    async fn convert_one(
        &self,
        session: &mut dyn CatalogSession,
        task: &ConversionTask,
        options: &ConvertOptions,
        plan: &mut RollbackPlan,
    ) -> Result<Step, BatchError> {
        let record_id = task.record_id();

        if !task.source_path.exists() {
            return Err(BatchError::source_vanished(record_id, &task.source_path));
        }

        if !options.overwrite && entry_exists(&task.output_path) {
            warn!(
                "Output appeared since the conflict check, skipping: {}",
                task.output_path.display()
            );
            return Ok(Step::Skipped);
        }

        let source = self
            .converter
            .probe_properties(&task.source_path)
            .await
            .map_err(|source| BatchError::Probe {
                record_id: record_id.to_string(),
                path: task.source_path.clone(),
                source,
            })?;

        let selection = task.target.codec_for(source.bit_depth);
        if let Some(sub) = selection.substitution {
            info!(
                "No {}-bit {} codec, using {}-bit ({})",
                sub.requested, task.target, sub.used, selection.codec
            );
        }
        debug!(
            "Encoding {} with codec {} ({}-bit source)",
            record_id, selection.codec, source.bit_depth
        );

        let job = EncodeJob {
            job_id: record_id.to_string(),
            input_path: task.source_path.clone(),
            output_path: task.output_path.clone(),
            format: task.target,
            codec: selection.codec,
        };

        // A replaced file belongs to the operator until the encode succeeds
        if !entry_exists(&task.output_path) {
            plan.begin_output(task.output_path.clone());
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(Step::Interrupted),
            result = self.converter.encode(job) => {
                result.map_err(|source| BatchError::Encode {
                    record_id: record_id.to_string(),
                    path: task.source_path.clone(),
                    source,
                })?;
            }
        }

        if !task.output_path.exists() {
            return Err(BatchError::OutputMissing {
                record_id: record_id.to_string(),
                path: task.output_path.clone(),
            });
        }

        let lossless = task.target.is_lossless();
        let output = self
            .converter
            .probe_output(&task.output_path, lossless)
            .await
            .map_err(|source| BatchError::Probe {
                record_id: record_id.to_string(),
                path: task.output_path.clone(),
                source,
            })?;

        if lossless {
            if let (Some(expected), Some(actual)) =
                (task.record.recorded_bit_depth(), output.bit_depth)
            {
                if expected != actual {
                    return Err(BatchError::BitDepthMismatch {
                        record_id: record_id.to_string(),
                        expected,
                        actual,
                    });
                }
            }
        }

        let bit_rate = if task.target == AudioFormat::Flac {
            0
        } else {
            output.bit_rate_kbps
        };
        let update = RecordUpdate {
            file_name: task.output_file_name.clone(),
            folder_path: task.output_path.to_string_lossy().into_owned(),
            format_code: task.target.code(),
            bit_rate,
        };
        session
            .stage_update(record_id, &update)
            .map_err(|source| BatchError::Catalog {
                record_id: record_id.to_string(),
                source,
            })?;

        info!(
            "Converted {} -> {}",
            task.source_path.display(),
            task.output_path.display()
        );

        Ok(Step::Converted(ConvertedFile {
            record_id: record_id.to_string(),
            source_path: task.source_path.clone(),
            output_path: task.output_path.clone(),
        }))
    }

    /// Refuses or confirms running while the owning application is open.
    async fn check_owning_app(
        &self,
        options: &ConvertOptions,
    ) -> Result<Option<RunOutcome>, OrchestratorError> {
        if self.owning_app.is_empty() {
            return Ok(None);
        }

        let running = match self.process_probe.find_running(&self.owning_app).await {
            Ok(running) => running,
            Err(e) => {
                warn!(
                    "Could not check whether {} is running: {}",
                    self.owning_app.join(", "),
                    e
                );
                return Ok(None);
            }
        };

        let Some(process) = running else {
            return Ok(None);
        };

        if options.is_unattended() {
            return Err(PreconditionError::OwningAppRunning {
                name: process.name,
                pid: process.pid,
            }
            .into());
        }

        warn!(
            "{} is running (pid {}); catalog changes may be overwritten by it",
            process.name, process.pid
        );
        let question = format!("{} is running. Continue anyway?", process.name);
        match self.confirm(&question, false, ConfirmMode::Binary).await {
            Confirmation::Yes => Ok(None),
            // End of input arrives here as Quit
            Confirmation::No | Confirmation::Quit => Err(PreconditionError::OwningAppDeclined {
                name: process.name,
                pid: process.pid,
            }
            .into()),
            Confirmation::Interrupted => Ok(Some(interrupted(Stage::Precheck, None))),
        }
    }

    async fn confirm(&self, question: &str, default_yes: bool, mode: ConfirmMode) -> Confirmation {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Confirmation::Interrupted,
            answer = self.gate.ask(question, default_yes, mode) => match answer {
                Ok(Answer::Yes) => Confirmation::Yes,
                Ok(Answer::No) => Confirmation::No,
                Err(GateError::UserQuit(reason)) => {
                    debug!("Prompt ended: {}", reason);
                    Confirmation::Quit
                }
                Err(GateError::Input(e)) => {
                    warn!("Could not read confirmation, treating as quit: {}", e);
                    Confirmation::Quit
                }
            },
        }
    }

    async fn interrupt(
        &self,
        session: &mut dyn CatalogSession,
        plan: &RollbackPlan,
        stage: Stage,
    ) -> RunOutcome {
        warn!("Interrupted during {}, rolling back", stage);
        let report = execute_rollback(session, plan).await;
        interrupted(stage, Some(report))
    }

    async fn abort(
        &self,
        session: &mut dyn CatalogSession,
        plan: &RollbackPlan,
        stage: Stage,
        cause: BatchError,
    ) -> OrchestratorError {
        error!("Error during {}: {}", stage, cause);
        let rollback = execute_rollback(session, plan).await;
        log_rollback(&rollback);
        OrchestratorError::BatchAborted {
            stage,
            cause,
            rollback,
        }
    }
}

fn interrupted(stage: Stage, rollback: Option<RollbackReport>) -> RunOutcome {
    RunOutcome::Interrupted { stage, rollback }
}

fn log_rollback(report: &RollbackReport) {
    if report.catalog_rolled_back {
        info!(
            "Rollback complete: catalog unchanged, {} converted files removed",
            report.files_removed.len()
        );
    } else {
        error!(
            "Rollback incomplete: catalog was not rolled back ({})",
            report.catalog_error.as_deref().unwrap_or("unknown error")
        );
    }
    for e in &report.errors {
        warn!("Cleanup: {}", e);
    }
}

/// Keeps lossless records not already in the target format, in catalog order.
fn select_candidates(records: Vec<CatalogRecord>, target: AudioFormat) -> Vec<ConversionTask> {
    let mut tasks = Vec::new();

    for record in records {
        if record.format_code == target.code() {
            debug!("Record {} is already {}", record.id, target);
            continue;
        }
        if is_lossy_code(record.format_code) {
            debug!("Record {} is lossy, not a conversion source", record.id);
            continue;
        }
        if AudioFormat::from_code(record.format_code).is_err() {
            warn!(
                "Skipping record {}: unknown format code {}",
                record.id, record.format_code
            );
            continue;
        }
        match ConversionTask::new(record, target) {
            Ok(task) => tasks.push(task),
            Err(e) => warn!("Skipping {}", e),
        }
    }

    tasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_select_candidates_filters_by_format() {
        let records = vec![
            fixtures::track("1", "/m/a.flac", 5, Some(16)),
            fixtures::track("2", "/m/b.aiff", 12, Some(16)),
            fixtures::track("3", "/m/c.mp3", 1, None),
            fixtures::track("4", "/m/d.m4a", 4, None),
            fixtures::track("5", "/m/e.wav", 11, Some(24)),
            fixtures::track("6", "/m/f.xyz", 99, None),
        ];

        let tasks = select_candidates(records, AudioFormat::Aiff);
        let ids: Vec<&str> = tasks.iter().map(|t| t.record_id()).collect();
        assert_eq!(ids, vec!["1", "5"]);
    }

    #[test]
    fn test_select_candidates_for_flac_target() {
        let records = vec![
            fixtures::track("1", "/m/a.flac", 5, Some(16)),
            fixtures::track("2", "/m/b.aiff", 12, Some(16)),
        ];
        let tasks = select_candidates(records, AudioFormat::Flac);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].output_path, std::path::PathBuf::from("/m/b.flac"));
    }

    #[test]
    fn test_select_candidates_skips_malformed_records() {
        let mut no_path = fixtures::track("2", "", 5, Some(16));
        no_path.file_name = String::new();
        let records = vec![
            fixtures::track("1", "/m/a.flac", 5, Some(16)),
            no_path,
            // Already named like the target although tagged as FLAC
            fixtures::track("3", "/m/c.aiff", 5, Some(16)),
            fixtures::track("4", "/m/d.wav", 11, Some(16)),
        ];

        let tasks = select_candidates(records, AudioFormat::Aiff);
        let ids: Vec<&str> = tasks.iter().map(|t| t.record_id()).collect();
        assert_eq!(ids, vec!["1", "4"]);
    }
}
