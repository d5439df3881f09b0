use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracksmith_core::{
    ConfirmationGate, ConsolePresenter, ConversionOrchestrator, Config, FfmpegConverter,
    RunOutcome, StdinPrompter, SystemProcessProbe,
};

use crate::cli::ConvertArgs;

pub async fn run(config: &Config, args: ConvertArgs) -> Result<i32> {
    if let Err(message) = args.validate() {
        error!("{}", message);
        return Ok(2);
    }

    let options = args.to_options();
    let filter = args.filter.to_filter();
    let catalog = super::open_catalog(config)?;
    let token = CancellationToken::new();

    let orchestrator = ConversionOrchestrator::new(
        FfmpegConverter::new(config.converter.clone()),
        catalog,
        ConfirmationGate::new(Arc::new(StdinPrompter::new())),
        Arc::new(ConsolePresenter::new(options.output)),
    )
    .with_process_probe(
        Arc::new(SystemProcessProbe::new()),
        config.host_app.process_names.clone(),
    )
    .with_cancellation(token.clone());

    let signals = tokio::spawn(cancel_on_signal(token));
    let result = orchestrator.run(&filter, &options).await;
    signals.abort();

    match result {
        Ok(outcome) => {
            report(&outcome);
            Ok(outcome.exit_code())
        }
        Err(e) => {
            error!("{}", e);
            Ok(e.exit_code())
        }
    }
}

fn report(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Completed(summary) => {
            if !summary.deletion_failures.is_empty() {
                warn!(
                    "{} source files could not be deleted",
                    summary.deletion_failures.len()
                );
            }
        }
        RunOutcome::Interrupted { stage, rollback } => match rollback {
            Some(report) if report.catalog_rolled_back => {
                warn!("Interrupted during {}; all changes were rolled back", stage)
            }
            Some(_) => error!("Interrupted during {}; rollback was incomplete", stage),
            None => warn!("Interrupted during {}", stage),
        },
        RunOutcome::Quit {
            rollback: Some(report),
            ..
        } => info!(
            "Quit: catalog rolled back, {} converted files removed",
            report.files_removed.len()
        ),
        _ => {}
    }
}

/// Cancels `token` on Ctrl+C, or SIGTERM on Unix.
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    warn!("Termination signal received, stopping");
    token.cancel();
}
