//! Tracing subscriber setup.

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracksmith_core::{LogFormat, LoggingConfig};

/// Picks the default filter. `RUST_LOG` still wins over it.
pub fn default_directive(config: &LoggingConfig, verbose: u8, machine_output: bool) -> String {
    match verbose {
        0 if machine_output => "error".to_string(),
        0 => config.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Installs the global subscriber. Logs go to stderr; stdout carries command output.
pub fn init(config: &LoggingConfig, directive: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let file_layer = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    match config.format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()?,
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?,
    }

    Ok(())
}

/// Console logging for errors raised before configuration is loaded.
pub fn init_fallback() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("info"))
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
