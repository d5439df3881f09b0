mod cli;
mod commands;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error};

use tracksmith_core::{load_config_or_default, validate_config};

use cli::{Cli, Command};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            logging::init_fallback();
            error!("Fatal error: {:#}", e);
            1
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let mut config =
        load_config_or_default(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(db) = &cli.db {
        config.catalog.path = Some(db.clone());
    }

    let machine_output = cli.command.print_mode() != cli::PrintMode::Info;
    let directive = logging::default_directive(&config.logging, cli.verbose, machine_output);
    logging::init(&config.logging, &directive)?;
    debug!("Effective configuration: {:?}", config.redacted());

    validate_config(&config).context("Invalid configuration")?;

    match cli.command {
        Command::Convert(args) => commands::convert::run(&config, args).await,
        Command::Search(args) => commands::search::run(&config, args),
    }
}
