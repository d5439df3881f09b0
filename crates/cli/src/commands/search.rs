use anyhow::{Context, Result};
use tracing::info;
use tracksmith_core::{ConsolePresenter, Config, Presenter};

use crate::cli::SearchArgs;

pub fn run(config: &Config, args: SearchArgs) -> Result<i32> {
    let catalog = super::open_catalog(config)?;
    let filter = args.filter.to_filter();

    let records = catalog.search(&filter).context("Search failed")?;
    info!("Found {} tracks", records.len());

    ConsolePresenter::new(args.print.into()).tracks(&records);
    Ok(0)
}
