pub mod convert;
pub mod search;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracksmith_core::{Catalog, Config, SqliteCatalog};

/// Opens the configured catalog without touching its schema.
pub fn open_catalog(config: &Config) -> Result<Arc<dyn Catalog>> {
    let path = config
        .catalog
        .path
        .as_deref()
        .context("catalog.path is not set")?;
    let catalog = SqliteCatalog::open(path)
        .with_context(|| format!("Failed to open catalog at {}", path.display()))?
        .with_key(config.catalog.key.clone());
    Ok(Arc::new(catalog))
}
