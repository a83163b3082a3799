//! Command implementations.

pub mod cache;
pub mod config;
pub mod event;
pub mod process;

use prism_core::store::{LocalCacheStore, LocalErrorLog, LocalObjectStore};
use prism_core::{Config, ImageProcessor};
use std::path::Path;
use std::sync::Arc;

/// Load an explicitly named config file.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        anyhow::bail!(
            "Config file not found: {}\n\n  Hint: Create one with `prism config init`.",
            path.display()
        );
    }
    Ok(Config::load_from(path)?)
}

/// Wire a processor to the local filesystem store under `store.root`.
pub fn local_processor(config: &Config) -> ImageProcessor {
    let root = config.store_root();
    tracing::debug!("Store root: {}", root.display());

    ImageProcessor::new(
        config.clone(),
        Arc::new(LocalObjectStore::new(
            &root,
            config.store.public_base_url.clone(),
        )),
        Arc::new(LocalCacheStore::new(&root)),
        Arc::new(LocalErrorLog::new(&root)),
    )
}
