//! Subcommand implementations

pub mod queue;
pub mod sync;

use pacer_config::Config;
use pacer_sync::{ActionQueue, FileStore, LocalStore, SyncConfig};
use std::sync::Arc;

/// Configuration of the workspace in the current directory
pub fn load_config() -> anyhow::Result<Config> {
    let cwd = std::env::current_dir()?;
    Ok(Config::load(&cwd)?)
}

/// File-backed store configured for the workspace
pub fn open_store(config: &SyncConfig) -> LocalStore {
    let backend = FileStore::new(&config.store_dir).with_capacity(config.capacity_bytes);
    LocalStore::new(Arc::new(backend))
}

pub fn open_queue(config: &SyncConfig) -> ActionQueue {
    ActionQueue::new(open_store(config))
}
