//! Workspace initialization utilities for tests
//!
//! Temp directories laid out the way `pacer init` lays out a workspace:
//! `.pacer/config.toml` plus a `.pacer/store/` directory holding one
//! `<key>.json` file per stored value.

use assert_fs::TempDir;
use std::fs;
use std::path::{Path, PathBuf};

/// Store key of the pending-action queue
pub const QUEUE_KEY: &str = "pacer_pending_sync";

/// Create a temporary directory, removed when the `TempDir` is dropped
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Initialize a PACER workspace in a temp directory
///
/// ```rust
/// use pacer_test_helpers::workspace::init_workspace;
///
/// let workspace = init_workspace();
/// assert!(workspace.path().join(".pacer/store").exists());
/// ```
pub fn init_workspace() -> TempDir {
    let temp = temp_dir();
    fs::create_dir_all(store_dir(temp.path())).expect("Failed to create .pacer/store directory");
    temp
}

/// Workspace whose `.pacer/config.toml` holds `config`
pub fn workspace_with_config(config: &str) -> TempDir {
    let workspace = init_workspace();
    fs::write(workspace.path().join(".pacer/config.toml"), config)
        .expect("Failed to write config.toml");
    workspace
}

/// Workspace whose queue already holds `actions` (raw JSON entries)
///
/// ```rust
/// use pacer_test_helpers::workspace::workspace_with_queue;
///
/// let workspace = workspace_with_queue(&[serde_json::json!({
///     "id": "6f1f2f7e-9d7e-4b8a-9a43-1f0c2d9d8e11",
///     "type": "JOIN_TEAM",
///     "data": { "team_id": 7, "user_id": 3 },
///     "timestamp": "2024-03-01T10:00:00Z"
/// })]);
/// ```
pub fn workspace_with_queue(actions: &[serde_json::Value]) -> TempDir {
    let workspace = init_workspace();
    let body = serde_json::to_string(actions).expect("Failed to serialize queue");
    fs::write(queue_file(workspace.path()), body).expect("Failed to write queue file");
    workspace
}

/// Store directory of a workspace created by these helpers
pub fn store_dir(root: &Path) -> PathBuf {
    root.join(".pacer").join("store")
}

/// File backing the pending-action queue
pub fn queue_file(root: &Path) -> PathBuf {
    store_dir(root).join(format!("{}.json", QUEUE_KEY))
}

/// Parsed queue file contents; empty when the queue was cleared
pub fn read_queue(root: &Path) -> Vec<serde_json::Value> {
    match fs::read_to_string(queue_file(root)) {
        Ok(body) => serde_json::from_str(&body).expect("Queue file is not a JSON array"),
        Err(_) => Vec::new(),
    }
}
