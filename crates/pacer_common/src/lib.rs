//! Common types and errors for the PACER offline client
//!
//! This crate provides the shared error type, exit codes and logging setup
//! used across all PACER components.

pub mod sanitizer;
pub mod telemetry;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core error types for PACER operations
#[derive(Error, Debug)]
pub enum PacerError {
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Sync already in progress")]
    SyncInProgress,

    #[error("Resource locked by another process: {path}")]
    Locked { path: String },

    #[error("Invalid input: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Severity of a user-facing status message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Warning,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, PacerError>;

/// Exit code constants for the `pacer` binary
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_CONFIG_ERROR: i32 = 101;
/// Returned by `pacer sync` when some actions stayed in the queue
pub const EXIT_PARTIAL_SYNC: i32 = 3;
