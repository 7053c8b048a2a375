//! # PACER Offline Sync
//!
//! Durable queue of mutations recorded while the PACER API is unreachable,
//! replayed in order once connectivity returns.
//!
//! ## Architecture
//!
//! - **Store**: key-value persistence with a capacity ceiling ([`LocalStore`])
//! - **Queue**: ordered pending actions under a single store key ([`ActionQueue`])
//! - **Connectivity**: online/offline state and transition events ([`ConnectivityMonitor`])
//! - **Coordinator**: one-at-a-time sequential replay ([`SyncCoordinator`])
//! - **Lock**: one syncing process per workspace ([`SyncLock`])
//! - **Transport**: reqwest dispatcher and health probe ([`HttpDispatcher`], [`HttpProbe`])
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pacer_sync::{PendingAction, SyncConfig, SyncEngine};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SyncConfig {
//!         base_url: "http://localhost:8001/api".to_string(),
//!         ..Default::default()
//!     };
//!
//!     let engine = SyncEngine::new(config).await?;
//!     engine.submit(PendingAction::SaveProgress(json!({ "xp": 120 }))).await?;
//!
//!     let report = engine.sync_now().await;
//!     println!("{}", report.message);
//!     Ok(())
//! }
//! ```

pub mod action;
pub mod cache;
pub mod config;
pub mod connectivity;
pub mod coordinator;
pub mod dispatch;
pub mod engine;
pub mod http;
pub mod lock;
pub mod notice;
pub mod queue;
pub mod store;

pub use action::{ActionKind, PendingAction, QueuedAction};
pub use cache::ReadModelCache;
pub use config::SyncConfig;
pub use connectivity::{Connectivity, ConnectivityChange, ConnectivityMonitor};
pub use coordinator::{SyncCoordinator, SyncReport, SyncSnapshot, SyncStatus};
pub use dispatch::{DispatchError, DispatchTable, Dispatcher, FnDispatcher};
pub use engine::{Submission, SyncEngine};
pub use http::{ApiRequest, HttpDispatcher, HttpProbe};
pub use lock::SyncLock;
pub use notice::{notice_for, Notice, NoticeState, NoticeTracker};
pub use queue::{ActionQueue, PENDING_SYNC_KEY};
pub use store::{FileStore, KeyValueStore, LocalStore, MemoryStore, StorageStatus, StoreError};

/// Common result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur during sync operations
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),
}
