//! Sync coordinator
//!
//! Drains the action queue through a [`Dispatcher`] while online. Actions are
//! replayed one at a time in enqueue order; a later action may depend on an
//! earlier one (JOIN_TEAM before LEAVE_TEAM for the same team).
//!
//! Only one pass runs at a time. The in-flight flag is taken before the pass
//! starts and released when the guard drops, whatever path the pass exits by.

use crate::action::QueuedAction;
use crate::connectivity::ConnectivityMonitor;
use crate::dispatch::Dispatcher;
use crate::queue::ActionQueue;
use crate::store::StoreError;
use pacer_common::sanitizer::LogSanitizer;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

/// How a sync pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Every queued action was attempted
    Completed,
    /// Offline; the queue was not touched
    Postponed,
    /// The queue was empty
    NothingToSync,
    /// Another pass holds the in-flight guard
    AlreadyRunning,
}

/// Structured result of [`SyncCoordinator::process_pending_actions`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub status: SyncStatus,
    pub success: bool,
    pub message: String,
    pub synced_count: usize,
    pub failed_count: usize,
    /// Queue length after the pass is zero
    pub queue_empty: bool,
    /// The post-pass queue was written back
    pub persisted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_error: Option<String>,
}

impl SyncReport {
    fn postponed(pending: usize) -> Self {
        Self {
            status: SyncStatus::Postponed,
            success: false,
            message: "Offline mode detected, sync postponed".to_string(),
            synced_count: 0,
            failed_count: 0,
            queue_empty: pending == 0,
            persisted: true,
            storage_error: None,
        }
    }

    fn nothing_to_sync() -> Self {
        Self {
            status: SyncStatus::NothingToSync,
            success: true,
            message: "No pending actions to sync".to_string(),
            synced_count: 0,
            failed_count: 0,
            queue_empty: true,
            persisted: true,
            storage_error: None,
        }
    }

    fn not_started(message: &str, error: String) -> Self {
        Self {
            status: SyncStatus::Postponed,
            success: false,
            message: message.to_string(),
            synced_count: 0,
            failed_count: 0,
            queue_empty: false,
            persisted: false,
            storage_error: Some(error),
        }
    }

    /// Report for a pass that could not read the stored queue
    pub fn unreadable(error: &StoreError) -> Self {
        Self::not_started("Pending actions could not be read, sync postponed", error.to_string())
    }

    /// Report for a pass that could not open the sync lock file
    pub fn lock_unavailable(error: &std::io::Error) -> Self {
        Self::not_started("Sync lock unavailable, sync postponed", error.to_string())
    }

    /// Report for a pass refused because another one holds the guard
    pub fn already_running(pending: usize) -> Self {
        Self {
            status: SyncStatus::AlreadyRunning,
            success: false,
            message: "Sync already in progress".to_string(),
            synced_count: 0,
            failed_count: 0,
            queue_empty: pending == 0,
            persisted: true,
            storage_error: None,
        }
    }

    fn completed(synced: usize, failed: usize, remaining: usize, write: Result<(), StoreError>) -> Self {
        let message = if failed == 0 {
            format!("Successfully synced {} actions", synced)
        } else {
            format!("Synced {} actions, {} failed", synced, failed)
        };

        Self {
            status: SyncStatus::Completed,
            success: failed == 0 || synced > 0,
            message,
            synced_count: synced,
            failed_count: failed,
            queue_empty: remaining == 0,
            persisted: write.is_ok(),
            storage_error: write.err().map(|e| e.to_string()),
        }
    }
}

/// Point-in-time view for a notification surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncSnapshot {
    pub online: bool,
    pub pending: usize,
    pub syncing: bool,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Replays queued actions and keeps the failures
pub struct SyncCoordinator {
    queue: ActionQueue,
    connectivity: ConnectivityMonitor,
    in_flight: AtomicBool,
    sanitizer: LogSanitizer,
}

impl SyncCoordinator {
    pub fn new(queue: ActionQueue, connectivity: ConnectivityMonitor) -> Self {
        Self {
            queue,
            connectivity,
            in_flight: AtomicBool::new(false),
            sanitizer: LogSanitizer::new(),
        }
    }

    pub fn queue(&self) -> &ActionQueue {
        &self.queue
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            online: self.connectivity.is_online(),
            pending: self.pending_count(),
            syncing: self.is_syncing(),
        }
    }

    /// Run one sync pass over the current queue snapshot
    ///
    /// Never fails as a whole: offline, empty queue, overlap and per-action
    /// failures all come back as a [`SyncReport`].
    pub async fn process_pending_actions(&self, dispatcher: &dyn Dispatcher) -> SyncReport {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            tracing::debug!("Sync pass skipped, another pass is running");
            return SyncReport::already_running(self.pending_count());
        };

        if !self.connectivity.is_online() {
            tracing::info!("Offline, sync postponed");
            return SyncReport::postponed(self.pending_count());
        }

        let pending = match self.queue.try_list() {
            Ok(pending) => pending,
            Err(e) => {
                tracing::error!("Cannot sync, {}", e);
                return SyncReport::unreadable(&e);
            }
        };
        if pending.is_empty() {
            return SyncReport::nothing_to_sync();
        }

        tracing::info!("Syncing {} pending actions", pending.len());
        let snapshot_ids: HashSet<_> = pending.iter().map(|a| a.id).collect();

        let mut synced = 0;
        let mut retained: Vec<QueuedAction> = Vec::new();
        for action in pending {
            match dispatcher.dispatch(&action).await {
                Ok(()) => {
                    synced += 1;
                    tracing::debug!("Synced {} ({})", action.kind(), action.id);
                }
                Err(e) => {
                    let reason = self.sanitizer.sanitize(&e.to_string());
                    tracing::warn!("Failed to sync {} ({}): {}", action.kind(), action.id, reason);
                    retained.push(action.with_error(reason));
                }
            }
        }
        let failed = retained.len();

        // Actions enqueued while the pass was awaiting stay behind the failures
        retained.extend(
            self.queue
                .list()
                .into_iter()
                .filter(|a| !snapshot_ids.contains(&a.id)),
        );

        let write = self.queue.replace_all(&retained);
        if let Err(e) = &write {
            tracing::error!("Failed to persist queue after sync: {}", e);
        }

        let report = SyncReport::completed(synced, failed, retained.len(), write);
        tracing::info!("{}", report.message);
        report
    }
}
