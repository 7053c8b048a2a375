//! Pending action queue
//!
//! The whole queue is one JSON array stored under [`PENDING_SYNC_KEY`]. Every
//! mutation loads the list, changes it and writes it back whole, so readers
//! always see the last complete write.

use crate::action::{PendingAction, QueuedAction};
use crate::store::{LocalStore, StoreError};
use uuid::Uuid;

/// Store key holding the queue
pub const PENDING_SYNC_KEY: &str = "pacer_pending_sync";

/// Ordered list of actions waiting for replay
#[derive(Debug, Clone)]
pub struct ActionQueue {
    store: LocalStore,
}

impl ActionQueue {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Record `action` at the end of the queue
    ///
    /// The entry is durable once this returns `Ok`. A stored queue that
    /// cannot be parsed is left in place and reported instead of replaced.
    pub fn enqueue(&self, action: PendingAction) -> Result<QueuedAction, StoreError> {
        let entry = QueuedAction::new(action);

        let mut actions = self.try_list()?;
        actions.push(entry.clone());
        self.store.save(PENDING_SYNC_KEY, &actions)?;

        tracing::debug!(
            "Queued {} ({}), {} pending",
            entry.kind(),
            entry.id,
            actions.len()
        );
        Ok(entry)
    }

    /// Queued actions in replay order, or the reason the stored queue is unreadable
    ///
    /// Never writes. Entries stored without an id (by the web client) get one
    /// derived from their timestamp and position, so it stays the same until
    /// the next write persists it.
    pub fn try_list(&self) -> Result<Vec<QueuedAction>, StoreError> {
        let mut actions: Vec<QueuedAction> =
            self.store.try_load(PENDING_SYNC_KEY)?.unwrap_or_default();

        for (position, action) in actions.iter_mut().enumerate() {
            if action.id.is_nil() {
                action.id = derived_id(action, position);
            }
        }
        Ok(actions)
    }

    /// Queued actions in replay order; an unreadable queue lists as empty
    pub fn list(&self) -> Vec<QueuedAction> {
        self.try_list().unwrap_or_else(|e| {
            tracing::warn!("Pending actions unreadable: {}", e);
            Vec::new()
        })
    }

    pub fn len(&self) -> usize {
        self.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every queued action, readable or not
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.clear(PENDING_SYNC_KEY)?;
        tracing::info!("Cleared pending actions");
        Ok(())
    }

    /// Overwrite the queue with `actions`; an empty list removes the key
    ///
    /// Refuses to overwrite a stored queue that cannot be parsed.
    pub fn replace_all(&self, actions: &[QueuedAction]) -> Result<(), StoreError> {
        self.try_list()?;
        if actions.is_empty() {
            self.store.clear(PENDING_SYNC_KEY)
        } else {
            self.store.save(PENDING_SYNC_KEY, actions)
        }
    }

    /// Remove a single action by id, returning it if it was queued
    pub fn remove(&self, id: Uuid) -> Result<Option<QueuedAction>, StoreError> {
        let mut actions = self.try_list()?;
        let Some(pos) = actions.iter().position(|a| a.id == id) else {
            return Ok(None);
        };

        let removed = actions.remove(pos);
        self.replace_all(&actions)?;
        tracing::info!("Dropped {} ({})", removed.kind(), removed.id);
        Ok(Some(removed))
    }
}

/// Stable id for an entry stored without one
fn derived_id(action: &QueuedAction, position: usize) -> Uuid {
    let millis = action.timestamp.timestamp_millis() as u64 as u128;
    Uuid::from_u128((millis << 64) | position as u128)
}
