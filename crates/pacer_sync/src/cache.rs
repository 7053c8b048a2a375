//! Read-model caches kept next to the queue
//!
//! Last known server state for screens that must render offline. Nothing here
//! is ever synced back; the queue is the only write path.

use crate::store::{LocalStore, StoreError};
use serde_json::Value;

pub const USER_PROGRESS_KEY: &str = "pacer_user_progress";
pub const USER_SETTINGS_KEY: &str = "pacer_user_settings";
pub const CACHED_SCENARIOS_KEY: &str = "pacer_cached_scenarios";
pub const CACHED_TEAMS_KEY: &str = "pacer_cached_teams";

const ALL_KEYS: [&str; 4] = [
    USER_PROGRESS_KEY,
    USER_SETTINGS_KEY,
    CACHED_SCENARIOS_KEY,
    CACHED_TEAMS_KEY,
];

#[derive(Debug, Clone)]
pub struct ReadModelCache {
    store: LocalStore,
}

impl ReadModelCache {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    pub fn save_progress(&self, progress: &Value) -> Result<(), StoreError> {
        self.store.save(USER_PROGRESS_KEY, progress)
    }

    pub fn progress(&self) -> Option<Value> {
        self.store.load(USER_PROGRESS_KEY)
    }

    pub fn save_settings(&self, settings: &Value) -> Result<(), StoreError> {
        self.store.save(USER_SETTINGS_KEY, settings)
    }

    pub fn settings(&self) -> Option<Value> {
        self.store.load(USER_SETTINGS_KEY)
    }

    pub fn save_scenarios(&self, scenarios: &[Value]) -> Result<(), StoreError> {
        self.store.save(CACHED_SCENARIOS_KEY, scenarios)
    }

    pub fn scenarios(&self) -> Option<Vec<Value>> {
        self.store.load(CACHED_SCENARIOS_KEY)
    }

    pub fn save_teams(&self, teams: &[Value]) -> Result<(), StoreError> {
        self.store.save(CACHED_TEAMS_KEY, teams)
    }

    pub fn teams(&self) -> Option<Vec<Value>> {
        self.store.load(CACHED_TEAMS_KEY)
    }

    /// Drop every cached read model; the action queue is left alone
    pub fn clear_all(&self) -> Result<(), StoreError> {
        for key in ALL_KEYS {
            self.store.clear(key)?;
        }
        tracing::debug!("Cleared read-model caches");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::PendingAction;
    use crate::queue::ActionQueue;
    use serde_json::json;

    #[test]
    fn test_cache_roundtrip_and_absent() {
        let cache = ReadModelCache::new(LocalStore::in_memory());
        assert!(cache.progress().is_none());
        assert!(cache.teams().is_none());

        cache.save_progress(&json!({ "completed_sessions": 3 })).unwrap();
        cache
            .save_teams(&[json!({ "id": 1, "name": "Closers" })])
            .unwrap();

        assert_eq!(cache.progress(), Some(json!({ "completed_sessions": 3 })));
        assert_eq!(cache.teams().unwrap()[0]["name"], "Closers");
    }

    #[test]
    fn test_clear_all_keeps_queue() {
        let store = LocalStore::in_memory();
        let cache = ReadModelCache::new(store.clone());
        let queue = ActionQueue::new(store);

        cache.save_settings(&json!({ "sound": false })).unwrap();
        cache.save_scenarios(&[json!({ "id": 9 })]).unwrap();
        queue.enqueue(PendingAction::SaveProgress(json!({}))).unwrap();

        cache.clear_all().unwrap();
        assert!(cache.settings().is_none());
        assert!(cache.scenarios().is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_wrong_shape_reads_as_absent() {
        let store = LocalStore::in_memory();
        store.save(CACHED_TEAMS_KEY, &json!({ "not": "a list" })).unwrap();

        let cache = ReadModelCache::new(store);
        assert!(cache.teams().is_none());
    }
}
