//! Configuration for the sync engine

use pacer_config::Config;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the sync engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// API base URL, e.g. `http://localhost:8001/api`
    pub base_url: String,

    /// Bearer token sent with every request
    pub auth_token: Option<String>,

    /// Per-request timeout (default: 30 seconds)
    pub request_timeout: Duration,

    /// Extra attempts for network-level failures
    pub retries: u32,

    /// Base retry delay; attempt `n` waits `n * retry_delay`
    pub retry_delay: Duration,

    /// Path appended to `base_url` for reachability checks
    pub health_path: String,

    /// Directory of the file store
    pub store_dir: PathBuf,

    /// Lock file taken around every sync pass, `None` for in-process only
    pub lock_path: Option<PathBuf>,

    /// Store ceiling in bytes, `None` for unbounded
    pub capacity_bytes: Option<u64>,

    /// Sync on every offline -> online transition
    pub auto_sync: bool,

    /// Probe interval (default: 15 seconds)
    pub probe_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001/api".to_string(),
            auth_token: None,
            request_timeout: Duration::from_secs(30),
            retries: 3,
            retry_delay: Duration::from_secs(1),
            health_path: "/health".to_string(),
            store_dir: PathBuf::from(".pacer/store"),
            lock_path: None,
            capacity_bytes: Some(crate::store::DEFAULT_CAPACITY_BYTES),
            auto_sync: true,
            probe_interval: Duration::from_secs(15),
        }
    }
}

impl From<&Config> for SyncConfig {
    fn from(config: &Config) -> Self {
        Self {
            base_url: config.api.base_url.clone(),
            auth_token: config.api.token.clone(),
            request_timeout: Duration::from_secs(config.api.timeout_secs),
            retries: config.api.retries,
            retry_delay: Duration::from_millis(config.api.retry_delay_ms),
            health_path: config.api.health_path.clone(),
            store_dir: config.store_dir(),
            lock_path: Some(config.lock_path()),
            // 0 disables the ceiling
            capacity_bytes: match config.storage.capacity_kb {
                0 => None,
                kb => Some(kb * 1024),
            },
            auto_sync: config.sync.auto_sync,
            probe_interval: Duration::from_secs(config.sync.probe_interval_secs),
        }
    }
}

impl SyncConfig {
    /// Full URL for an API path such as `/progress`
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn health_url(&self) -> String {
        self.endpoint(&self.health_path)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            anyhow::bail!("base_url must start with http:// or https://");
        }
        if self.request_timeout.is_zero() {
            anyhow::bail!("request timeout must be greater than zero");
        }
        if self.probe_interval.is_zero() {
            anyhow::bail!("probe interval must be greater than zero");
        }
        if self.auth_token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            anyhow::bail!("auth token cannot be blank");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_default_is_valid() {
        assert!(SyncConfig::default().validate().is_ok());
    }

    #[test]
    fn test_from_workspace_config() {
        let mut config = Config::with_root(Path::new("/srv/pacer"));
        config.api.retry_delay_ms = 250;
        config.storage.capacity_kb = 1;
        config.api.token = Some("t0k".to_string());

        let sync = SyncConfig::from(&config);
        assert_eq!(sync.retry_delay, Duration::from_millis(250));
        assert_eq!(sync.capacity_bytes, Some(1024));
        assert_eq!(sync.store_dir, PathBuf::from("/srv/pacer/.pacer/store"));
        assert_eq!(sync.lock_path, Some(PathBuf::from("/srv/pacer/.pacer/sync.lock")));
        assert_eq!(sync.auth_token.as_deref(), Some("t0k"));
    }

    #[test]
    fn test_zero_capacity_is_unbounded() {
        let mut config = Config::with_root(Path::new("/tmp"));
        config.storage.capacity_kb = 0;
        assert_eq!(SyncConfig::from(&config).capacity_bytes, None);
    }

    #[test]
    fn test_endpoint_joining() {
        let config = SyncConfig {
            base_url: "http://api.test/api/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.endpoint("/progress"), "http://api.test/api/progress");
        assert_eq!(config.endpoint("team/teams/3/join"), "http://api.test/api/team/teams/3/join");
        assert_eq!(config.health_url(), "http://api.test/api/health");
    }

    #[test]
    fn test_validation_errors() {
        let ws = SyncConfig {
            base_url: "ws://localhost".to_string(),
            ..Default::default()
        };
        assert!(ws.validate().is_err());

        let blank = SyncConfig {
            auth_token: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(blank.validate().is_err());

        let no_timeout = SyncConfig {
            request_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(no_timeout.validate().is_err());
    }
}
