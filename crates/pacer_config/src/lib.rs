//! Configuration management for the PACER offline client
//!
//! This crate handles loading `.pacer/config.toml`

use pacer_common::{PacerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory holding config, queue and lock files, relative to the workspace root
pub const PACER_DIR: &str = ".pacer";

/// Environment variable overriding `[api].base_url`
pub const ENV_API_URL: &str = "PACER_API_URL";

/// Environment variable overriding `[api].token`
pub const ENV_TOKEN: &str = "PACER_TOKEN";

/// Template written by `pacer init`
pub const DEFAULT_CONFIG_TOML: &str = r#"# PACER offline client configuration

[api]
base_url = "http://localhost:8001/api"
timeout_secs = 30
retries = 3
retry_delay_ms = 1000
health_path = "/health"

[storage]
dir = ".pacer/store"
capacity_kb = 5120

[sync]
auto_sync = true
probe_interval_secs = 15
"#;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Workspace root (set programmatically, not in TOML)
    #[serde(skip)]
    pub root: PathBuf,

    /// Remote API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Local store settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Sync behaviour
    #[serde(default)]
    pub sync: SyncSettings,
}

/// Remote API configuration ([api])
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra attempts for network-level failures of a single request
    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Path probed to decide whether the API is reachable
    #[serde(default = "default_health_path")]
    pub health_path: String,

    /// Bearer token; usually supplied through `PACER_TOKEN` instead
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:8001/api".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    1000
}
fn default_health_path() -> String {
    "/health".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            health_path: default_health_path(),
            token: None,
        }
    }
}

/// Local store configuration ([storage])
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Store directory, relative to the workspace root unless absolute
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,

    /// Capacity ceiling of the store, in KiB
    #[serde(default = "default_capacity_kb")]
    pub capacity_kb: u64,
}

fn default_store_dir() -> PathBuf {
    PathBuf::from(".pacer/store")
}
fn default_capacity_kb() -> u64 {
    5 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
            capacity_kb: default_capacity_kb(),
        }
    }
}

/// Sync configuration ([sync])
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Run a sync pass on every offline -> online transition
    #[serde(default = "default_true")]
    pub auto_sync: bool,

    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_probe_interval() -> u64 {
    15
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            auto_sync: true,
            probe_interval_secs: default_probe_interval(),
        }
    }
}

impl Config {
    /// Default configuration rooted at `workspace_root`
    pub fn with_root(workspace_root: &Path) -> Self {
        Self {
            root: workspace_root.to_path_buf(),
            api: ApiConfig::default(),
            storage: StorageConfig::default(),
            sync: SyncSettings::default(),
        }
    }

    /// Load configuration from workspace root, then apply env overrides
    pub fn load(workspace_root: &Path) -> Result<Self> {
        let mut config = Self::load_file(workspace_root)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load `.pacer/config.toml` only; a missing file yields defaults
    pub fn load_file(workspace_root: &Path) -> Result<Self> {
        let config_path = Self::config_path(workspace_root);

        if !config_path.exists() {
            tracing::debug!("No config at {}, using defaults", config_path.display());
            return Ok(Self::with_root(workspace_root));
        }

        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| PacerError::ConfigError(format!("Failed to read config: {}", e)))?;

        let mut config: Config = toml::from_str(&content)
            .map_err(|e| PacerError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.root = workspace_root.to_path_buf();
        Ok(config)
    }

    /// Path of the config file for a workspace root
    pub fn config_path(workspace_root: &Path) -> PathBuf {
        workspace_root.join(PACER_DIR).join("config.toml")
    }

    /// Apply `PACER_API_URL` / `PACER_TOKEN` style overrides from `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
            self.api.base_url = url;
        }
        if let Some(token) = lookup(ENV_TOKEN).filter(|v| !v.is_empty()) {
            self.api.token = Some(token);
        }
    }

    /// Absolute store directory
    pub fn store_dir(&self) -> PathBuf {
        if self.storage.dir.is_absolute() {
            self.storage.dir.clone()
        } else {
            self.root.join(&self.storage.dir)
        }
    }

    /// Lock file serializing `pacer sync` across processes
    pub fn lock_path(&self) -> PathBuf {
        self.root.join(PACER_DIR).join("sync.lock")
    }
}
