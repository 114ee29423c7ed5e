use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

use crate::query::QueryPolicy;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_retry() -> u32 {
    1
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

fn default_gc_time_ms() -> u64 {
    5 * 60 * 1_000
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Defaults applied to every subscription before a view overrides them.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct QueryDefaultsConfig {
    #[serde(default = "default_retry")]
    pub retry: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default)]
    pub stale_time_ms: u64,
    #[serde(default = "default_gc_time_ms")]
    pub gc_time_ms: u64,
}

impl Default for QueryDefaultsConfig {
    fn default() -> Self {
        QueryDefaultsConfig {
            retry: default_retry(),
            retry_delay_ms: default_retry_delay_ms(),
            stale_time_ms: 0,
            gc_time_ms: default_gc_time_ms(),
        }
    }
}

impl QueryDefaultsConfig {
    pub fn to_policy(&self) -> QueryPolicy {
        QueryPolicy::default()
            .retry(self.retry, Duration::from_millis(self.retry_delay_ms))
            .stale_time(Duration::from_millis(self.stale_time_ms))
            .gc_time(Duration::from_millis(self.gc_time_ms))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub query: QueryDefaultsConfig,
}

impl AppConfig {
    /// Loads the config at the default location, falling back to built-in
    /// defaults when no file has been created yet.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "stockdash", "stockdash")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
