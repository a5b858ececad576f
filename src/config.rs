use serde::{Deserialize, Serialize};

/// Main configuration for the Tapfolio core.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

/// Object-storage bucket layout.
///
/// Anonymous visitors upload into a private bucket; claimed cards serve
/// their media from the public bucket.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Bucket holding publicly served card media.
    #[serde(default = "default_public_bucket")]
    pub public_bucket: String,
    /// Private bucket holding media uploaded by anonymous visitors.
    #[serde(default = "default_anon_bucket")]
    pub anon_bucket: String,
}

/// Configuration for the trial cleanup sweep.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CleanupConfig {
    /// Enable the periodic sweep.
    #[serde(default = "default_cleanup_enabled")]
    pub enabled: bool,
    /// Seconds between sweeps.
    #[serde(default = "default_cleanup_interval_secs")]
    pub interval_secs: u64,
    /// Seconds to wait after process start before the first sweep.
    #[serde(default = "default_cleanup_initial_delay_secs")]
    pub initial_delay_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            cleanup: CleanupConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            public_bucket: default_public_bucket(),
            anon_bucket: default_anon_bucket(),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: default_cleanup_enabled(),
            interval_secs: default_cleanup_interval_secs(),
            initial_delay_secs: default_cleanup_initial_delay_secs(),
        }
    }
}

impl Config {
    /// Load configuration from `TAPFOLIO_`-prefixed environment variables,
    /// falling back to defaults for anything unset.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(bucket) = get_env("STORAGE_PUBLIC_BUCKET") {
            config.storage.public_bucket = bucket;
        }
        if let Some(bucket) = get_env("STORAGE_ANON_BUCKET") {
            config.storage.anon_bucket = bucket;
        }
        if let Some(enabled) = get_env("CLEANUP_ENABLED") {
            config.cleanup.enabled = enabled.parse().unwrap_or(true);
        }
        if let Some(interval) = get_env("CLEANUP_INTERVAL_SECS") {
            if let Ok(secs) = interval.parse() {
                config.cleanup.interval_secs = secs;
            }
        }
        if let Some(delay) = get_env("CLEANUP_INITIAL_DELAY_SECS") {
            if let Ok(secs) = delay.parse() {
                config.cleanup.initial_delay_secs = secs;
            }
        }

        config
    }
}

fn get_env(key: &str) -> Option<String> {
    std::env::var(format!("TAPFOLIO_{key}")).ok()
}

fn default_public_bucket() -> String {
    "tapfolio-public".to_string()
}

fn default_anon_bucket() -> String {
    "tapfolio-anon".to_string()
}

fn default_cleanup_enabled() -> bool {
    true
}

fn default_cleanup_interval_secs() -> u64 {
    6 * 60 * 60 // every 6 hours
}

fn default_cleanup_initial_delay_secs() -> u64 {
    30
}
