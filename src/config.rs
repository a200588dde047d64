//! Application configuration, loaded from `psyrs.toml` merged with
//! `PSYRS_`-prefixed environment variables.
//!
//! This generalizes the source's `psygo/config/config.go`, which loaded a
//! single TOML file into a package-level `Conf` behind a CLI `-conf` flag.
//! Here there's no implicit global: callers build an [`AppConfig`] and pass
//! it where it's needed.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Worker pool sizing knobs, mirroring [`crate::pool::PoolConfig`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolSettings {
    pub capacity: usize,
    pub expiry_secs: u64,
    pub non_blocking: bool,
    pub max_blocking_tasks: usize,
    pub pre_alloc: bool,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self { capacity: 256, expiry_secs: 10, non_blocking: false, max_blocking_tasks: 0, pre_alloc: false }
    }
}

/// Registry TTL and listen address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistrySettings {
    pub timeout_secs: u64,
    pub listen_addr: String,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self { timeout_secs: 300, listen_addr: "127.0.0.1:9999".to_string() }
    }
}

/// Default circuit breaker policy, applied when a call site doesn't
/// override it explicitly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BreakerSettings {
    pub max_requests: u32,
    pub interval_secs: u64,
    pub timeout_secs: u64,
    pub consecutive_failure_threshold: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self { max_requests: 2, interval_secs: 0, timeout_secs: 10, consecutive_failure_threshold: 5 }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub pool: PoolSettings,
    #[serde(default)]
    pub registry: RegistrySettings,
    #[serde(default)]
    pub breaker: BreakerSettings,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}

impl AppConfig {
    /// Load configuration from `path` (if it exists) merged with
    /// environment variables prefixed `PSYRS_` (double-underscore separated
    /// for nested keys, e.g. `PSYRS_POOL__CAPACITY=64`), falling back to
    /// built-in defaults for anything unset.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("PSYRS_").split("__"))
            .extract()
    }
}

impl BreakerSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RegistrySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PoolSettings {
    pub fn expiry(&self) -> Duration {
        Duration::from_secs(self.expiry_secs)
    }
}
