use serde::{Deserialize, Serialize};
use anyhow::{Result, Context};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use chrono::{DateTime, Utc};
use tracing::{info, debug};

use crate::device::Fingerprint;
use crate::pool::WorkerPool;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub fingerprint: FingerprintConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub pool: PoolConfig,

    // Written by `haviwa bind`, checked by `haviwa verify`
    pub binding: Option<BindingConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FingerprintConfig {
    pub query_timeout_secs: u64,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self { query_timeout_secs: 3 }
    }
}

impl FingerprintConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    pub capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { capacity: 16 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BindingConfig {
    pub fingerprint: Fingerprint,
    pub first_seen: DateTime<Utc>,
}

/// Outcome of comparing a fresh fingerprint with the stored binding.
#[derive(Debug, Clone, PartialEq)]
pub enum BindingStatus {
    Unbound,
    Matches(BindingConfig),
    Mismatch { expected: Fingerprint },
}

impl Config {
    /// Loads the config file, falling back to defaults when it does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No configuration at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let config_str = fs::read_to_string(path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&config_str)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// `$HAVIWA_CONFIG`, or `~/.haviwa/config.toml`.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("HAVIWA_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".haviwa")
            .join("config.toml")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let config_str = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        fs::write(path, config_str)
            .context("Failed to write config file")?;

        info!("✅ Configuration saved to: {:?}", path);
        Ok(())
    }

    /// Records `fingerprint` as this installation's machine.
    pub fn bind(&mut self, fingerprint: Fingerprint) -> &BindingConfig {
        self.binding.insert(BindingConfig {
            fingerprint,
            first_seen: Utc::now(),
        })
    }

    /// Pool sized by `[pool] capacity` for `total` jobs.
    pub fn worker_pool(&self, total: usize) -> WorkerPool {
        WorkerPool::new(self.pool.capacity, total)
    }

    pub fn verify(&self, current: &Fingerprint) -> BindingStatus {
        match &self.binding {
            None => BindingStatus::Unbound,
            Some(binding) if &binding.fingerprint == current => BindingStatus::Matches(binding.clone()),
            Some(binding) => BindingStatus::Mismatch {
                expected: binding.fingerprint.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::compute;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.fingerprint.query_timeout(), Duration::from_secs(3));
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(config.pool.capacity, 16);
        assert!(config.binding.is_none());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[fingerprint]\nquery_timeout_secs = 10\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.fingerprint.query_timeout_secs, 10);
        assert_eq!(config.http.timeout_secs, 30);
    }

    #[tokio::test]
    async fn pool_capacity_limits_concurrent_jobs() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[pool]\ncapacity = 2\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        let pool = config.worker_pool(8);
        assert_eq!(pool.available(), 2);

        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let permit = pool.acquire().await;
            let running = running.clone();
            let peak = peak.clone();
            tokio::spawn(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                drop(permit);
            });
        }

        pool.wait().await;
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn invalid_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[fingerprint\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn binding_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let fp = compute(["a", "b", "c"], true, true);

        let mut config = Config::default();
        config.bind(fp.clone());
        config.save(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.binding, config.binding);
        assert!(matches!(loaded.verify(&fp), BindingStatus::Matches(_)));
    }

    #[test]
    fn verify_reports_mismatch_and_unbound() {
        let bound = compute(["a", "b", "c"], true, true);
        let other = compute(["x", "y", "z"], true, true);

        let mut config = Config::default();
        assert_eq!(config.verify(&bound), BindingStatus::Unbound);

        config.bind(bound.clone());
        assert_eq!(config.verify(&other), BindingStatus::Mismatch { expected: bound });
    }
}
