use std::time::Duration;

use bannerhub_db_postgres::PostgresConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub deletion: DeletionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Checks cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.storage.backend == StorageBackend::Postgres {
            validate_postgres(&self.storage.postgres)?;
        }
        if self.redis.enabled {
            if self.redis.url.is_empty() {
                return Err("redis.enabled=true requires redis.url".into());
            }
            if self.redis.pool_size == 0 {
                return Err("redis.pool_size must be > 0".into());
            }
        }
        if self.cache.ttl_secs == 0 {
            return Err("cache.ttl_secs must be > 0".into());
        }
        self.deletion.validate()?;

        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }
}

fn validate_postgres(pg: &PostgresConfig) -> Result<(), String> {
    if pg.url.is_empty() {
        return Err("storage.postgres.url must not be empty".into());
    }
    if pg.pool_size == 0 {
        return Err("storage.postgres.pool_size must be > 0".into());
    }
    if pg.connect_timeout_ms == 0 {
        return Err("storage.postgres.connect_timeout_ms must be > 0".into());
    }
    if pg.min_connections.is_some_and(|min| min > pg.pool_size) {
        return Err("storage.postgres.min_connections must not exceed pool_size".into());
    }
    if pg.max_lifetime_secs == Some(0) {
        return Err("storage.postgres.max_lifetime_secs must be > 0".into());
    }
    Ok(())
}

/// Which relational store backs the service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Pool settings, passed to the PostgreSQL backend unchanged.
    #[serde(default)]
    pub postgres: PostgresConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Use Redis as the shared cache; the local map is used otherwise.
    #[serde(default)]
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".into()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

/// What the resolver does when the cache backend fails.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicyKind {
    /// Fail the read.
    #[default]
    FailClosed,
    /// Log and read from the store.
    FailOpen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL for cached active-banner snapshots in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,

    #[serde(default)]
    pub failure_policy: FailurePolicyKind,
}

fn default_cache_ttl_secs() -> u64 {
    300 // 5 minutes
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            failure_policy: FailurePolicyKind::default(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionConfig {
    /// Capacity of the enqueue channel and initial capacity of the batch buffer
    #[serde(default = "default_buffer_length")]
    pub buffer_length: usize,

    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,

    /// How long `stop` waits for the final flush
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_buffer_length() -> usize {
    5
}
fn default_flush_interval_secs() -> u64 {
    10
}
fn default_shutdown_timeout_secs() -> u64 {
    30
}

impl Default for DeletionConfig {
    fn default() -> Self {
        Self {
            buffer_length: default_buffer_length(),
            flush_interval_secs: default_flush_interval_secs(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl DeletionConfig {
    /// Rejects values the worker cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.buffer_length == 0 {
            return Err("deletion.buffer_length must be > 0".into());
        }
        if self.flush_interval_secs == 0 {
            return Err("deletion.flush_interval_secs must be > 0".into());
        }
        if self.shutdown_timeout_secs == 0 {
            return Err("deletion.shutdown_timeout_secs must be > 0".into());
        }
        Ok(())
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default configuration file looked up in the working directory.
    pub const DEFAULT_CONFIG_PATH: &str = "bannerhub.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        let mut builder = Config::builder();
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., BANNERHUB__CACHE__TTL_SECS=60
        builder = builder.add_source(
            Environment::with_prefix("BANNERHUB")
                .prefix_separator("__")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.storage.backend, StorageBackend::Postgres);
        assert_eq!(cfg.cache.ttl(), Duration::from_secs(300));
        assert_eq!(cfg.cache.failure_policy, FailurePolicyKind::FailClosed);
        assert_eq!(cfg.deletion.buffer_length, 5);
        assert_eq!(cfg.deletion.flush_interval(), Duration::from_secs(10));
        assert_eq!(cfg.deletion.shutdown_timeout(), Duration::from_secs(30));
        assert!(!cfg.redis.enabled);
    }

    #[test]
    fn test_zero_buffer_length_rejected() {
        let mut cfg = AppConfig::default();
        cfg.deletion.buffer_length = 0;
        assert_eq!(
            cfg.validate().unwrap_err(),
            "deletion.buffer_length must be > 0"
        );
    }

    #[test]
    fn test_zero_intervals_rejected() {
        let mut cfg = AppConfig::default();
        cfg.deletion.flush_interval_secs = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.cache.ttl_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_pool_size_only_checked_for_postgres() {
        let mut cfg = AppConfig::default();
        cfg.storage.postgres.pool_size = 0;
        assert!(cfg.validate().is_err());

        cfg.storage.backend = StorageBackend::Memory;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let mut cfg = AppConfig::default();
        cfg.logging.level = "verbose".into();
        assert!(cfg.validate().is_err());
        cfg.logging.level = "DEBUG".into();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_postgres_pool_bounds() {
        let mut cfg = AppConfig::default();
        cfg.storage.postgres.pool_size = 4;
        cfg.storage.postgres.min_connections = Some(4);
        cfg.storage.postgres.max_lifetime_secs = Some(900);
        assert!(cfg.validate().is_ok());

        cfg.storage.postgres.min_connections = Some(5);
        assert_eq!(
            cfg.validate().unwrap_err(),
            "storage.postgres.min_connections must not exceed pool_size"
        );

        cfg.storage.postgres.min_connections = None;
        cfg.storage.postgres.max_lifetime_secs = Some(0);
        assert!(cfg.validate().is_err());
    }
}
