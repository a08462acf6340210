//! Configuration management
//!
//! Read once at startup from the environment (with `.env` support), or from
//! a JSON file with per-environment sections when `CONFIG_PATH` is set.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::db::DbConfig;
use crate::worker::{WorkerPoolConfig, DEFAULT_CONCURRENCY, DEFAULT_IDLE_DELAY_MS};

// ============================================================================
// Defaults
// ============================================================================

/// Default REST bind address.
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:8080";

/// Default tenant route file.
pub const DEFAULT_TENANT_MAP_PATH: &str = "tenant_map.json";

/// Default shutdown grace period in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default maximum connections in the central pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum connections in the central pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 0;

/// Default pool acquire timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default idle timeout in seconds (30 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 1800;

/// Default connection lifetime in seconds (1 hour).
pub const DEFAULT_DATABASE_MAX_LIFETIME_SECS: u64 = 3600;

/// Environment section used when `CONFIG_ENV` is unset.
pub const DEFAULT_CONFIG_ENV: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub worker: WorkerConfig,
    pub tenant_map_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub rest_addr: String,
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub concurrency: usize,
    /// 0 selects the parser default.
    pub batch_size: usize,
    pub poll_interval_ms: u64,
}

/// One section of a JSON config file. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ConfigSection {
    app_db_dsn: Option<String>,
    rest_addr: Option<String>,
    tenant_map_path: Option<String>,
    worker_concurrency: Option<i64>,
    parse_batch_size: Option<i64>,
    worker_poll_interval_ms: Option<u64>,
    shutdown_timeout_secs: Option<u64>,
    database_max_connections: Option<u32>,
    database_min_connections: Option<u32>,
    database_connect_timeout_secs: Option<u64>,
    database_idle_timeout_secs: Option<u64>,
    database_max_lifetime_secs: Option<u64>,
}

impl Config {
    /// Load from `CONFIG_PATH` when set, otherwise from the environment.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        if let Ok(path) = std::env::var("CONFIG_PATH") {
            let env = std::env::var("CONFIG_ENV").unwrap_or_else(|_| DEFAULT_CONFIG_ENV.to_string());
            return Self::from_json_file(&path, &env);
        }

        Self::from_env()
    }

    /// Build from environment variables alone. `APP_DB_DSN` is required.
    pub fn from_env() -> anyhow::Result<Self> {
        let url = std::env::var("APP_DB_DSN")
            .ok()
            .filter(|dsn| !dsn.trim().is_empty())
            .context("APP_DB_DSN is required")?;

        let config = Config {
            server: ServerConfig {
                rest_addr: std::env::var("REST_ADDR")
                    .ok()
                    .filter(|addr| !addr.is_empty())
                    .unwrap_or_else(|| DEFAULT_REST_ADDR.to_string()),
                shutdown_timeout_secs: env_or("SHUTDOWN_TIMEOUT_SECS", DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            },
            database: DatabaseConfig {
                url,
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", DEFAULT_DATABASE_MAX_CONNECTIONS),
                min_connections: env_or("DATABASE_MIN_CONNECTIONS", DEFAULT_DATABASE_MIN_CONNECTIONS),
                connect_timeout_secs: env_or(
                    "DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                ),
                idle_timeout_secs: env_or("DATABASE_IDLE_TIMEOUT", DEFAULT_DATABASE_IDLE_TIMEOUT_SECS),
                max_lifetime_secs: env_or("DATABASE_MAX_LIFETIME", DEFAULT_DATABASE_MAX_LIFETIME_SECS),
            },
            worker: WorkerConfig {
                concurrency: concurrency_or_default(
                    std::env::var("WORKER_CONCURRENCY")
                        .ok()
                        .and_then(|s| s.trim().parse().ok()),
                ),
                batch_size: batch_size_or_default(
                    std::env::var("PARSE_BATCH_SIZE")
                        .ok()
                        .and_then(|s| s.trim().parse().ok()),
                ),
                poll_interval_ms: env_or("WORKER_POLL_INTERVAL_MS", DEFAULT_IDLE_DELAY_MS),
            },
            tenant_map_path: std::env::var("TENANT_MAP_PATH")
                .or_else(|_| std::env::var("CUSTOMER_MAP_PATH"))
                .unwrap_or_else(|_| DEFAULT_TENANT_MAP_PATH.to_string()),
        };

        config.validate()?;

        Ok(config)
    }

    /// Build from a JSON file. Sections are either top-level
    /// (`{"default": {..}, "docker": {..}}`) or nested under
    /// `"environments"`. The `env` section overrides `default`, which
    /// overrides the built-in defaults.
    pub fn from_json_file(path: impl AsRef<Path>, env: &str) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let document: Value = ferry_common::files::load_json_file(path)?;

        let sections = document.get("environments").unwrap_or(&document);
        let section = |name: &str| -> anyhow::Result<ConfigSection> {
            match sections.get(name) {
                Some(value) => serde_json::from_value(value.clone())
                    .with_context(|| format!("invalid '{}' section in {}", name, path.display())),
                None => Ok(ConfigSection::default()),
            }
        };

        let base = section(DEFAULT_CONFIG_ENV)?;
        if env != DEFAULT_CONFIG_ENV && sections.get(env).is_none() {
            anyhow::bail!("environment '{}' not found in {}", env, path.display());
        }
        let merged = base.overlay(section(env)?);

        let url = merged
            .app_db_dsn
            .filter(|dsn| !dsn.trim().is_empty())
            .with_context(|| format!("app_db_dsn is required in {}", path.display()))?;

        let config = Config {
            server: ServerConfig {
                rest_addr: merged
                    .rest_addr
                    .unwrap_or_else(|| DEFAULT_REST_ADDR.to_string()),
                shutdown_timeout_secs: merged
                    .shutdown_timeout_secs
                    .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            },
            database: DatabaseConfig {
                url,
                max_connections: merged
                    .database_max_connections
                    .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS),
                min_connections: merged
                    .database_min_connections
                    .unwrap_or(DEFAULT_DATABASE_MIN_CONNECTIONS),
                connect_timeout_secs: merged
                    .database_connect_timeout_secs
                    .unwrap_or(DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS),
                idle_timeout_secs: merged
                    .database_idle_timeout_secs
                    .unwrap_or(DEFAULT_DATABASE_IDLE_TIMEOUT_SECS),
                max_lifetime_secs: merged
                    .database_max_lifetime_secs
                    .unwrap_or(DEFAULT_DATABASE_MAX_LIFETIME_SECS),
            },
            worker: WorkerConfig {
                concurrency: concurrency_or_default(merged.worker_concurrency),
                batch_size: batch_size_or_default(merged.parse_batch_size),
                poll_interval_ms: merged
                    .worker_poll_interval_ms
                    .unwrap_or(DEFAULT_IDLE_DELAY_MS),
            },
            tenant_map_path: merged
                .tenant_map_path
                .unwrap_or_else(|| DEFAULT_TENANT_MAP_PATH.to_string()),
        };

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database.url.trim().is_empty() {
            anyhow::bail!("Database DSN cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.worker.concurrency == 0 {
            anyhow::bail!("Worker concurrency must be greater than 0");
        }

        if self.server.rest_addr.is_empty() {
            anyhow::bail!("REST address cannot be empty");
        }

        Ok(())
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            url: self.database.url.clone(),
            max_connections: self.database.max_connections,
            min_connections: self.database.min_connections,
            connect_timeout_secs: self.database.connect_timeout_secs,
            idle_timeout_secs: Some(self.database.idle_timeout_secs),
            max_lifetime_secs: Some(self.database.max_lifetime_secs),
        }
    }

    pub fn pool_config(&self) -> WorkerPoolConfig {
        WorkerPoolConfig::default()
            .with_concurrency(self.worker.concurrency)
            .with_idle_delay(Duration::from_millis(self.worker.poll_interval_ms))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}

impl ConfigSection {
    fn overlay(self, other: ConfigSection) -> ConfigSection {
        ConfigSection {
            app_db_dsn: other.app_db_dsn.or(self.app_db_dsn),
            rest_addr: other.rest_addr.or(self.rest_addr),
            tenant_map_path: other.tenant_map_path.or(self.tenant_map_path),
            worker_concurrency: other.worker_concurrency.or(self.worker_concurrency),
            parse_batch_size: other.parse_batch_size.or(self.parse_batch_size),
            worker_poll_interval_ms: other
                .worker_poll_interval_ms
                .or(self.worker_poll_interval_ms),
            shutdown_timeout_secs: other.shutdown_timeout_secs.or(self.shutdown_timeout_secs),
            database_max_connections: other
                .database_max_connections
                .or(self.database_max_connections),
            database_min_connections: other
                .database_min_connections
                .or(self.database_min_connections),
            database_connect_timeout_secs: other
                .database_connect_timeout_secs
                .or(self.database_connect_timeout_secs),
            database_idle_timeout_secs: other
                .database_idle_timeout_secs
                .or(self.database_idle_timeout_secs),
            database_max_lifetime_secs: other
                .database_max_lifetime_secs
                .or(self.database_max_lifetime_secs),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Non-positive or missing concurrency falls back to the default.
fn concurrency_or_default(value: Option<i64>) -> usize {
    value
        .filter(|n| *n > 0)
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(DEFAULT_CONCURRENCY)
}

/// Negative or missing batch sizes mean "use the parser default".
fn batch_size_or_default(value: Option<i64>) -> usize {
    value
        .filter(|n| *n >= 0)
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0)
}
