//! Startup configuration: clap entry point, the TOML config file, and
//! tracing/database setup derived from it once at launch.

use alloy::primitives::Address;
use clap::Parser;
use serde::Deserialize;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tracing::Level;
use url::Url;

#[derive(Parser, Debug)]
pub struct Env {
    /// Path to the TOML configuration file
    #[clap(long, env = "FLASHALLIANCE_CONFIG")]
    pub config: PathBuf,
}

/// Settings deserialized from the config TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub database_url: String,
    pub log_level: Option<LogLevel>,
    pub server_port: Option<u16>,
    /// Structured query endpoint of a remote aggregate store. Absent means
    /// "not configured" and the gateway serves direct ledger reads only.
    pub query_endpoint: Option<Url>,
    pub evm: EvmConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvmConfig {
    pub ws_rpc_url: Url,
    pub http_rpc_url: Url,
    pub factory: Address,
    pub token: Address,
    pub faucet: Option<Address>,
    pub deployment_block: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Config {
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level.clone().unwrap_or(LogLevel::Info)
    }

    pub fn server_port(&self) -> u16 {
        self.server_port.unwrap_or(8000)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<&LogLevel> for Level {
    fn from(log_level: &LogLevel) -> Self {
        match log_level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

pub fn setup_tracing(log_level: &LogLevel) {
    let level: Level = log_level.into();
    let default_filter = format!("flashalliance={level}");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

/// SQLite concurrency setup: WAL allows concurrent readers alongside the
/// single ingest writer; the busy timeout keeps a blocked writer from
/// failing immediately when the API happens to hold the lock.
pub async fn configure_sqlite_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let pool = SqlitePool::connect(database_url).await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 10000")
        .execute(&pool)
        .await?;

    Ok(pool)
}
