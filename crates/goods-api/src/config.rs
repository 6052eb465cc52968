//! Environment configuration.

use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::time::Duration;

use crate::error::AppError;

const DEFAULT_RELAY_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(100).unwrap();

/// PostgreSQL pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Upper bound of open connections.
    pub max_connections: u32,
    /// Connections kept open while idle.
    pub min_connections: u32,
    /// How long an idle connection may live.
    pub idle_timeout: Duration,
    /// How long any connection may live.
    pub max_lifetime: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 5,
            idle_timeout: Duration::from_secs(60),
            max_lifetime: Duration::from_secs(180),
        }
    }
}

/// Process configuration read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Redis connection string for the list cache.
    pub redis_url: String,
    /// NATS server URL.
    pub nats_url: String,
    /// ClickHouse HTTP endpoint.
    pub clickhouse_url: String,
    /// HTTP bind host.
    pub host: String,
    /// HTTP bind port.
    pub port: u16,
    /// Maximum messages per relay fetch and outbox rows per sweep. Never
    /// zero.
    pub relay_batch_size: NonZeroUsize,
    /// How long in-flight requests may finish after a shutdown signal.
    pub shutdown_grace: Duration,
    /// Pool sizing.
    pub pool: PoolConfig,
}

impl Config {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required variable is missing or a
    /// value does not parse.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required variable is missing or a
    /// value does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let required =
            |key: &str| var(key).ok_or_else(|| AppError::Config(format!("{key} must be set")));

        let database_url = match var("DATABASE_URL") {
            Some(url) => url,
            None => postgres_url(&var)?,
        };

        let clickhouse_url = var("CLICKHOUSE_URL")
            .or_else(|| var("CLICKHOUSE_ADDRESS"))
            .ok_or_else(|| AppError::Config("CLICKHOUSE_URL must be set".into()))?;

        Ok(Self {
            database_url,
            redis_url: required("REDIS_URL")?,
            nats_url: required("NATS_URL")?,
            clickhouse_url,
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&var, "PORT", 8080)?,
            relay_batch_size: parse_or(&var, "RELAY_BATCH_SIZE", DEFAULT_RELAY_BATCH_SIZE)?,
            shutdown_grace: Duration::from_secs(parse_or(&var, "SHUTDOWN_GRACE_SECS", 3)?),
            pool: PoolConfig::default(),
        })
    }

    /// The socket address the HTTP server binds to.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `HOST:PORT` is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }
}

fn postgres_url(var: &impl Fn(&str) -> Option<String>) -> Result<String, AppError> {
    let (Some(user), Some(db)) = (var("POSTGRES_USER"), var("POSTGRES_DB")) else {
        return Err(AppError::Config(
            "DATABASE_URL or POSTGRES_USER and POSTGRES_DB must be set".into(),
        ));
    };
    let password = var("POSTGRES_PASSWORD").unwrap_or_default();
    let host = var("POSTGRES_HOST").unwrap_or_else(|| "localhost".to_string());
    let port = var("POSTGRES_PORT").unwrap_or_else(|| "5432".to_string());
    let ssl_mode = var("POSTGRES_SSL_MODE").unwrap_or_else(|| "disable".to_string());

    Ok(format!(
        "postgres://{user}:{password}@{host}:{port}/{db}?sslmode={ssl_mode}"
    ))
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid: {e}"))),
        None => Ok(default),
    }
}
