//! Worker configuration loaded from the process environment.

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_WORKER_ID: &str = "worker-1";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 30;
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{var} has invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Credentials and model selection for the report generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// `None` keeps the worker running; jobs then fail with a
    /// missing-credentials error.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub worker_id: String,
    pub poll_interval: Duration,
    pub max_attempts: u32,
    pub generator: GeneratorConfig,
    pub shutdown_grace: Duration,
    pub stale_lock_after: Option<Duration>,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let poll_interval_ms = parse_or(
            "POLL_INTERVAL_MS",
            get("POLL_INTERVAL_MS"),
            DEFAULT_POLL_INTERVAL_MS,
        )?;
        if poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                var: "POLL_INTERVAL_MS",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let max_attempts = parse_or("MAX_ATTEMPTS", get("MAX_ATTEMPTS"), DEFAULT_MAX_ATTEMPTS)?;
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "MAX_ATTEMPTS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let generation_timeout_secs = parse_or(
            "GENERATION_TIMEOUT_SECS",
            get("GENERATION_TIMEOUT_SECS"),
            DEFAULT_GENERATION_TIMEOUT_SECS,
        )?;
        if generation_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "GENERATION_TIMEOUT_SECS",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let shutdown_grace_secs = parse_or(
            "SHUTDOWN_GRACE_SECS",
            get("SHUTDOWN_GRACE_SECS"),
            DEFAULT_SHUTDOWN_GRACE_SECS,
        )?;

        let stale_lock_after = match get("STALE_LOCK_SECS") {
            Some(raw) => Some(Duration::from_secs(parse("STALE_LOCK_SECS", &raw)?)),
            None => None,
        };

        let database_max_connections = parse_or(
            "DATABASE_MAX_CONNECTIONS",
            get("DATABASE_MAX_CONNECTIONS"),
            DEFAULT_DATABASE_MAX_CONNECTIONS,
        )?;

        Ok(Self {
            database_url,
            database_max_connections,
            worker_id: get("WORKER_ID").unwrap_or_else(|| DEFAULT_WORKER_ID.to_string()),
            poll_interval: Duration::from_millis(poll_interval_ms),
            max_attempts,
            generator: GeneratorConfig {
                api_key: get("OPENAI_API_KEY"),
                model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
                base_url: get("OPENAI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
                timeout: Duration::from_secs(generation_timeout_secs),
            },
            shutdown_grace: Duration::from_secs(shutdown_grace_secs),
            stale_lock_after,
        })
    }
}

fn parse<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn parse_or<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => parse(var, &raw),
        None => Ok(default),
    }
}
