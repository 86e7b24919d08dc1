use std::{env, fmt::Display, str::FromStr};

use thiserror::Error;
use tracing::{info, warn};

use crate::query::NumberParsing;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value `{value}`: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Redis,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(format!("unknown store backend `{other}`, expected memory or redis")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub store_backend: StoreBackend,
    pub redis_url: String,
    pub redis_namespace: String,
    pub api_prefix: String,
    pub number_parsing: NumberParsing,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let strict: bool = try_load("STRICT_QUERY_NUMBERS", "false")?;

        Ok(Self {
            port: try_load("PORT", "5001")?,
            store_backend: try_load("STORE_BACKEND", "redis")?,
            redis_url: try_load("REDIS_URL", "redis://127.0.0.1:6379")?,
            redis_namespace: try_load("REDIS_NAMESPACE", "kennel")?,
            api_prefix: normalize_prefix(&try_load::<String>("API_PREFIX", "")?),
            number_parsing: if strict {
                NumberParsing::Strict
            } else {
                NumberParsing::Lenient
            },
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5001,
            store_backend: StoreBackend::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            redis_namespace: "kennel".to_string(),
            api_prefix: String::new(),
            number_parsing: NumberParsing::Lenient,
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        info!("{key} not set");
    })
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let value = var(key).unwrap_or_else(|_| {
        info!("{key} using default: {default}");
        default.to_string()
    });

    value.parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        ConfigError::Invalid {
            key,
            value: value.clone(),
            reason: e.to_string(),
        }
    })
}

/// `api/v1/` and `/api/v1` both become `/api/v1`; empty stays empty.
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');

    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
