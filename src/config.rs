use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::job::DEFAULT_OUTPUT_FORMAT;

const DEFAULT_APP_NAME: &str = "Audio Extraction Service";
const DEFAULT_ENVIRONMENT: &str = "development";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_LOG_DIR: &str = "./logs";
const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Process settings, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub app_name: String,
    pub app_version: String,
    pub environment: String,
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub log_dir: String,
    pub default_output_format: String,
    pub max_concurrency: usize,
    /// Per-record limit on the extraction operation.
    pub extract_timeout: Option<Duration>,
    /// Deadline for a whole batch request.
    pub request_timeout: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: DEFAULT_ENVIRONMENT.to_string(),
            host: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_dir: DEFAULT_LOG_DIR.to_string(),
            default_output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            extract_timeout: None,
            request_timeout: None,
        }
    }
}

impl Settings {
    /// Reads settings from the process environment, falling back to `.env`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).or_else(|_| dotenv::var(key)).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let defaults = Self::default();

        Ok(Self {
            app_name: get("APP_NAME").unwrap_or(defaults.app_name),
            app_version: get("APP_VERSION").unwrap_or(defaults.app_version),
            environment: get("ENVIRONMENT").unwrap_or(defaults.environment),
            host: parse_or("HOST", get("HOST"), defaults.host)?,
            port: parse_or("PORT", get("PORT"), defaults.port)?,
            log_level: get("LOG_LEVEL")
                .map(|level| level.to_lowercase())
                .unwrap_or(defaults.log_level),
            log_dir: get("LOG_DIR").unwrap_or(defaults.log_dir),
            default_output_format: get("DEFAULT_OUTPUT_FORMAT")
                .map(|format| format.to_lowercase())
                .unwrap_or(defaults.default_output_format),
            max_concurrency: parse_or("MAX_CONCURRENCY", get("MAX_CONCURRENCY"), defaults.max_concurrency)?
                .max(1),
            extract_timeout: parse_secs("EXTRACT_TIMEOUT_SECS", get("EXTRACT_TIMEOUT_SECS"))?,
            request_timeout: parse_secs("REQUEST_TIMEOUT_SECS", get("REQUEST_TIMEOUT_SECS"))?,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

fn parse_secs(key: &str, value: Option<String>) -> Result<Option<Duration>> {
    let Some(raw) = value else {
        return Ok(None);
    };
    let secs: u64 = raw
        .parse()
        .with_context(|| format!("invalid value for {}: {:?}", key, raw))?;
    // zero disables the limit
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}
