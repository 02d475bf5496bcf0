use std::time::Duration;

use thiserror::Error;
use tracing::Level;

use crate::retry::RetryPolicy;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set in the environment or .env file")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini: GeminiConfig,
    pub bind_addr: String,
    pub comment_retry: RetryPolicy,
    pub max_upload_bytes: usize,
    pub log_level: Level,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup, so tests need not touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("GEMINI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::Missing("GEMINI_API_KEY"))?;

        let model = lookup("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_url = lookup("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string());

        let timeout_secs: u64 = parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 60)?;
        let max_attempts: u32 = parse_or(&lookup, "COMMENT_MAX_ATTEMPTS", 5)?;
        let base_delay_ms: u64 = parse_or(&lookup, "COMMENT_BASE_DELAY_MS", 1000)?;
        let max_upload_bytes: usize = parse_or(&lookup, "MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?;
        let log_level: Level = parse_or(&lookup, "LOG_LEVEL", Level::INFO)?;

        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "COMMENT_MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        Ok(Config {
            gemini: GeminiConfig {
                api_key,
                model,
                base_url,
                request_timeout: Duration::from_secs(timeout_secs),
            },
            bind_addr,
            comment_retry: RetryPolicy::new(max_attempts, Duration::from_millis(base_delay_ms)),
            max_upload_bytes,
            log_level,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let config = Config::from_lookup(lookup_from(&[("GEMINI_API_KEY", "secret")])).unwrap();

        assert_eq!(config.gemini.api_key, "secret");
        assert_eq!(config.gemini.model, DEFAULT_MODEL);
        assert_eq!(config.gemini.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.gemini.request_timeout, Duration::from_secs(60));
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.comment_retry.max_attempts, 5);
        assert_eq!(config.comment_retry.base_delay, Duration::from_secs(1));
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn overrides_are_read() {
        let config = Config::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "secret"),
            ("GEMINI_MODEL", "gemini-2.5-flash"),
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("COMMENT_MAX_ATTEMPTS", "3"),
            ("COMMENT_BASE_DELAY_MS", "250"),
            ("LOG_LEVEL", "debug"),
        ]))
        .unwrap();

        assert_eq!(config.gemini.model, "gemini-2.5-flash");
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.comment_retry.max_attempts, 3);
        assert_eq!(config.comment_retry.base_delay, Duration::from_millis(250));
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    fn missing_key_is_reported() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("GEMINI_API_KEY"));

        let err = Config::from_lookup(lookup_from(&[("GEMINI_API_KEY", "  ")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("GEMINI_API_KEY"));
    }

    #[test]
    fn bad_numbers_are_errors() {
        let err = Config::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "secret"),
            ("REQUEST_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "REQUEST_TIMEOUT_SECS",
                ..
            }
        ));

        let err = Config::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "secret"),
            ("COMMENT_MAX_ATTEMPTS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
