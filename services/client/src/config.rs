//! services/client/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_API_URL: &str = "http://localhost:5001";
pub const DEFAULT_STORY_MODEL: &str = "qwen3:8b";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_url: String,
    pub session_path: Option<PathBuf>,
    pub log_level: Level,
    pub story_model: String,
    pub request_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            session_path: None,
            log_level: Level::INFO,
            story_model: DEFAULT_STORY_MODEL.to_string(),
            request_timeout: None,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- Backend ---
        let api_url = lookup("API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue(
                "API_URL".to_string(),
                format!("'{}' is not an http(s) URL", api_url),
            ));
        }
        let api_url = api_url.trim_end_matches('/').to_string();

        let request_timeout = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw.parse::<u64>().map_err(|e| {
                    ConfigError::InvalidValue("REQUEST_TIMEOUT_SECS".to_string(), e.to_string())
                })?;
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        let story_model =
            lookup("STORY_MODEL").unwrap_or_else(|| DEFAULT_STORY_MODEL.to_string());

        // --- Local settings ---
        let session_path = lookup("SESSION_PATH").map(PathBuf::from);

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            api_url,
            session_path,
            log_level,
            story_model,
            request_timeout,
        })
    }
}
