//! Net service configuration.
//!
//! Configuration is loaded from environment variables. The database URL and
//! the media transport secret are redacted in Debug output.

use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default HTTP/WebSocket bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

/// Default cap on simultaneous speaking roles per net.
pub const DEFAULT_MAX_SPEAKERS: u32 = 10;

/// Default database pool size. SQLite has a single writer.
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 1;

/// Default media credential lifetime (6 hours).
pub const DEFAULT_MEDIA_TOKEN_TTL_SECONDS: u64 = 21_600;

/// Media transport issuer settings. Present only when the API key,
/// secret, and URL are all configured.
#[derive(Clone)]
pub struct MediaTransportConfig {
    pub api_key: String,
    pub api_secret: SecretString,
    pub url: String,
    pub token_ttl_seconds: u64,
}

impl fmt::Debug for MediaTransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTransportConfig")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("url", &self.url)
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .finish()
    }
}

/// Net service configuration.
#[derive(Clone)]
pub struct Config {
    /// SQLite connection URL.
    pub database_url: String,

    /// Server bind address (default: "0.0.0.0:3000").
    pub bind_address: String,

    /// Maximum active participants holding a speaking role in one net.
    pub max_speakers: u32,

    /// Database pool size.
    pub db_max_connections: u32,

    /// Seconds to wait after a shutdown signal before exiting.
    pub drain_seconds: u64,

    /// Emit JSON-formatted logs.
    pub log_json: bool,

    /// Media transport issuer, `None` when audio is unsupported.
    pub media: Option<MediaTransportConfig>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("max_speakers", &self.max_speakers)
            .field("db_max_connections", &self.db_max_connections)
            .field("drain_seconds", &self.drain_seconds)
            .field("log_json", &self.log_json)
            .field("media", &self.media)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?
            .clone();

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let max_speakers = parse_positive(vars, "NET_MAX_SPEAKERS", DEFAULT_MAX_SPEAKERS)?;
        let db_max_connections =
            parse_positive(vars, "NET_DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?;

        let drain_seconds = match vars.get("NET_DRAIN_SECONDS") {
            Some(value) => value.parse().map_err(|e| ConfigError::InvalidValue {
                name: "NET_DRAIN_SECONDS".to_string(),
                reason: format!("expected a non-negative integer, got '{value}': {e}"),
            })?,
            None => 0,
        };

        let log_json = vars
            .get("NET_LOG_JSON")
            .is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1");

        let media = media_from_vars(vars)?;

        Ok(Self {
            database_url,
            bind_address,
            max_speakers,
            db_max_connections,
            drain_seconds,
            log_json,
            media,
        })
    }
}

fn parse_positive(
    vars: &HashMap<String, String>,
    name: &str,
    default: u32,
) -> Result<u32, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u32 = value_str.parse().map_err(|e| ConfigError::InvalidValue {
        name: name.to_string(),
        reason: format!("expected a positive integer, got '{value_str}': {e}"),
    })?;

    if value == 0 {
        return Err(ConfigError::InvalidValue {
            name: name.to_string(),
            reason: "must be greater than 0".to_string(),
        });
    }

    Ok(value)
}

/// Blank values count as unset.
fn media_from_vars(
    vars: &HashMap<String, String>,
) -> Result<Option<MediaTransportConfig>, ConfigError> {
    let non_empty = |name: &str| vars.get(name).filter(|v| !v.trim().is_empty()).cloned();

    let (Some(api_key), Some(api_secret), Some(url)) = (
        non_empty("LIVEKIT_API_KEY"),
        non_empty("LIVEKIT_API_SECRET"),
        non_empty("LIVEKIT_URL"),
    ) else {
        return Ok(None);
    };

    let token_ttl_seconds = match vars.get("LIVEKIT_TOKEN_TTL_SECONDS") {
        Some(value) => {
            let ttl: u64 = value.parse().map_err(|e| ConfigError::InvalidValue {
                name: "LIVEKIT_TOKEN_TTL_SECONDS".to_string(),
                reason: format!("expected a positive integer, got '{value}': {e}"),
            })?;
            if ttl == 0 {
                return Err(ConfigError::InvalidValue {
                    name: "LIVEKIT_TOKEN_TTL_SECONDS".to_string(),
                    reason: "must be greater than 0".to_string(),
                });
            }
            ttl
        }
        None => DEFAULT_MEDIA_TOKEN_TTL_SECONDS,
    };

    Ok(Some(MediaTransportConfig {
        api_key,
        api_secret: SecretString::from(api_secret),
        url,
        token_ttl_seconds,
    }))
}
