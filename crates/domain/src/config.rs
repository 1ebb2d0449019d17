//! Explicit, environment-driven configuration for each binary.
//!
//! Each binary loads exactly the variables it needs into an explicit struct
//! at startup; nothing reads the environment after bootstrap.

use std::env;
use std::time::Duration;

use thiserror::Error;

/// Default impression-dedup window when `DEDUP_WINDOW_SECS` is unset.
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(60);

/// Default pause between settlement sweeps when `SETTLEMENT_INTERVAL_SECS`
/// is unset.
pub const DEFAULT_SETTLEMENT_INTERVAL: Duration = Duration::from_secs(3600);

/// Everything the API binary needs at startup: listener targets, the shared
/// database, and the dedup window. Settlement-only variables stay out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    database_url: String,
    api_bind_address: String,
    api_unix_socket: Option<String>,
    internal_bind_address: Option<String>,
    internal_unix_socket: Option<String>,
    dedup_window: Duration,
}

impl ApiConfig {
    /// Hydrates `.env` and reads the API binary's variables.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        hydrate_env_file()?;

        Ok(Self {
            database_url: get_required_var("DATABASE_URL")?,
            api_bind_address: get_required_var("API_BIND_ADDRESS")?,
            api_unix_socket: get_optional_var("API_UNIX_SOCKET"),
            internal_bind_address: get_optional_var("API_INTERNAL_BIND_ADDRESS"),
            internal_unix_socket: get_optional_var("API_INTERNAL_UNIX_SOCKET"),
            dedup_window: get_duration_var("DEDUP_WINDOW_SECS", DEFAULT_DEDUP_WINDOW)?,
        })
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn api_bind_address(&self) -> &str {
        &self.api_bind_address
    }

    pub fn api_unix_socket(&self) -> Option<&str> {
        self.api_unix_socket.as_deref()
    }

    pub fn internal_bind_address(&self) -> Option<&str> {
        self.internal_bind_address.as_deref()
    }

    pub fn internal_unix_socket(&self) -> Option<&str> {
        self.internal_unix_socket.as_deref()
    }

    pub fn has_internal_listener(&self) -> bool {
        self.internal_bind_address.is_some() || self.internal_unix_socket.is_some()
    }

    /// Window inside which repeat impressions from one identity are collapsed.
    pub fn dedup_window(&self) -> Duration {
        self.dedup_window
    }
}

/// Configuration for the settlement worker binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementConfig {
    database_url: String,
    sweep_interval: Duration,
}

impl SettlementConfig {
    /// Hydrates `.env` and reads the settlement worker's variables. Missing
    /// or malformed entries surface as `ConfigError` rather than panicking.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        hydrate_env_file()?;

        Ok(Self {
            database_url: get_required_var("DATABASE_URL")?,
            sweep_interval: get_duration_var(
                "SETTLEMENT_INTERVAL_SECS",
                DEFAULT_SETTLEMENT_INTERVAL,
            )?,
        })
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }
}

// Whitespace-only values count as unset so a sloppy `VAR=` line in `.env`
// behaves like a missing variable.
fn get_optional_var(key: &'static str) -> Option<String> {
    let raw = env::var(key).ok()?;
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn get_required_var(key: &'static str) -> Result<String, ConfigError> {
    get_optional_var(key).ok_or(ConfigError::MissingVar { key })
}

fn get_duration_var(key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    let Some(raw) = get_optional_var(key) else {
        return Ok(default);
    };
    let secs = raw
        .parse::<u64>()
        .map_err(|source| ConfigError::InvalidNumber { key, source })?;
    Ok(Duration::from_secs(secs))
}

/// Applies a `.env` file to the process environment. A missing file is fine;
/// a present-but-unreadable one is not. `WHISTLE_ADS_SKIP_DOTENV` bypasses
/// the file entirely (tests set it to stay hermetic).
pub fn hydrate_env_file() -> Result<(), ConfigError> {
    if env::var_os("WHISTLE_ADS_SKIP_DOTENV").is_some() {
        return Ok(());
    }
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(ConfigError::Dotenv { source: err }),
    }
}

/// Failure modes of `.env` hydration and environment parsing.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable `{key}`")]
    MissingVar { key: &'static str },
    #[error("invalid integer in `{key}`: {source}")]
    InvalidNumber {
        key: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to load .env file: {source}")]
    Dotenv {
        #[from]
        source: dotenvy::Error,
    },
}
