//! Runtime configuration loaded from the environment.
//!
//! `.env` is honoured through `dotenvy`. Every setting has a default, so an
//! empty environment yields a working in-memory server on port 3000.

use std::str::FromStr;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_APP_NAME: &str = "pagegate";
const DEFAULT_ASSET_VERSION: &str = "1";
const DEFAULT_SESSION_TTL_SECS: i64 = 86_400;
const DEFAULT_SESSION_SWEEP_SECS: u64 = 600;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Postgres URL. `None` selects the in-memory stores.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Title of the HTML shell.
    pub app_name: String,
    /// Inertia asset version; clients holding another version get a 409.
    pub asset_version: String,
    pub session_ttl: time::Duration,
    pub session_sweep: std::time::Duration,
    pub cookie_secure: bool,
    /// Enables `POST /api/dev/session`.
    pub dev_auth_bypass: bool,
}

impl Config {
    /// Load from the process environment (after reading `.env`, if present).
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let session_ttl_secs: i64 = parse_or(&lookup, "SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?;
        if session_ttl_secs <= 0 {
            return Err(ConfigError::Invalid { key: "SESSION_TTL_SECS", value: session_ttl_secs.to_string() });
        }
        let session_sweep_secs: u64 = parse_or(&lookup, "SESSION_SWEEP_SECS", DEFAULT_SESSION_SWEEP_SECS)?;
        if session_sweep_secs == 0 {
            return Err(ConfigError::Invalid { key: "SESSION_SWEEP_SECS", value: "0".into() });
        }

        Ok(Self {
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
            app_name: lookup("APP_NAME").unwrap_or_else(|| DEFAULT_APP_NAME.into()),
            asset_version: lookup("INERTIA_VERSION").unwrap_or_else(|| DEFAULT_ASSET_VERSION.into()),
            session_ttl: time::Duration::seconds(session_ttl_secs),
            session_sweep: std::time::Duration::from_secs(session_sweep_secs),
            cookie_secure: bool_or(&lookup, "COOKIE_SECURE", false)?,
            dev_auth_bypass: bool_or(&lookup, "DEV_AUTH_BYPASS", false)?,
        })
    }

    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

/// Parse a boolean flag: `1/true/yes/on` or `0/false/no/off`, case-insensitive.
pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

fn bool_or(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid { key, value: raw }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
