//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables. Nested keys
//! use a double underscore, e.g. `SESSION__DURATION_MINUTES`.
//!
//! See [`OidcConfig`] for identity provider configuration.

use axum_extra::extract::cookie::Key;
use config::ConfigError;
use latchkey_identity::OidcConfig;
use serde::Deserialize;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Externally visible base URL, used to build provider callback URIs.
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// Directory served under `/public`.
    #[serde(default = "default_public_dir")]
    pub public_dir: String,

    /// PostgreSQL connection URL. Without one, accounts and sessions are
    /// kept in memory and lost on restart.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Session configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// OIDC authentication configuration.
    pub oidc: OidcConfig,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_public_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_public_dir() -> String {
    "public".to_string()
}

/// Session-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Session duration in minutes.
    #[serde(default = "default_session_duration_minutes")]
    pub duration_minutes: i64,

    /// Interval between session cleanup runs, in seconds.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Defaults to true for production safety; set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,

    /// Secret used to sign cookies, at least 64 bytes.
    /// When unset a random key is generated, and sessions do not survive a restart.
    #[serde(default)]
    pub secret: Option<String>,
}

/// Longest accepted session lifetime: one year.
const MAX_SESSION_DURATION_MINUTES: i64 = 366 * 24 * 60;

fn default_session_duration_minutes() -> i64 {
    24 * 60
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

fn default_secure_cookies() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_minutes: default_session_duration_minutes(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
            secure_cookies: default_secure_cookies(),
            secret: None,
        }
    }
}

impl SessionConfig {
    /// Returns the session lifetime.
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.duration_minutes)
    }

    /// Returns the cookie max-age matching the session lifetime.
    #[must_use]
    pub fn cookie_max_age(&self) -> time::Duration {
        time::Duration::minutes(self.duration_minutes)
    }

    /// Checks that the lifetimes are usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the session duration is not between one minute and
    /// one year, or the cleanup interval is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_SESSION_DURATION_MINUTES).contains(&self.duration_minutes) {
            return Err(ConfigError::Message(format!(
                "SESSION__DURATION_MINUTES must be between 1 and {MAX_SESSION_DURATION_MINUTES}, got {}",
                self.duration_minutes
            )));
        }
        if self.cleanup_interval_seconds == 0 {
            return Err(ConfigError::Message(
                "SESSION__CLEANUP_INTERVAL_SECONDS must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the key used to sign cookies.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured secret is shorter than 64 bytes.
    pub fn cookie_key(&self) -> Result<Key, ConfigError> {
        match &self.secret {
            Some(secret) => Key::try_from(secret.as_bytes()).map_err(|_| {
                ConfigError::Message("SESSION__SECRET must be at least 64 bytes".to_string())
            }),
            None => Ok(Key::generate()),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: Self = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.session.validate()?;
        Ok(config)
    }
}
