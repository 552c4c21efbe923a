//! Acceptance client configuration.
//!
//! Read from the `[acceptance]` table of the exam configuration file, with
//! `EXAM_ACCEPTANCE__*` environment overrides:
//!
//! ```toml
//! [acceptance.session]
//! host = "localhost"
//! port = 8181
//! retries = 10
//!
//! [acceptance.client]
//! user = "karaf"
//! password = "karaf"
//! ```

use crate::error::{AcceptanceError, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix, shared with the reactor configuration.
pub const ENV_PREFIX: &str = "EXAM_";

/// Configuration table name.
const SECTION: &str = "acceptance";

/// Attempts made per configured retry.
pub const ATTEMPTS_PER_RETRY: u32 = 3;

/// Where the system under test listens and how patiently to wait for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSpec {
    /// Host name.
    pub host: String,
    /// Port.
    pub port: u16,
    /// Retry count. Each retry allows three attempts.
    pub retries: u32,
    /// Pause between attempts in milliseconds.
    pub backoff_ms: u64,
}

impl Default for SessionSpec {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8181,
            retries: 10,
            backoff_ms: 200,
        }
    }
}

impl SessionSpec {
    /// Returns the number of attempts `get_with_retry` may make. At least
    /// one request is always sent.
    #[must_use]
    pub const fn attempt_budget(&self) -> u32 {
        let budget = self.retries.saturating_mul(ATTEMPTS_PER_RETRY);
        if budget == 0 { 1 } else { budget }
    }

    /// Returns the pause between attempts.
    #[must_use]
    pub const fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    /// Returns the base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Validates the session.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty host or a zero retry
    /// count.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(AcceptanceError::config("session host is empty"));
        }
        if self.retries == 0 {
            return Err(AcceptanceError::config("session retries must be at least 1"));
        }
        Ok(())
    }
}

/// Credentials applied to every request as basic auth.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfiguration {
    /// User name.
    pub user: Option<String>,
    /// Password.
    pub password: Option<String>,
}

impl ClientConfiguration {
    /// Creates credentials.
    #[must_use]
    pub fn basic(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            password: Some(password.into()),
        }
    }
}

impl fmt::Debug for ClientConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfiguration")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// The `[acceptance]` configuration table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceptanceConfig {
    /// Session settings.
    pub session: SessionSpec,
    /// Credentials.
    pub client: ClientConfiguration,
}

impl AcceptanceConfig {
    /// Loads the table from the project file and environment.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed.
    pub fn load() -> std::result::Result<Self, figment::Error> {
        Self::load_from("exam.toml")
    }

    /// Loads the table from a specific file and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed.
    pub fn load_from(path: impl AsRef<Path>) -> std::result::Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::default(SECTION, Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract_inner(SECTION)
    }
}
