//! Configuration management.
//!
//! Configuration is loaded from multiple sources with the following priority:
//!
//! 1. Environment variables (`EXAM_*`, `__` separates nested keys)
//! 2. Project file (`./exam.toml`)
//! 3. User file (`~/.config/exam/config.toml`)
//! 4. System file (`/etc/exam/config.toml`)
//! 5. Default values
//!
//! ## Example Configuration File
//!
//! ```toml
//! [reactor]
//! strategy = "per_suite"
//! invoke_timeout_secs = 120
//!
//! [[environments]]
//! id = "native"
//! kind = "native"
//!
//! [[environments]]
//! id = "karaf"
//! kind = "karaf"
//! invoker = "junit"
//! options = { "karaf.version" = "4.4.6" }
//!
//! [logging]
//! level = "debug"
//! ```

use crate::environment::EnvironmentConfig;
use crate::error::{ReactorError, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "EXAM_";

/// Project-local configuration file name.
pub const PROJECT_CONFIG_FILE: &str = "exam.toml";

/// Exam configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExamConfig {
    /// Reactor settings.
    pub reactor: ReactorConfig,
    /// Environments used by test classes that configure none.
    pub environments: Vec<EnvironmentConfig>,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl ExamConfig {
    /// Loads configuration from files and environment.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> std::result::Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(system_config_path()))
            .merge(Toml::file(user_config_path()))
            .merge(Toml::file(PROJECT_CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
    }

    /// Loads configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: impl AsRef<Path>) -> std::result::Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
    }

    /// Validates the default environments.
    ///
    /// # Errors
    ///
    /// Returns a configuration error on an invalid or duplicate id.
    pub fn validate(&self) -> Result<()> {
        validate_environments(&self.environments)
    }
}

/// Checks that environment ids are valid and unique.
///
/// # Errors
///
/// Returns a configuration error on an invalid or duplicate id.
pub fn validate_environments(environments: &[EnvironmentConfig]) -> Result<()> {
    let mut seen = HashSet::new();
    for environment in environments {
        environment.validate()?;
        if !seen.insert(environment.id.as_str()) {
            return Err(ReactorError::config(format!(
                "environment {} is configured twice",
                environment.id
            )));
        }
    }
    Ok(())
}

/// How often environments are re-provisioned during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactorStrategy {
    /// A fresh environment for every test method.
    PerMethod,
    /// Environments shared by the methods of one test class.
    #[default]
    PerClass,
    /// Environments shared by the whole suite.
    PerSuite,
}

impl ReactorStrategy {
    /// Returns whether a staged reactor may be reused across
    /// `prepare_reactor` calls.
    #[must_use]
    pub const fn allows_reuse(self) -> bool {
        matches!(self, Self::PerClass | Self::PerSuite)
    }
}

impl fmt::Display for ReactorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerMethod => write!(f, "per_method"),
            Self::PerClass => write!(f, "per_class"),
            Self::PerSuite => write!(f, "per_suite"),
        }
    }
}

impl FromStr for ReactorStrategy {
    type Err = ReactorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "per_method" | "permethod" => Ok(Self::PerMethod),
            "per_class" | "perclass" => Ok(Self::PerClass),
            "per_suite" | "persuite" => Ok(Self::PerSuite),
            other => Err(ReactorError::config(format!(
                "unknown reactor strategy '{other}'"
            ))),
        }
    }
}

/// Reactor settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactorConfig {
    /// Reactor strategy.
    pub strategy: ReactorStrategy,
    /// Invocation timeout used when neither the handle nor the environment
    /// sets one.
    pub invoke_timeout_secs: Option<u64>,
}

impl ReactorConfig {
    /// Returns the default invocation timeout.
    #[must_use]
    pub fn invoke_timeout(&self) -> Option<Duration> {
        self.invoke_timeout_secs.map(Duration::from_secs)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("exam")
        .join("config.toml")
}

fn system_config_path() -> PathBuf {
    PathBuf::from("/etc/exam/config.toml")
}
