//! Error types for reactor operations.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Boxed error produced by external collaborators (containers, channels).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for reactor operations.
pub type Result<T> = std::result::Result<T, ReactorError>;

/// Errors that can occur while preparing, staging or invoking a reactor.
#[derive(Debug, Error)]
pub enum ReactorError {
    /// Bad or missing test or environment metadata.
    ///
    /// Raised before any environment is touched and never retryable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// One or more environments failed to provision.
    #[error("staging failed: {0}")]
    Staging(#[from] StagingFailure),

    /// Address not present in the staged reactor or in the test directory.
    ///
    /// Always a programming error; retrying cannot fix it.
    #[error("unknown target: {0}")]
    UnknownTarget(String),

    /// A test method failed or could not be executed inside its container.
    #[error("remote invocation of {address} failed: {cause}")]
    RemoteInvocation {
        /// Identifier of the invoked address.
        address: String,
        /// What went wrong on the remote side.
        #[source]
        cause: RemoteCause,
    },

    /// Releasing one or more environments failed.
    #[error("teardown failed: {0}")]
    Teardown(#[from] TeardownFailure),

    /// Operation attempted in the wrong lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl ReactorError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a new unknown target error.
    #[must_use]
    pub fn unknown_target(target: impl Into<String>) -> Self {
        Self::UnknownTarget(target.into())
    }

    /// Creates a new invalid state error.
    #[must_use]
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Creates a new remote invocation error.
    #[must_use]
    pub fn remote(address: impl Into<String>, cause: RemoteCause) -> Self {
        Self::RemoteInvocation {
            address: address.into(),
            cause,
        }
    }

    pub(crate) fn lock_poisoned() -> Self {
        Self::InvalidState("lock poisoned".to_string())
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Returns true if this is a staging error.
    #[must_use]
    pub const fn is_staging(&self) -> bool {
        matches!(self, Self::Staging(_))
    }

    /// Returns true if this is an unknown target error.
    #[must_use]
    pub const fn is_unknown_target(&self) -> bool {
        matches!(self, Self::UnknownTarget(_))
    }

    /// Returns true if this is a remote invocation error.
    #[must_use]
    pub const fn is_remote_invocation(&self) -> bool {
        matches!(self, Self::RemoteInvocation { .. })
    }

    /// Returns true if the test itself failed inside its container, as
    /// opposed to the container being unreachable or timing out.
    #[must_use]
    pub const fn is_test_failure(&self) -> bool {
        matches!(
            self,
            Self::RemoteInvocation {
                cause: RemoteCause::TestFailure(_),
                ..
            }
        )
    }

    /// Returns true if this is a teardown error.
    #[must_use]
    pub const fn is_teardown(&self) -> bool {
        matches!(self, Self::Teardown(_))
    }

    /// Unwinds a remote invocation error to the original remote cause.
    ///
    /// Host-runner integrations report this error, not the wrapper, so the
    /// operator sees the assertion that failed inside the container.
    #[must_use]
    pub fn root_cause(&self) -> &(dyn std::error::Error + 'static) {
        match self {
            Self::RemoteInvocation { cause, .. } => match cause {
                RemoteCause::TestFailure(err) | RemoteCause::Transport(err) => &**err,
                RemoteCause::Timeout(_) => cause,
            },
            other => other,
        }
    }
}

/// Failure observed while executing a test method inside a container.
#[derive(Debug, Error)]
pub enum RemoteCause {
    /// The test ran and failed.
    #[error("test failed: {0}")]
    TestFailure(#[source] BoxError),

    /// The container could not be reached or the channel broke.
    #[error("environment unreachable: {0}")]
    Transport(#[source] BoxError),

    /// The invocation exceeded the environment's timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// A failure attributed to a single environment.
#[derive(Debug)]
pub struct EnvironmentFailure {
    /// Environment identifier.
    pub environment_id: String,
    /// Underlying cause.
    pub cause: BoxError,
}

impl EnvironmentFailure {
    /// Creates a new environment failure.
    #[must_use]
    pub fn new(environment_id: impl Into<String>, cause: BoxError) -> Self {
        Self {
            environment_id: environment_id.into(),
            cause,
        }
    }
}

impl fmt::Display for EnvironmentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.environment_id, self.cause)
    }
}

fn write_failures(f: &mut fmt::Formatter<'_>, failures: &[EnvironmentFailure]) -> fmt::Result {
    for (i, failure) in failures.iter().enumerate() {
        if i > 0 {
            f.write_str("; ")?;
        }
        write!(f, "{failure}")?;
    }
    Ok(())
}

/// Aggregated result of a failed staging attempt.
///
/// Every environment that was provisioned before the failure has already
/// been released when this error is returned. Failures to release them are
/// recorded alongside the provisioning failures.
#[derive(Debug, Default)]
pub struct StagingFailure {
    /// Environments whose provisioning failed.
    pub provision_failures: Vec<EnvironmentFailure>,
    /// Provisioned environments that could not be released during rollback.
    pub release_failures: Vec<EnvironmentFailure>,
    /// Environments that were released during rollback.
    pub released: Vec<String>,
    /// Environments that were never attempted.
    pub skipped: Vec<String>,
}

impl StagingFailure {
    /// Iterates over every recorded cause, provisioning failures first.
    pub fn causes(&self) -> impl Iterator<Item = &EnvironmentFailure> {
        self.provision_failures
            .iter()
            .chain(self.release_failures.iter())
    }

    /// Identifiers of the environments that failed to provision.
    #[must_use]
    pub fn failed_environments(&self) -> Vec<&str> {
        self.provision_failures
            .iter()
            .map(|f| f.environment_id.as_str())
            .collect()
    }
}

impl fmt::Display for StagingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} environment(s) failed to provision (",
            self.provision_failures.len()
        )?;
        write_failures(f, &self.provision_failures)?;
        f.write_str(")")?;
        if !self.release_failures.is_empty() {
            f.write_str(", rollback failed (")?;
            write_failures(f, &self.release_failures)?;
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl std::error::Error for StagingFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.causes()
            .next()
            .map(|f| &*f.cause as &(dyn std::error::Error + 'static))
    }
}

/// Aggregated release failures from a teardown.
#[derive(Debug, Default)]
pub struct TeardownFailure {
    /// Environments that could not be released.
    pub failures: Vec<EnvironmentFailure>,
}

impl fmt::Display for TeardownFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} environment(s) failed to release (",
            self.failures.len()
        )?;
        write_failures(f, &self.failures)?;
        f.write_str(")")
    }
}

impl std::error::Error for TeardownFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.failures
            .first()
            .map(|f| &*f.cause as &(dyn std::error::Error + 'static))
    }
}
