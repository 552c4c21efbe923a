//! Environment collaborator interface.
//!
//! The reactor never provisions containers itself. It hands an
//! [`EnvironmentConfig`] and the probe destined for that environment to an
//! [`EnvironmentProvisioner`] and receives a live [`EnvironmentHandle`]
//! through which test methods are invoked and which it must release.

use crate::address::validate_component;
use crate::error::{BoxError, Result};
use crate::instruction::InstantiationInstruction;
use crate::probe::Probe;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// System property naming the in-container probe invoker.
pub const INVOKER_PROPERTY: &str = "exam.invoker";

/// Invoker used when none is configured.
pub const DEFAULT_INVOKER: &str = "junit";

/// Configuration of one environment to provision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Unique environment identifier.
    pub id: String,
    /// Container kind, interpreted by the provisioner (e.g. `native`, `karaf`).
    pub kind: String,
    /// Probe invoker to configure inside the container.
    pub invoker: Option<String>,
    /// Per-invocation timeout in seconds.
    pub invoke_timeout_secs: Option<u64>,
    /// Free-form options passed to the provisioner.
    pub options: BTreeMap<String, String>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            kind: "native".to_string(),
            invoker: None,
            invoke_timeout_secs: None,
            options: BTreeMap::new(),
        }
    }
}

impl EnvironmentConfig {
    /// Creates a configuration with the given id and default settings.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Sets the container kind.
    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Sets the probe invoker.
    #[must_use]
    pub fn with_invoker(mut self, invoker: impl Into<String>) -> Self {
        self.invoker = Some(invoker.into());
        self
    }

    /// Sets the invocation timeout.
    #[must_use]
    pub fn with_invoke_timeout(mut self, timeout: Duration) -> Self {
        self.invoke_timeout_secs = Some(timeout.as_secs());
        self
    }

    /// Adds a provisioner option.
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Returns the configured invocation timeout.
    #[must_use]
    pub fn invoke_timeout(&self) -> Option<Duration> {
        self.invoke_timeout_secs.map(Duration::from_secs)
    }

    /// Returns the system properties to define inside the container: the
    /// configured options plus the invoker property.
    #[must_use]
    pub fn system_properties(&self) -> BTreeMap<String, String> {
        let mut properties = self.options.clone();
        properties.insert(
            INVOKER_PROPERTY.to_string(),
            self.invoker
                .clone()
                .unwrap_or_else(|| DEFAULT_INVOKER.to_string()),
        );
        properties
    }

    /// Validates the identifier.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the id is empty or contains a
    /// reserved character.
    pub fn validate(&self) -> Result<()> {
        validate_component("environment", &self.id)
    }
}

/// Result of running one test method inside a container.
#[derive(Debug)]
pub enum InvocationOutcome {
    /// The method completed normally.
    Passed,
    /// The method threw; carries the remote cause.
    Failed(BoxError),
}

impl InvocationOutcome {
    /// Returns whether the method passed.
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// Shared provisioner trait object.
pub type DynProvisioner = Arc<dyn EnvironmentProvisioner>;

/// Shared handle trait object.
pub type DynEnvironmentHandle = Arc<dyn EnvironmentHandle>;

/// Provisions environments.
///
/// Implementations decide what a container is and how the probe gets into
/// it.
#[async_trait]
pub trait EnvironmentProvisioner: Send + Sync {
    /// Provisions and starts an environment with the probe deployed.
    async fn provision(
        &self,
        config: &EnvironmentConfig,
        probe: &Probe,
    ) -> std::result::Result<DynEnvironmentHandle, BoxError>;
}

/// A live environment.
///
/// Exclusively owned by the staged reactor that provisioned it.
#[async_trait]
pub trait EnvironmentHandle: Send + Sync {
    /// Identifier of the environment this handle belongs to.
    fn environment_id(&self) -> &str;

    /// Timeout the environment imposes on a single invocation.
    fn invoke_timeout(&self) -> Option<Duration> {
        None
    }

    /// Runs one test method.
    ///
    /// `Ok(InvocationOutcome::Failed(_))` means the test ran and failed;
    /// `Err(_)` means the environment could not run it at all.
    async fn invoke(
        &self,
        instruction: &InstantiationInstruction,
    ) -> std::result::Result<InvocationOutcome, BoxError>;

    /// Stops the environment and frees its resources.
    async fn release(&self) -> std::result::Result<(), BoxError>;
}
