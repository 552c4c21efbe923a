//! Test probes.
//!
//! A probe bundles the test methods deployed into an environment. The host
//! runner registers classes explicitly through [`TestClass`]; the builder
//! only accepts methods a class declares.

use crate::address::{TestAddress, validate_component};
use crate::environment::EnvironmentConfig;
use crate::error::{ReactorError, Result};
use crate::instruction::InstantiationInstruction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A test class as registered by the host runner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestClass {
    /// Fully qualified class name.
    pub name: String,
    /// Declared test methods, in declaration order.
    pub methods: Vec<String>,
    /// Environments the class is configured to run in. Empty means the
    /// configured defaults.
    pub environments: Vec<EnvironmentConfig>,
}

impl TestClass {
    /// Creates a class with no methods.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Declares test methods.
    #[must_use]
    pub fn with_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods.extend(methods.into_iter().map(Into::into));
        self
    }

    /// Adds an environment.
    #[must_use]
    pub fn with_environment(mut self, environment: EnvironmentConfig) -> Self {
        self.environments.push(environment);
        self
    }

    /// Returns whether the class declares the method.
    #[must_use]
    pub fn declares(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m == method)
    }
}

/// Which environments a probe is deployed to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeTarget {
    /// Every configured environment.
    #[default]
    AllEnvironments,
    /// One environment.
    Environment(String),
}

impl ProbeTarget {
    /// Returns whether the probe applies to the environment.
    #[must_use]
    pub fn includes(&self, environment_id: &str) -> bool {
        match self {
            Self::AllEnvironments => true,
            Self::Environment(id) => id == environment_id,
        }
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllEnvironments => f.write_str("*"),
            Self::Environment(id) => f.write_str(id),
        }
    }
}

/// One test method in a probe manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeEntry {
    /// Fully qualified class name.
    pub class_name: String,
    /// Method name.
    pub method_name: String,
    /// Root address assigned at registration.
    pub address: TestAddress,
}

impl ProbeEntry {
    /// Returns the instruction the in-container executor needs.
    #[must_use]
    pub fn instruction(&self) -> InstantiationInstruction {
        InstantiationInstruction::new(&self.class_name, &self.method_name)
    }
}

/// A frozen, ordered bundle of test methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    target: ProbeTarget,
    manifest: Vec<ProbeEntry>,
}

impl Probe {
    pub(crate) const fn from_parts(target: ProbeTarget, manifest: Vec<ProbeEntry>) -> Self {
        Self { target, manifest }
    }

    /// Returns the probe target.
    #[must_use]
    pub const fn target(&self) -> &ProbeTarget {
        &self.target
    }

    /// Returns the manifest in registration order.
    #[must_use]
    pub fn manifest(&self) -> &[ProbeEntry] {
        &self.manifest
    }

    /// Iterates over the root addresses in registration order.
    pub fn addresses(&self) -> impl Iterator<Item = &TestAddress> {
        self.manifest.iter().map(|e| &e.address)
    }

    /// Returns the number of test methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.manifest.len()
    }

    /// Returns whether the probe is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.manifest.is_empty()
    }
}

/// Accumulates test methods into a [`Probe`].
#[derive(Debug, Default)]
pub struct TestProbeBuilder {
    target: ProbeTarget,
    manifest: Vec<ProbeEntry>,
    occurrences: HashMap<(String, String), usize>,
}

impl TestProbeBuilder {
    /// Creates a builder for the given target.
    #[must_use]
    pub fn new(target: ProbeTarget) -> Self {
        Self {
            target,
            ..Self::default()
        }
    }

    /// Creates a builder for one environment.
    #[must_use]
    pub fn for_environment(environment_id: impl Into<String>) -> Self {
        Self::new(ProbeTarget::Environment(environment_id.into()))
    }

    /// Registers a test method and returns its root address.
    ///
    /// Registering the same method again yields a distinct address with a
    /// disambiguating suffix.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the class does not declare the
    /// method or a name is not usable in an address.
    pub fn add_test(&mut self, class: &TestClass, method: &str) -> Result<TestAddress> {
        validate_component("class", &class.name)?;
        validate_component("method", method)?;
        if !class.declares(method) {
            return Err(ReactorError::config(format!(
                "class {} declares no test method {method}",
                class.name
            )));
        }

        let key = (class.name.clone(), method.to_string());
        let occurrence = self.occurrences.entry(key).or_insert(0);
        let address = TestAddress::root_for(&class.name, method, *occurrence);
        *occurrence += 1;

        self.manifest.push(ProbeEntry {
            class_name: class.name.clone(),
            method_name: method.to_string(),
            address: address.clone(),
        });
        Ok(address)
    }

    /// Registers every declared method of a class, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a method name is invalid.
    pub fn add_class(&mut self, class: &TestClass) -> Result<Vec<TestAddress>> {
        class
            .methods
            .iter()
            .map(|method| self.add_test(class, method))
            .collect()
    }

    /// Returns the probe target.
    #[must_use]
    pub const fn target(&self) -> &ProbeTarget {
        &self.target
    }

    /// Returns the number of registered methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.manifest.len()
    }

    /// Returns whether no method has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.manifest.is_empty()
    }

    /// Freezes the manifest into a probe.
    #[must_use]
    pub fn build(self) -> Probe {
        Probe::from_parts(self.target, self.manifest)
    }
}
