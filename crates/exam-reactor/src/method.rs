//! Host-runner method descriptors and name mangling.
//!
//! When the same logical test runs in more than one environment, the host
//! runner would see the same method name several times. Mangling derives a
//! per-environment display name (`bar:karaf`) from the scoped address while
//! [`TestAddress::root`] still ties every variant to one test.

use crate::address::{METHOD_SEPARATOR, TestAddress};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separates a method's display name from its environment when mangled.
pub const MANGLE_SEPARATOR: char = ':';

/// Returns whether method names must be mangled for the given number of
/// configured environments.
#[must_use]
pub const fn should_mangle(num_configurations: usize) -> bool {
    num_configurations > 1
}

/// A test method as the host runner knows it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameworkMethod {
    /// Fully qualified class name.
    pub class_name: String,
    /// Declared method name.
    pub method_name: String,
    /// Name reported to the host runner.
    pub display_name: String,
}

impl FrameworkMethod {
    /// Creates a method whose display name is its declared name.
    #[must_use]
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        let method_name = method_name.into();
        Self {
            class_name: class_name.into(),
            display_name: method_name.clone(),
            method_name,
        }
    }

    /// Creates the method registered under a root address. Repeated
    /// registrations keep their disambiguating suffix (`bar[1]`).
    #[must_use]
    pub fn for_root(
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        root: &TestAddress,
    ) -> Self {
        Self {
            display_name: root.method_part().to_string(),
            ..Self::new(class_name, method_name)
        }
    }

    /// Derives the environment-qualified variant of this method.
    ///
    /// Root addresses leave the name untouched.
    #[must_use]
    pub fn mangled(&self, address: &TestAddress) -> Self {
        match address.environment_id() {
            Some(environment) => Self {
                display_name: format!("{}{MANGLE_SEPARATOR}{environment}", self.display_name),
                ..self.clone()
            },
            None => self.clone(),
        }
    }

    /// Returns the name reported to the host runner.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.display_name
    }

    /// Returns `class#display_name`, unique within a suite.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}{METHOD_SEPARATOR}{}", self.class_name, self.display_name)
    }
}

impl fmt::Display for FrameworkMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{METHOD_SEPARATOR}{}", self.class_name, self.display_name)
    }
}
