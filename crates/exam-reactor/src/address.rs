//! Test addresses.
//!
//! A root address identifies one registered test method independently of
//! any environment (`com.acme.FooTest#bar`). Staging derives one scoped
//! address per environment (`com.acme.FooTest#bar@karaf`) whose
//! [`TestAddress::root`] points back to the root, so the same logical test
//! can be correlated across environments.

use crate::error::{ReactorError, Result};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Separates the class from the method in an identifier.
pub const METHOD_SEPARATOR: char = '#';

/// Separates a root identifier from its environment.
pub const ENVIRONMENT_SEPARATOR: char = '@';

const RESERVED: [char; 5] = [METHOD_SEPARATOR, ENVIRONMENT_SEPARATOR, ';', '[', ']'];

/// Validates a class, method or environment name used in an identifier.
///
/// # Errors
///
/// Returns a configuration error if the name is empty or contains
/// whitespace or a reserved separator.
pub fn validate_component(kind: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ReactorError::config(format!("{kind} name is empty")));
    }
    if let Some(c) = value
        .chars()
        .find(|c| c.is_whitespace() || RESERVED.contains(c))
    {
        return Err(ReactorError::config(format!(
            "{kind} name '{value}' contains reserved character {c:?}"
        )));
    }
    Ok(())
}

/// Identifier of one test method instance.
///
/// Two addresses are equal iff their identifiers are equal.
#[derive(Debug, Clone)]
pub struct TestAddress {
    identifier: String,
    caption: String,
    root: Option<Arc<TestAddress>>,
    environment_id: Option<String>,
}

impl TestAddress {
    /// Creates a root address for the `occurrence`-th registration (zero
    /// based) of `class#method`.
    pub(crate) fn root_for(class_name: &str, method_name: &str, occurrence: usize) -> Self {
        let caption = format!("{class_name}{METHOD_SEPARATOR}{method_name}");
        let identifier = if occurrence == 0 {
            caption.clone()
        } else {
            format!("{caption}[{occurrence}]")
        };
        Self {
            identifier,
            caption,
            root: None,
            environment_id: None,
        }
    }

    /// Derives the address of `root` scoped to an environment.
    ///
    /// If `root` is itself scoped, its root is used.
    #[must_use]
    pub fn scoped(root: &Self, environment_id: impl Into<String>) -> Self {
        let root = Arc::new(root.root().clone());
        let environment_id = environment_id.into();
        Self {
            identifier: format!(
                "{}{ENVIRONMENT_SEPARATOR}{environment_id}",
                root.identifier
            ),
            caption: root.caption.clone(),
            root: Some(root),
            environment_id: Some(environment_id),
        }
    }

    /// Returns the unique identifier.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Returns a human readable `class#method` caption.
    #[must_use]
    pub fn caption(&self) -> &str {
        &self.caption
    }

    /// Returns the environment this address is scoped to, if any.
    #[must_use]
    pub fn environment_id(&self) -> Option<&str> {
        self.environment_id.as_deref()
    }

    /// Returns the environment-independent identity of this address.
    #[must_use]
    pub fn root(&self) -> &Self {
        self.root.as_deref().unwrap_or(self)
    }

    /// Returns whether this is a root address.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.root.is_none()
    }

    /// Returns the part of the identifier after the class name, e.g.
    /// `bar` or `bar[1]` for a repeated registration.
    #[must_use]
    pub fn method_part(&self) -> &str {
        let root = &self.root().identifier;
        root.split_once(METHOD_SEPARATOR)
            .map_or(root.as_str(), |(_, method)| method)
    }
}

impl PartialEq for TestAddress {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier
    }
}

impl Eq for TestAddress {}

impl Hash for TestAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identifier.hash(state);
    }
}

impl fmt::Display for TestAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier)
    }
}
