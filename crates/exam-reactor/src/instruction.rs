//! Instantiation instructions.
//!
//! An instruction tells the in-container executor which class to
//! instantiate and which method to call. It travels as `class;method`.

use crate::error::{ReactorError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Location of a test method, opaque to the reactor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstantiationInstruction {
    /// Fully qualified class name.
    pub class_name: String,
    /// Method name.
    pub method_name: String,
}

impl InstantiationInstruction {
    /// Creates a new instruction.
    #[must_use]
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
        }
    }
}

impl fmt::Display for InstantiationInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{}", self.class_name, self.method_name)
    }
}

impl FromStr for InstantiationInstruction {
    type Err = ReactorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(';') {
            Some((class, method)) if !class.is_empty() && !method.is_empty() => {
                Ok(Self::new(class, method))
            }
            _ => Err(ReactorError::config(format!(
                "malformed instantiation instruction '{s}'"
            ))),
        }
    }
}
