//! Test fixtures for end-to-end scenarios.

use exam_reactor::{EnvironmentConfig, TestClass};

/// Common test classes.
pub struct TestFixtures;

impl TestFixtures {
    /// `Foo` with a single `bar` test.
    pub fn foo() -> TestClass {
        TestClass::new("Foo").with_methods(["bar"])
    }

    /// A class with passing and failing tests.
    pub fn calculator() -> TestClass {
        TestClass::new("com.acme.CalculatorTest").with_methods(["adds", "divides", "overflows"])
    }

    /// A class that brings its own environments.
    pub fn with_environments(name: &str, methods: &[&str], environments: &[&str]) -> TestClass {
        environments.iter().fold(
            TestClass::new(name).with_methods(methods.iter().copied()),
            |class, id| class.with_environment(EnvironmentConfig::new(*id)),
        )
    }

    /// A two-class suite.
    pub fn suite() -> Vec<TestClass> {
        vec![Self::foo(), Self::calculator()]
    }
}
