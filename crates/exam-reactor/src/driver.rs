//! Runner-agnostic host integration.
//!
//! [`ExamDriver`] wires a host test runner's suite and class callbacks to a
//! [`ReactorManager`]: it registers the suite's methods, stages the reactor,
//! reports one method per target (mangled when the same test runs in more
//! than one environment) and runs them by name.

use crate::address::TestAddress;
use crate::config::ReactorStrategy;
use crate::error::{ReactorError, Result};
use crate::manager::{ReactorManager, ReactorPhase};
use crate::method::{FrameworkMethod, should_mangle};
use crate::probe::TestClass;
use crate::staged::StagedExamReactor;
use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Outcome of one test run, as reported to the host runner.
#[derive(Debug)]
pub enum TestOutcome {
    /// The test passed.
    Passed,
    /// The test failed or could not be run.
    Failed(ReactorError),
}

impl TestOutcome {
    /// Returns whether the test passed.
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Returns the failure, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&ReactorError> {
        match self {
            Self::Passed => None,
            Self::Failed(err) => Some(err),
        }
    }

    /// Returns the original cause of a failure.
    #[must_use]
    pub fn cause(&self) -> Option<&(dyn Error + 'static)> {
        self.error().map(ReactorError::root_cause)
    }
}

/// Drives a suite through a reactor manager.
#[derive(Debug)]
pub struct ExamDriver {
    manager: Arc<ReactorManager>,
    staged: Option<Arc<StagedExamReactor>>,
    suite: Vec<TestClass>,
    names: HashMap<String, TestAddress>,
}

impl ExamDriver {
    /// Creates a driver for a manager.
    #[must_use]
    pub fn new(manager: Arc<ReactorManager>) -> Self {
        Self {
            manager,
            staged: None,
            suite: Vec::new(),
            names: HashMap::new(),
        }
    }

    /// Returns the manager.
    #[must_use]
    pub const fn manager(&self) -> &Arc<ReactorManager> {
        &self.manager
    }

    /// Returns the staged reactor the driver currently runs against.
    #[must_use]
    pub const fn staged(&self) -> Option<&Arc<StagedExamReactor>> {
        self.staged.as_ref()
    }

    /// Returns the classes of the running suite.
    #[must_use]
    pub fn suite(&self) -> &[TestClass] {
        &self.suite
    }

    /// Starts a suite: registers the suite's methods in one probe, stages
    /// the reactor and fires the suite hook.
    ///
    /// The first class supplies the environments. Under the per-suite
    /// strategy every class is registered; otherwise only the first class
    /// is, since each class gets its own reactor.
    ///
    /// # Errors
    ///
    /// Returns configuration and staging errors.
    #[instrument(skip_all, fields(classes = suite.len()))]
    pub async fn on_start(&mut self, suite: Vec<TestClass>) -> Result<()> {
        self.suite = suite;
        let Some(first) = self.suite.first() else {
            debug!("empty suite");
            return Ok(());
        };

        let classes = if self.manager.strategy() == ReactorStrategy::PerSuite {
            self.suite.as_slice()
        } else {
            std::slice::from_ref(first)
        };
        let staged = self.register_and_stage(first, classes).await?;
        self.manager.before_suite(&staged);
        self.staged = Some(staged);
        Ok(())
    }

    /// Starts a class: prepares (or reuses) a reactor for it and fires the
    /// class hook.
    ///
    /// # Errors
    ///
    /// Returns configuration and staging errors.
    #[instrument(skip_all, fields(class = %class.name))]
    pub async fn on_before_class(&mut self, class: &TestClass) -> Result<()> {
        let staged = self
            .register_and_stage(class, std::slice::from_ref(class))
            .await?;
        self.manager.before_class(&staged, class);
        self.staged = Some(staged);
        Ok(())
    }

    async fn register_and_stage(
        &self,
        class: &TestClass,
        classes: &[TestClass],
    ) -> Result<Arc<StagedExamReactor>> {
        let mut reactor = self.manager.prepare_reactor(class).await?;
        let mut builder = self.manager.create_probe_builder();
        for class in classes {
            for method in &class.methods {
                let address = builder.add_test(class, method)?;
                self.manager.store_test_method(
                    &address,
                    FrameworkMethod::for_root(&class.name, method, &address),
                )?;
            }
        }
        reactor.add_probe(builder.build())?;
        self.manager.stage_reactor(reactor).await
    }

    /// Returns the methods the host runner should run: one per target, in
    /// target order.
    ///
    /// # Errors
    ///
    /// Returns an invalid state error if nothing is staged, or an unknown
    /// target error if a target has no registered method.
    pub fn intercept(&mut self) -> Result<Vec<FrameworkMethod>> {
        let staged = self
            .staged
            .as_ref()
            .ok_or_else(|| ReactorError::invalid_state("intercept called before staging"))?;
        let mangle = should_mangle(self.manager.num_configurations());

        self.names.clear();
        let mut methods = Vec::with_capacity(staged.targets().len());
        for target in staged.targets() {
            let method = self
                .manager
                .lookup_test_method(target)
                .ok_or_else(|| ReactorError::unknown_target(target.identifier()))?;
            let method = if mangle { method.mangled(target) } else { method };
            self.names.insert(method.qualified_name(), target.clone());
            methods.push(method);
        }

        debug!(methods = methods.len(), mangle, "intercepted");
        Ok(methods)
    }

    /// Returns the address a reported method name maps to.
    #[must_use]
    pub fn address_of(&self, qualified_name: &str) -> Option<&TestAddress> {
        self.names.get(qualified_name)
    }

    /// Runs one reported method by its qualified name.
    #[instrument(skip(self))]
    pub async fn run(&self, qualified_name: &str) -> TestOutcome {
        let Some(address) = self.names.get(qualified_name) else {
            return TestOutcome::Failed(ReactorError::unknown_target(qualified_name));
        };
        let Some(staged) = &self.staged else {
            return TestOutcome::Failed(ReactorError::unknown_target(address.identifier()));
        };

        match staged.invoke(address).await {
            Ok(()) => TestOutcome::Passed,
            Err(err) => {
                if err.is_test_failure() {
                    info!(test = %qualified_name, cause = %err.root_cause(), "test failed");
                } else {
                    error!(test = %qualified_name, error = %err, "test could not be run");
                }
                TestOutcome::Failed(err)
            }
        }
    }

    /// Finishes a class.
    ///
    /// # Errors
    ///
    /// Returns the teardown error if the class's reactor was torn down.
    pub async fn on_after_class(&mut self, class: &TestClass) -> Result<()> {
        let result = self.manager.after_class(class).await;
        if self.manager.phase().await == ReactorPhase::Idle {
            self.staged = None;
            self.names.clear();
        }
        if let Err(err) = &result {
            warn!(class = %class.name, error = %err, "class teardown failed");
        }
        result
    }

    /// Finishes the suite and tears everything down.
    ///
    /// # Errors
    ///
    /// Returns the teardown error.
    pub async fn on_finish(&mut self) -> Result<()> {
        self.staged = None;
        self.names.clear();
        let result = self.manager.after_suite().await;
        if let Err(err) = &result {
            warn!(error = %err, "suite teardown failed");
        }
        result
    }
}
