//! Staged reactor.
//!
//! A [`StagedExamReactor`] owns the live environments of a staged
//! [`ExamReactor`] and routes invocations to them by address.

use crate::address::TestAddress;
use crate::config::ReactorStrategy;
use crate::directory::TestDirectory;
use crate::environment::{
    DynEnvironmentHandle, DynProvisioner, EnvironmentConfig, EnvironmentHandle, InvocationOutcome,
};
use crate::error::{
    EnvironmentFailure, ReactorError, RemoteCause, Result, StagingFailure, TeardownFailure,
};
use crate::instruction::InstantiationInstruction;
use crate::reactor::{ExamReactor, StageOptions};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Releases handles in reverse provisioning order, attempting every one.
///
/// Returns the released environment ids and the failures.
pub(crate) async fn release_all(
    handles: Vec<(String, DynEnvironmentHandle)>,
) -> (Vec<String>, Vec<EnvironmentFailure>) {
    let mut released = Vec::with_capacity(handles.len());
    let mut failures = Vec::new();

    for (id, handle) in handles.into_iter().rev() {
        match handle.release().await {
            Ok(()) => {
                debug!(environment = %id, "environment released");
                released.push(id);
            }
            Err(cause) => {
                warn!(environment = %id, error = %cause, "failed to release environment");
                failures.push(EnvironmentFailure::new(id, cause));
            }
        }
    }

    (released, failures)
}

/// The staged aggregate: live environments and the addresses they serve.
pub struct StagedExamReactor {
    descriptor: ExamReactor,
    strategy: ReactorStrategy,
    default_invoke_timeout: Option<Duration>,
    live: RwLock<Vec<(String, DynEnvironmentHandle)>>,
    provisioner: DynProvisioner,
    targets: Vec<TestAddress>,
    index: HashSet<TestAddress>,
    directory: Arc<TestDirectory>,
    staged_at: DateTime<Utc>,
    torn_down: AtomicBool,
}

impl StagedExamReactor {
    pub(crate) fn new(
        descriptor: ExamReactor,
        options: &StageOptions,
        live: Vec<(String, DynEnvironmentHandle)>,
        targets: Vec<TestAddress>,
        directory: Arc<TestDirectory>,
        provisioner: DynProvisioner,
    ) -> Self {
        let index = targets.iter().cloned().collect();
        Self {
            descriptor,
            strategy: options.strategy,
            default_invoke_timeout: options.default_invoke_timeout,
            live: RwLock::new(live),
            provisioner,
            targets,
            index,
            directory,
            staged_at: Utc::now(),
            torn_down: AtomicBool::new(false),
        }
    }

    /// Returns every reachable address. Each address appears once.
    #[must_use]
    pub fn targets(&self) -> &[TestAddress] {
        &self.targets
    }

    /// Returns whether the address is a target of this reactor.
    #[must_use]
    pub fn contains(&self, address: &TestAddress) -> bool {
        self.index.contains(address)
    }

    /// Returns the unstaged reactor this one was staged from.
    #[must_use]
    pub const fn descriptor(&self) -> &ExamReactor {
        &self.descriptor
    }

    /// Returns the strategy the reactor was staged with.
    #[must_use]
    pub const fn strategy(&self) -> ReactorStrategy {
        self.strategy
    }

    /// Returns the number of configured environments.
    #[must_use]
    pub fn num_configurations(&self) -> usize {
        self.descriptor.num_configurations()
    }

    /// Returns the ids of the environments currently held live.
    #[must_use]
    pub fn live_environments(&self) -> Vec<String> {
        self.live
            .read()
            .map(|live| live.iter().map(|(id, _)| id.clone()).collect())
            .unwrap_or_default()
    }

    /// Returns when the reactor was staged.
    #[must_use]
    pub const fn staged_at(&self) -> DateTime<Utc> {
        self.staged_at
    }

    /// Returns whether the reactor has been torn down.
    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Runs the test method behind an address and waits for it to finish.
    ///
    /// # Errors
    ///
    /// Returns an unknown target error without touching any environment if
    /// the address is not a target or its environment is gone. Remote
    /// failures, transport errors and timeouts are reported as remote
    /// invocation errors carrying the original cause.
    #[instrument(skip(self), fields(address = %address))]
    pub async fn invoke(&self, address: &TestAddress) -> Result<()> {
        if !self.index.contains(address) {
            return Err(ReactorError::unknown_target(format!(
                "{address} is not a target of this reactor"
            )));
        }
        if self.is_torn_down() {
            return Err(ReactorError::unknown_target(format!(
                "{address}: reactor has been torn down"
            )));
        }

        let environment = address
            .environment_id()
            .and_then(|id| self.descriptor.environment(id))
            .ok_or_else(|| {
                ReactorError::unknown_target(format!("{address} has no configured environment"))
            })?;
        let instruction = self.directory.lookup(address)?;

        match self.strategy {
            ReactorStrategy::PerMethod => {
                self.invoke_confined(address, environment, &instruction)
                    .await
            }
            ReactorStrategy::PerClass | ReactorStrategy::PerSuite => {
                let handle = self.live_handle(&environment.id)?.ok_or_else(|| {
                    ReactorError::unknown_target(format!(
                        "{address}: environment {} is not live",
                        environment.id
                    ))
                })?;
                self.call(address, environment, handle.as_ref(), &instruction)
                    .await
            }
        }
    }

    fn live_handle(&self, environment_id: &str) -> Result<Option<DynEnvironmentHandle>> {
        let live = self
            .live
            .read()
            .map_err(|_| ReactorError::lock_poisoned())?;
        Ok(live
            .iter()
            .find(|(id, _)| id == environment_id)
            .map(|(_, handle)| Arc::clone(handle)))
    }

    /// Provisions the environment for a single invocation and releases it
    /// afterwards.
    async fn invoke_confined(
        &self,
        address: &TestAddress,
        environment: &EnvironmentConfig,
        instruction: &InstantiationInstruction,
    ) -> Result<()> {
        let probe = self.descriptor.probe_for(&environment.id).ok_or_else(|| {
            ReactorError::unknown_target(format!("{address}: no probe for {}", environment.id))
        })?;

        let handle = match self.provisioner.provision(environment, &probe).await {
            Ok(handle) => handle,
            Err(cause) => {
                return Err(StagingFailure {
                    provision_failures: vec![EnvironmentFailure::new(&environment.id, cause)],
                    ..StagingFailure::default()
                }
                .into());
            }
        };

        let result = self
            .call(address, environment, handle.as_ref(), instruction)
            .await;

        if let Err(cause) = handle.release().await {
            warn!(environment = %environment.id, error = %cause, "failed to release environment");
        }
        result
    }

    async fn call(
        &self,
        address: &TestAddress,
        environment: &EnvironmentConfig,
        handle: &dyn EnvironmentHandle,
        instruction: &InstantiationInstruction,
    ) -> Result<()> {
        let timeout = handle
            .invoke_timeout()
            .or_else(|| environment.invoke_timeout())
            .or(self.default_invoke_timeout);
        debug!(environment = %environment.id, %instruction, ?timeout, "invoking");

        let outcome = match timeout {
            Some(limit) => tokio::time::timeout(limit, handle.invoke(instruction))
                .await
                .map_err(|_| {
                    ReactorError::remote(address.identifier(), RemoteCause::Timeout(limit))
                })?,
            None => handle.invoke(instruction).await,
        };

        match outcome {
            Ok(InvocationOutcome::Passed) => Ok(()),
            Ok(InvocationOutcome::Failed(cause)) => Err(ReactorError::remote(
                address.identifier(),
                RemoteCause::TestFailure(cause),
            )),
            Err(cause) => Err(ReactorError::remote(
                address.identifier(),
                RemoteCause::Transport(cause),
            )),
        }
    }

    /// Releases every live environment and unregisters the targets.
    ///
    /// Every environment is released even if some releases fail. Calling
    /// this again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a teardown error aggregating every failed release.
    #[instrument(skip(self), fields(targets = self.targets.len()))]
    pub async fn tear_down(&self) -> Result<()> {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            debug!("reactor already torn down");
            return Ok(());
        }

        let handles = {
            let mut live = self.live.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *live)
        };
        let (released, failures) = release_all(handles).await;
        info!(
            released = released.len(),
            failed = failures.len(),
            "reactor torn down"
        );

        let unregistered = self.directory.remove_all(&self.targets);
        if !failures.is_empty() {
            return Err(TeardownFailure { failures }.into());
        }
        unregistered
    }
}

impl fmt::Debug for StagedExamReactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedExamReactor")
            .field("strategy", &self.strategy)
            .field("environments", &self.descriptor.num_configurations())
            .field("targets", &self.targets.len())
            .field("live", &self.live_environments())
            .field("staged_at", &self.staged_at)
            .field("torn_down", &self.is_torn_down())
            .finish_non_exhaustive()
    }
}

impl Drop for StagedExamReactor {
    fn drop(&mut self) {
        let live = self.live_environments();
        if !live.is_empty() {
            warn!(environments = ?live, "staged reactor dropped without teardown");
        }
    }
}
