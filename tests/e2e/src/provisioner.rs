//! Scripted environment provisioner.
//!
//! Stands in for real containers. Every handle it hands out is recorded in
//! a [`Ledger`] so tests can assert that nothing leaks.

use async_trait::async_trait;
use exam_reactor::{
    BoxError, DynEnvironmentHandle, EnvironmentConfig, EnvironmentHandle, EnvironmentProvisioner,
    InstantiationInstruction, InvocationOutcome, Probe,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Bookkeeping shared by a provisioner and its handles.
#[derive(Debug, Default)]
pub struct Ledger {
    live: Mutex<Vec<String>>,
    attempts: Mutex<Vec<String>>,
    provisioned: AtomicUsize,
    released: AtomicUsize,
    invocations: Mutex<Vec<String>>,
    probes: Mutex<HashMap<String, usize>>,
}

impl Ledger {
    /// Environments currently held live.
    pub fn live(&self) -> Vec<String> {
        self.live.lock().unwrap().clone()
    }

    /// Number of handles provisioned and never released.
    pub fn leaked(&self) -> usize {
        self.live.lock().unwrap().len()
    }

    /// Environments provisioning was attempted for, in order.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    /// Number of successful provisions.
    pub fn provisioned(&self) -> usize {
        self.provisioned.load(Ordering::SeqCst)
    }

    /// Number of successful releases.
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Invocations as `environment:class;method`, in order.
    pub fn invocations(&self) -> Vec<String> {
        self.invocations.lock().unwrap().clone()
    }

    /// Size of the last probe deployed to an environment.
    pub fn probe_size(&self, environment: &str) -> Option<usize> {
        self.probes.lock().unwrap().get(environment).copied()
    }
}

/// Provisioner whose failures are scripted per environment.
#[derive(Debug, Default)]
pub struct ScriptedProvisioner {
    refuse: HashSet<String>,
    refuse_nth: Option<usize>,
    failing: HashMap<String, HashSet<String>>,
    unreachable: HashSet<String>,
    failing_release: HashSet<String>,
    invoke_delay: Option<Duration>,
    ledger: Arc<Ledger>,
}

impl ScriptedProvisioner {
    /// Creates a provisioner where everything succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails to provision an environment.
    #[must_use]
    pub fn refusing(mut self, environment: &str) -> Self {
        self.refuse.insert(environment.to_string());
        self
    }

    /// Fails the n-th provisioning attempt (one based).
    #[must_use]
    pub const fn refusing_nth(mut self, n: usize) -> Self {
        self.refuse_nth = Some(n);
        self
    }

    /// Makes a test method fail inside an environment.
    #[must_use]
    pub fn failing(mut self, environment: &str, method: &str) -> Self {
        self.failing
            .entry(environment.to_string())
            .or_default()
            .insert(method.to_string());
        self
    }

    /// Makes every invocation in an environment a transport error.
    #[must_use]
    pub fn unreachable(mut self, environment: &str) -> Self {
        self.unreachable.insert(environment.to_string());
        self
    }

    /// Makes releasing an environment fail.
    #[must_use]
    pub fn failing_release(mut self, environment: &str) -> Self {
        self.failing_release.insert(environment.to_string());
        self
    }

    /// Delays every invocation.
    #[must_use]
    pub const fn with_invoke_delay(mut self, delay: Duration) -> Self {
        self.invoke_delay = Some(delay);
        self
    }

    /// Returns the ledger.
    pub fn ledger(&self) -> Arc<Ledger> {
        Arc::clone(&self.ledger)
    }
}

#[async_trait]
impl EnvironmentProvisioner for ScriptedProvisioner {
    async fn provision(
        &self,
        config: &EnvironmentConfig,
        probe: &Probe,
    ) -> Result<DynEnvironmentHandle, BoxError> {
        let attempt = {
            let mut attempts = self.ledger.attempts.lock().unwrap();
            attempts.push(config.id.clone());
            attempts.len()
        };
        if self.refuse.contains(&config.id) || self.refuse_nth == Some(attempt) {
            return Err(format!("{} did not start", config.id).into());
        }

        self.ledger
            .probes
            .lock()
            .unwrap()
            .insert(config.id.clone(), probe.len());
        self.ledger.live.lock().unwrap().push(config.id.clone());
        self.ledger.provisioned.fetch_add(1, Ordering::SeqCst);

        Ok(Arc::new(ScriptedHandle {
            id: config.id.clone(),
            failing: self.failing.get(&config.id).cloned().unwrap_or_default(),
            unreachable: self.unreachable.contains(&config.id),
            failing_release: self.failing_release.contains(&config.id),
            delay: self.invoke_delay,
            ledger: Arc::clone(&self.ledger),
        }))
    }
}

struct ScriptedHandle {
    id: String,
    failing: HashSet<String>,
    unreachable: bool,
    failing_release: bool,
    delay: Option<Duration>,
    ledger: Arc<Ledger>,
}

#[async_trait]
impl EnvironmentHandle for ScriptedHandle {
    fn environment_id(&self) -> &str {
        &self.id
    }

    async fn invoke(
        &self,
        instruction: &InstantiationInstruction,
    ) -> Result<InvocationOutcome, BoxError> {
        self.ledger
            .invocations
            .lock()
            .unwrap()
            .push(format!("{}:{instruction}", self.id));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.unreachable {
            return Err(format!("{} is unreachable", self.id).into());
        }
        if self.failing.contains(&instruction.method_name) {
            return Ok(InvocationOutcome::Failed(
                format!("{} failed in {}", instruction.method_name, self.id).into(),
            ));
        }
        Ok(InvocationOutcome::Passed)
    }

    async fn release(&self) -> Result<(), BoxError> {
        if self.failing_release {
            return Err(format!("{} refused to stop", self.id).into());
        }
        let mut live = self.ledger.live.lock().unwrap();
        if let Some(index) = live.iter().position(|id| *id == self.id) {
            live.remove(index);
        }
        self.ledger.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
