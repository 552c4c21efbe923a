//! Unstaged reactor.
//!
//! An [`ExamReactor`] collects the environments to provision and the probe
//! manifest for each of them. [`ExamReactor::stage`] turns it into a
//! [`StagedExamReactor`].

use crate::address::TestAddress;
use crate::config::{ReactorStrategy, validate_environments};
use crate::directory::TestDirectory;
use crate::environment::{
    DynEnvironmentHandle, DynProvisioner, EnvironmentConfig, EnvironmentProvisioner,
};
use crate::error::{EnvironmentFailure, ReactorError, Result, StagingFailure};
use crate::instruction::InstantiationInstruction;
use crate::probe::{Probe, ProbeEntry, ProbeTarget};
use crate::staged::{StagedExamReactor, release_all};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

/// Options applied when staging.
#[derive(Debug, Clone, Default)]
pub struct StageOptions {
    /// Reactor strategy.
    pub strategy: ReactorStrategy,
    /// Invocation timeout used when neither the handle nor the environment
    /// configuration sets one.
    pub default_invoke_timeout: Option<Duration>,
}

/// The unstaged aggregate: environments plus one manifest per environment.
#[derive(Debug, Clone)]
pub struct ExamReactor {
    environments: Vec<EnvironmentConfig>,
    manifests: HashMap<String, Vec<ProbeEntry>>,
    /// Preparation a manager handed this reactor out for.
    generation: Option<u64>,
}

impl ExamReactor {
    /// Creates a reactor for the given environments.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no environment is given or an id is
    /// invalid or duplicated.
    pub fn new(environments: Vec<EnvironmentConfig>) -> Result<Self> {
        if environments.is_empty() {
            return Err(ReactorError::config("no environments configured"));
        }
        validate_environments(&environments)?;

        let manifests = environments
            .iter()
            .map(|e| (e.id.clone(), Vec::new()))
            .collect();
        Ok(Self {
            environments,
            manifests,
            generation: None,
        })
    }

    pub(crate) fn with_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }

    pub(crate) const fn generation(&self) -> Option<u64> {
        self.generation
    }

    /// Merges a probe into the manifests of the environments it targets and
    /// returns the number of entries added.
    ///
    /// Adding a probe for an environment that already has one appends to
    /// its manifest. Entries whose address is already present are skipped,
    /// so re-adding the same registrations is harmless. Repetitions of a
    /// method carry their own address and are appended.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the probe targets an environment
    /// that is not configured.
    pub fn add_probe(&mut self, probe: Probe) -> Result<usize> {
        let targets: Vec<String> = match probe.target() {
            ProbeTarget::AllEnvironments => self.environments.iter().map(|e| e.id.clone()).collect(),
            ProbeTarget::Environment(id) => {
                if !self.manifests.contains_key(id) {
                    return Err(ReactorError::config(format!(
                        "probe targets unconfigured environment {id}"
                    )));
                }
                vec![id.clone()]
            }
        };

        let mut added = 0;
        for id in targets {
            let manifest = self.manifests.entry(id.clone()).or_default();
            let mut skipped = 0;
            for entry in probe.manifest() {
                if manifest.iter().any(|e| e.address == entry.address) {
                    skipped += 1;
                    continue;
                }
                manifest.push(entry.clone());
                added += 1;
            }
            if skipped > 0 {
                debug!(environment = %id, skipped, "skipped tests already in the manifest");
            }
        }
        Ok(added)
    }

    /// Returns the configured environments in configuration order.
    #[must_use]
    pub fn environments(&self) -> &[EnvironmentConfig] {
        &self.environments
    }

    /// Returns the configuration of one environment.
    #[must_use]
    pub fn environment(&self, id: &str) -> Option<&EnvironmentConfig> {
        self.environments.iter().find(|e| e.id == id)
    }

    /// Returns the number of configured environments.
    #[must_use]
    pub fn num_configurations(&self) -> usize {
        self.environments.len()
    }

    /// Returns the manifest of one environment.
    #[must_use]
    pub fn manifest(&self, environment_id: &str) -> Option<&[ProbeEntry]> {
        self.manifests.get(environment_id).map(Vec::as_slice)
    }

    /// Returns the merged probe deployed to one environment.
    #[must_use]
    pub fn probe_for(&self, environment_id: &str) -> Option<Probe> {
        self.manifests.get(environment_id).map(|manifest| {
            Probe::from_parts(
                ProbeTarget::Environment(environment_id.to_string()),
                manifest.clone(),
            )
        })
    }

    /// Returns the number of registered tests over all environments.
    #[must_use]
    pub fn test_count(&self) -> usize {
        self.manifests.values().map(Vec::len).sum()
    }

    /// Returns whether no test is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.test_count() == 0
    }

    /// Returns the addresses staging will produce: environments in
    /// configuration order, tests in manifest order.
    #[must_use]
    pub fn planned_targets(&self) -> Vec<TestAddress> {
        self.plan().into_iter().map(|(address, _)| address).collect()
    }

    fn plan(&self) -> Vec<(TestAddress, InstantiationInstruction)> {
        self.environments
            .iter()
            .flat_map(|environment| {
                self.manifest(&environment.id)
                    .unwrap_or_default()
                    .iter()
                    .map(move |entry| {
                        (
                            TestAddress::scoped(&entry.address, &environment.id),
                            entry.instruction(),
                        )
                    })
            })
            .collect()
    }

    /// Provisions the environments and registers every target.
    ///
    /// Under [`ReactorStrategy::PerMethod`] nothing is provisioned here;
    /// every invocation provisions and releases its own environment.
    ///
    /// # Errors
    ///
    /// Returns a staging error if an environment fails to provision. All
    /// environments provisioned up to that point are released first and no
    /// target is registered.
    #[instrument(skip_all, fields(environments = self.environments.len(), strategy = %options.strategy))]
    pub async fn stage(
        &self,
        provisioner: DynProvisioner,
        directory: Arc<TestDirectory>,
        options: &StageOptions,
    ) -> Result<StagedExamReactor> {
        let plan = self.plan();
        if plan.is_empty() {
            debug!("staging a reactor without tests");
        }

        let live = match options.strategy {
            ReactorStrategy::PerMethod => {
                debug!("environments are provisioned per invocation");
                Vec::new()
            }
            ReactorStrategy::PerClass | ReactorStrategy::PerSuite => {
                self.provision_all(provisioner.as_ref()).await?
            }
        };

        if let Err(err) = register(&directory, &plan) {
            error!(error = %err, "failed to register targets");
            let (_, failures) = release_all(live).await;
            for failure in failures {
                error!(environment = %failure.environment_id, error = %failure.cause, "rollback release failed");
            }
            return Err(err);
        }

        info!(targets = plan.len(), "reactor staged");
        let targets = plan.into_iter().map(|(address, _)| address).collect();
        Ok(StagedExamReactor::new(
            self.clone(),
            options,
            live,
            targets,
            directory,
            provisioner,
        ))
    }

    async fn provision_all(
        &self,
        provisioner: &dyn EnvironmentProvisioner,
    ) -> Result<Vec<(String, DynEnvironmentHandle)>> {
        let mut live = Vec::with_capacity(self.environments.len());

        for (index, environment) in self.environments.iter().enumerate() {
            let probe = self.probe_for(&environment.id).unwrap_or_else(|| {
                Probe::from_parts(ProbeTarget::Environment(environment.id.clone()), Vec::new())
            });
            debug!(
                environment = %environment.id,
                kind = %environment.kind,
                tests = probe.len(),
                "provisioning environment"
            );

            match provisioner.provision(environment, &probe).await {
                Ok(handle) => {
                    info!(environment = %environment.id, "environment provisioned");
                    live.push((environment.id.clone(), handle));
                }
                Err(cause) => {
                    error!(environment = %environment.id, error = %cause, "failed to provision environment");
                    let (released, release_failures) = release_all(live).await;
                    let failure = StagingFailure {
                        provision_failures: vec![EnvironmentFailure::new(&environment.id, cause)],
                        release_failures,
                        released,
                        skipped: self.environments[index + 1..]
                            .iter()
                            .map(|e| e.id.clone())
                            .collect(),
                    };
                    return Err(failure.into());
                }
            }
        }

        Ok(live)
    }
}

/// Writes the plan into the directory and seals its entries, or leaves the
/// directory as it was.
fn register(
    directory: &TestDirectory,
    plan: &[(TestAddress, InstantiationInstruction)],
) -> Result<()> {
    for (index, (address, instruction)) in plan.iter().enumerate() {
        if let Err(err) = directory.add(address.clone(), instruction.clone()) {
            let _ = directory.remove_all(plan[..index].iter().map(|(a, _)| a));
            return Err(err);
        }
    }
    directory.seal(plan.iter().map(|(address, _)| address))
}
