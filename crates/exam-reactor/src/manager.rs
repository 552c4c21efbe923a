//! Reactor lifecycle orchestration.
//!
//! The [`ReactorManager`] owns the active reactor and decides, per
//! strategy, whether a staged reactor is reused or rebuilt between test
//! classes.
//!
//! ```text
//!            prepare_reactor          stage_reactor
//!   Idle ─────────────────▶ Prepared ─────────────▶ Staged
//!    ▲                                                │
//!    │        after_class (per class) / after_suite   │
//!    └────────────────────────────────────────────────┘
//! ```
//!
//! Under `per_suite`, and under `per_class` for the same class,
//! `prepare_reactor` on a staged manager hands back the staged reactor's
//! descriptor and `stage_reactor` returns the staged reactor unchanged.

use crate::address::TestAddress;
use crate::config::{ExamConfig, ReactorStrategy};
use crate::directory::TestDirectory;
use crate::environment::DynProvisioner;
use crate::error::{ReactorError, Result};
use crate::method::FrameworkMethod;
use crate::probe::{ProbeTarget, TestClass, TestProbeBuilder};
use crate::reactor::{ExamReactor, StageOptions};
use crate::staged::StagedExamReactor;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

static GLOBAL: OnceLock<Arc<ReactorManager>> = OnceLock::new();

/// Lifecycle phase of a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactorPhase {
    /// No reactor.
    Idle,
    /// A reactor has been prepared but not staged.
    Prepared,
    /// A staged reactor is live.
    Staged,
}

impl fmt::Display for ReactorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Prepared => write!(f, "prepared"),
            Self::Staged => write!(f, "staged"),
        }
    }
}

/// Lifecycle scope a reactor was prepared for.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Scope {
    Suite,
    Class(String),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Suite => write!(f, "the suite"),
            Self::Class(name) => write!(f, "class {name}"),
        }
    }
}

fn check_generation(reactor: &ExamReactor, scope: &Scope, generation: u64) -> Result<()> {
    if reactor.generation() == Some(generation) {
        return Ok(());
    }
    Err(ReactorError::invalid_state(format!(
        "reactor was not prepared for {scope}, which the manager now serves"
    )))
}

/// Every prepared reactor carries the generation it was prepared under, so
/// a reactor prepared for one scope cannot be staged after another scope
/// took over the manager.
enum ManagerState {
    Idle,
    Prepared {
        scope: Scope,
        generation: u64,
    },
    Staged {
        scope: Scope,
        generation: u64,
        reactor: Arc<StagedExamReactor>,
    },
}

impl ManagerState {
    const fn phase(&self) -> ReactorPhase {
        match self {
            Self::Idle => ReactorPhase::Idle,
            Self::Prepared { .. } => ReactorPhase::Prepared,
            Self::Staged { .. } => ReactorPhase::Staged,
        }
    }

    const fn scope(&self) -> Option<&Scope> {
        match self {
            Self::Idle => None,
            Self::Prepared { scope, .. } | Self::Staged { scope, .. } => Some(scope),
        }
    }
}

/// Orchestrates preparation, staging and teardown of reactors.
pub struct ReactorManager {
    config: ExamConfig,
    provisioner: DynProvisioner,
    directory: Arc<TestDirectory>,
    /// Guards every phase transition. Staging runs while it is held.
    state: Mutex<ManagerState>,
    generations: AtomicU64,
    configurations: AtomicUsize,
    methods: RwLock<HashMap<String, FrameworkMethod>>,
}

impl ReactorManager {
    /// Creates a manager with its own test directory.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configured default
    /// environments are invalid.
    pub fn new(config: ExamConfig, provisioner: DynProvisioner) -> Result<Self> {
        Self::with_directory(config, provisioner, Arc::new(TestDirectory::new()))
    }

    /// Creates a manager sharing the given test directory.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configured default
    /// environments are invalid.
    pub fn with_directory(
        config: ExamConfig,
        provisioner: DynProvisioner,
        directory: Arc<TestDirectory>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            provisioner,
            directory,
            state: Mutex::new(ManagerState::Idle),
            generations: AtomicU64::new(0),
            configurations: AtomicUsize::new(0),
            methods: RwLock::new(HashMap::new()),
        })
    }

    /// Installs the process-wide manager.
    ///
    /// # Errors
    ///
    /// Returns an invalid state error if a manager is already installed.
    pub fn install_global(manager: Self) -> Result<Arc<Self>> {
        let manager = Arc::new(manager);
        GLOBAL
            .set(Arc::clone(&manager))
            .map_err(|_| ReactorError::invalid_state("a global reactor manager is already installed"))?;
        Ok(manager)
    }

    /// Returns the process-wide manager, if one was installed.
    #[must_use]
    pub fn global() -> Option<Arc<Self>> {
        GLOBAL.get().cloned()
    }

    /// Returns the reactor strategy.
    #[must_use]
    pub const fn strategy(&self) -> ReactorStrategy {
        self.config.reactor.strategy
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ExamConfig {
        &self.config
    }

    /// Returns the test directory staged reactors register into.
    #[must_use]
    pub fn directory(&self) -> Arc<TestDirectory> {
        Arc::clone(&self.directory)
    }

    /// Returns the number of environments of the current reactor, or zero
    /// when idle.
    #[must_use]
    pub fn num_configurations(&self) -> usize {
        self.configurations.load(Ordering::SeqCst)
    }

    /// Returns the current phase.
    pub async fn phase(&self) -> ReactorPhase {
        self.state.lock().await.phase()
    }

    /// Returns the live staged reactor, if any.
    pub async fn staged(&self) -> Option<Arc<StagedExamReactor>> {
        match &*self.state.lock().await {
            ManagerState::Staged { reactor, .. } => Some(Arc::clone(reactor)),
            _ => None,
        }
    }

    /// Creates a builder for a probe deployed to every environment.
    #[must_use]
    pub fn create_probe_builder(&self) -> TestProbeBuilder {
        TestProbeBuilder::new(ProbeTarget::AllEnvironments)
    }

    fn scope_for(&self, class: &TestClass) -> Scope {
        match self.strategy() {
            ReactorStrategy::PerSuite => Scope::Suite,
            ReactorStrategy::PerClass | ReactorStrategy::PerMethod => {
                Scope::Class(class.name.clone())
            }
        }
    }

    /// Prepares a reactor for a test class.
    ///
    /// If the strategy allows it and a staged reactor already serves the
    /// class's scope, a copy of that reactor's descriptor is returned and
    /// the manager stays staged. Otherwise any stale staged reactor is torn
    /// down and a fresh reactor is built from the class's environments, or
    /// the configured defaults when the class declares none.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no environment is available or the
    /// environments are invalid.
    #[instrument(skip_all, fields(class = %class.name, strategy = %self.strategy()))]
    pub async fn prepare_reactor(&self, class: &TestClass) -> Result<ExamReactor> {
        let scope = self.scope_for(class);
        let mut state = self.state.lock().await;

        if let ManagerState::Staged {
            scope: staged_scope,
            reactor,
            ..
        } = &*state
        {
            if self.strategy().allows_reuse() && *staged_scope == scope && !reactor.is_torn_down() {
                debug!("reusing staged reactor");
                return Ok(reactor.descriptor().clone());
            }
        }

        if let ManagerState::Staged { reactor, .. } =
            std::mem::replace(&mut *state, ManagerState::Idle)
        {
            debug!("tearing down stale reactor");
            if let Err(err) = reactor.tear_down().await {
                warn!(error = %err, "stale reactor teardown failed");
            }
        }
        self.configurations.store(0, Ordering::SeqCst);

        let environments = if class.environments.is_empty() {
            self.config.environments.clone()
        } else {
            class.environments.clone()
        };
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let reactor = ExamReactor::new(environments)?.with_generation(generation);

        self.configurations
            .store(reactor.num_configurations(), Ordering::SeqCst);
        *state = ManagerState::Prepared { scope, generation };
        debug!(environments = reactor.num_configurations(), "reactor prepared");
        Ok(reactor)
    }

    /// Stages a prepared reactor.
    ///
    /// While a staged reactor is valid for the current scope it is returned
    /// unchanged. Only one staging runs at a time; concurrent callers wait
    /// and then observe the staged reactor.
    ///
    /// # Errors
    ///
    /// Returns an invalid state error if no reactor was prepared, if the
    /// reactor was prepared for a scope the manager no longer serves, or if
    /// under the per-class strategy the staged reactor lacks tests
    /// registered since. Otherwise returns the staging error. After a
    /// failed staging the manager is idle.
    #[instrument(skip_all, fields(strategy = %self.strategy()))]
    pub async fn stage_reactor(&self, reactor: ExamReactor) -> Result<Arc<StagedExamReactor>> {
        let mut state = self.state.lock().await;

        let (scope, generation) = match &*state {
            ManagerState::Idle => {
                return Err(ReactorError::invalid_state(
                    "stage_reactor called before prepare_reactor",
                ));
            }
            ManagerState::Prepared { scope, generation } => {
                check_generation(&reactor, scope, *generation)?;
                (scope.clone(), *generation)
            }
            ManagerState::Staged {
                scope,
                generation,
                reactor: staged,
            } => {
                check_generation(&reactor, scope, *generation)?;
                if !staged.is_torn_down() {
                    let unstaged = reactor
                        .planned_targets()
                        .iter()
                        .filter(|target| !staged.contains(target))
                        .count();
                    if unstaged > 0 {
                        if self.strategy() == ReactorStrategy::PerClass {
                            return Err(ReactorError::invalid_state(format!(
                                "staged reactor for {scope} lacks {unstaged} newly registered test(s)"
                            )));
                        }
                        warn!(unstaged, "reusing staged reactor; newly registered tests are not staged");
                    }
                    return Ok(Arc::clone(staged));
                }
                (scope.clone(), *generation)
            }
        };

        let options = StageOptions {
            strategy: self.strategy(),
            default_invoke_timeout: self.config.reactor.invoke_timeout(),
        };
        match reactor
            .stage(Arc::clone(&self.provisioner), Arc::clone(&self.directory), &options)
            .await
        {
            Ok(staged) => {
                let staged = Arc::new(staged);
                self.configurations
                    .store(staged.num_configurations(), Ordering::SeqCst);
                *state = ManagerState::Staged {
                    scope,
                    generation,
                    reactor: Arc::clone(&staged),
                };
                Ok(staged)
            }
            Err(err) => {
                self.configurations.store(0, Ordering::SeqCst);
                *state = ManagerState::Idle;
                Err(err)
            }
        }
    }

    /// Suite start hook.
    pub fn before_suite(&self, staged: &StagedExamReactor) {
        info!(
            strategy = %self.strategy(),
            environments = staged.num_configurations(),
            targets = staged.targets().len(),
            "suite started"
        );
    }

    /// Suite end hook. Always tears down and returns the manager to idle.
    ///
    /// # Errors
    ///
    /// Returns the teardown error. The manager is idle regardless.
    #[instrument(skip(self))]
    pub async fn after_suite(&self) -> Result<()> {
        let previous = {
            let mut state = self.state.lock().await;
            std::mem::replace(&mut *state, ManagerState::Idle)
        };
        self.configurations.store(0, Ordering::SeqCst);
        self.methods
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        match previous {
            ManagerState::Staged { reactor, .. } => {
                let result = reactor.tear_down().await;
                info!(ok = result.is_ok(), "suite finished");
                result
            }
            _ => Ok(()),
        }
    }

    /// Class start hook.
    pub fn before_class(&self, staged: &StagedExamReactor, class: &TestClass) {
        debug!(
            class = %class.name,
            targets = staged.targets().len(),
            "class started"
        );
    }

    /// Class end hook. Under the per-class strategy it tears down the
    /// reactor serving this class; a reactor serving another class is left
    /// alone. Does nothing under the other strategies.
    ///
    /// # Errors
    ///
    /// Returns the teardown error. The manager is idle regardless.
    #[instrument(skip_all, fields(class = %class.name))]
    pub async fn after_class(&self, class: &TestClass) -> Result<()> {
        if self.strategy() != ReactorStrategy::PerClass {
            return Ok(());
        }

        let scope = self.scope_for(class);
        let previous = {
            let mut state = self.state.lock().await;
            if state.scope() != Some(&scope) {
                debug!("reactor serves another class");
                return Ok(());
            }
            std::mem::replace(&mut *state, ManagerState::Idle)
        };
        self.configurations.store(0, Ordering::SeqCst);

        match previous {
            ManagerState::Staged { reactor, .. } => reactor.tear_down().await,
            _ => Ok(()),
        }
    }

    /// Records the host runner's method for an address. Every address
    /// sharing the same root resolves to the same method.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn store_test_method(&self, address: &TestAddress, method: FrameworkMethod) -> Result<()> {
        self.methods
            .write()
            .map_err(|_| ReactorError::lock_poisoned())?
            .insert(address.root().identifier().to_string(), method);
        Ok(())
    }

    /// Looks up the host runner's method for an address.
    #[must_use]
    pub fn lookup_test_method(&self, address: &TestAddress) -> Option<FrameworkMethod> {
        self.methods
            .read()
            .ok()?
            .get(address.root().identifier())
            .cloned()
    }
}

impl fmt::Debug for ReactorManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = self
            .state
            .try_lock()
            .map_or_else(|_| "busy".to_string(), |state| state.phase().to_string());
        f.debug_struct("ReactorManager")
            .field("strategy", &self.strategy())
            .field("phase", &phase)
            .field("configurations", &self.num_configurations())
            .finish_non_exhaustive()
    }
}
