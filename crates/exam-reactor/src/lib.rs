//! # exam-reactor
//!
//! Reactor staging and invocation for tests that run inside externally
//! managed environments.
//!
//! This crate provides:
//!
//! - Probe building and deterministic test addressing
//! - Staging of environments per reactor strategy
//! - Routing of invocations to the environment owning an address
//! - Lifecycle orchestration across suite and class boundaries
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                      ExamDriver                       │
//! │         (host runner suite / class callbacks)         │
//! └──────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌──────────────────────────────────────────────────────┐
//! │                    ReactorManager                     │
//! │  Idle ──▶ Prepared ──▶ Staged ──▶ Idle                │
//! │  - strategy (per_method / per_class / per_suite)      │
//! │  - method registry keyed by root address              │
//! └──────────────────────────────────────────────────────┘
//!          │ TestProbeBuilder          │ stage
//!          ▼                           ▼
//! ┌──────────────────┐      ┌──────────────────────────┐
//! │   ExamReactor    │─────▶│    StagedExamReactor     │
//! │  environments    │      │  live handles, targets   │
//! │  manifests       │      │  invoke / tear_down      │
//! └──────────────────┘      └──────────────────────────┘
//!                                │            │
//!                                ▼            ▼
//!                       ┌──────────────┐  ┌──────────────────────┐
//!                       │TestDirectory │  │EnvironmentProvisioner│
//!                       │address → cmd │  │  EnvironmentHandle   │
//!                       └──────────────┘  └──────────────────────┘
//! ```

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod address;
pub mod config;
pub mod directory;
pub mod driver;
pub mod environment;
pub mod error;
pub mod instruction;
pub mod logging;
pub mod manager;
pub mod method;
pub mod probe;
pub mod reactor;
pub mod staged;

pub use address::TestAddress;
pub use config::{ExamConfig, LoggingConfig, ReactorConfig, ReactorStrategy};
pub use directory::TestDirectory;
pub use driver::{ExamDriver, TestOutcome};
pub use environment::{
    DynEnvironmentHandle, DynProvisioner, EnvironmentConfig, EnvironmentHandle,
    EnvironmentProvisioner, InvocationOutcome,
};
pub use error::{
    BoxError, EnvironmentFailure, ReactorError, RemoteCause, Result, StagingFailure,
    TeardownFailure,
};
pub use instruction::InstantiationInstruction;
pub use manager::{ReactorManager, ReactorPhase};
pub use method::{FrameworkMethod, should_mangle};
pub use probe::{Probe, ProbeEntry, ProbeTarget, TestClass, TestProbeBuilder};
pub use reactor::{ExamReactor, StageOptions};
pub use staged::StagedExamReactor;
