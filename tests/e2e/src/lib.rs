//! End-to-end scenario framework for the exam reactor.
//!
//! Scenarios drive the reactor through its host-runner integration against
//! scripted environments, and the acceptance client against a scripted
//! HTTP server.
//!
//! ## Scenario Levels
//!
//! 1. **Staging** - provisioning, rollback, teardown
//! 2. **Addressing** - targets, roots and mangled names across environments
//! 3. **Lifecycle** - reuse and rebuild per reactor strategy
//! 4. **Acceptance** - retrying REST client

#![allow(clippy::all)]

pub mod assertions;
pub mod fixtures;
pub mod http;
pub mod provisioner;

pub use fixtures::TestFixtures;
pub use harness::{TestConfig, TestHarness};
pub use http::{Reply, ScriptedServer};
pub use provisioner::{Ledger, ScriptedProvisioner};
