//! `exam plan`.
//!
//! Reads a suite manifest and prints the targets staging would produce,
//! without provisioning anything:
//!
//! ```toml
//! [[classes]]
//! name = "com.acme.FooTest"
//! methods = ["bar", "baz"]
//!
//! [[classes.environments]]
//! id = "karaf"
//! kind = "karaf"
//! ```

use super::OutputFormat;
use anyhow::{Context, Result, bail};
use clap::Args;
use exam_reactor::{
    ExamConfig, ExamReactor, FrameworkMethod, ProbeTarget, TestClass, TestProbeBuilder,
    should_mangle,
};
use figment::{
    Figment,
    providers::{Format, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Arguments for `exam plan`.
#[derive(Args)]
pub struct PlanArgs {
    /// Suite manifest (TOML)
    pub suite: PathBuf,
}

/// Test classes of a suite.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SuiteManifest {
    /// Classes, in execution order. The first supplies the environments.
    pub classes: Vec<TestClass>,
}

impl SuiteManifest {
    /// Loads a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            bail!("suite manifest {} not found", path.display());
        }
        Figment::new()
            .merge(Toml::file(path))
            .extract()
            .with_context(|| format!("failed to parse {}", path.display()))
    }
}

/// One target of the plan.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PlannedTest {
    /// Environment-qualified address.
    pub address: String,
    /// Root address shared across environments.
    pub root: String,
    /// Environment.
    pub environment: String,
    /// Name reported to the host runner.
    pub name: String,
}

/// Computes the targets of a suite.
pub fn plan(manifest: &SuiteManifest, config: &ExamConfig) -> Result<Vec<PlannedTest>> {
    let Some(first) = manifest.classes.first() else {
        bail!("suite declares no test classes");
    };
    let environments = if first.environments.is_empty() {
        config.environments.clone()
    } else {
        first.environments.clone()
    };
    let mut reactor = ExamReactor::new(environments)?;

    let mut builder = TestProbeBuilder::new(ProbeTarget::AllEnvironments);
    let mut methods = HashMap::new();
    for class in &manifest.classes {
        for method in &class.methods {
            let address = builder.add_test(class, method)?;
            let framework = FrameworkMethod::for_root(&class.name, method, &address);
            methods.insert(address.identifier().to_string(), framework);
        }
    }
    reactor.add_probe(builder.build())?;

    let mangle = should_mangle(reactor.num_configurations());
    debug!(environments = reactor.num_configurations(), mangle, "planning");

    reactor
        .planned_targets()
        .into_iter()
        .map(|target| {
            let root = target.root().identifier().to_string();
            let method = methods
                .get(&root)
                .with_context(|| format!("no method registered for {root}"))?;
            let name = if mangle {
                method.mangled(&target).qualified_name()
            } else {
                method.qualified_name()
            };
            Ok(PlannedTest {
                address: target.identifier().to_string(),
                environment: target.environment_id().unwrap_or_default().to_string(),
                root,
                name,
            })
        })
        .collect()
}

/// Prints the plan of a suite manifest.
pub fn execute(args: PlanArgs, config: &ExamConfig, format: OutputFormat) -> Result<()> {
    let manifest = SuiteManifest::load(&args.suite)?;
    let planned = plan(&manifest, config)?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&planned)?);
        return Ok(());
    }

    println!("{:<40} {:<16} {:<40}", "ADDRESS", "ENVIRONMENT", "NAME");
    for test in &planned {
        println!("{:<40} {:<16} {:<40}", test.address, test.environment, test.name);
    }
    println!();
    println!("{} target(s) in {} class(es)", planned.len(), manifest.classes.len());

    Ok(())
}
