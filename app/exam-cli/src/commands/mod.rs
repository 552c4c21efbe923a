//! CLI command implementations.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod config;
pub mod plan;

/// Exam - in-container integration test reactor
#[derive(Parser)]
#[command(name = "exam")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file to use instead of the standard locations
    ///
    /// Environment variables (`EXAM_*`) still apply on top of it.
    #[arg(long, global = true, env = "EXAM_CONFIG")]
    pub file: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "table")]
    pub format: OutputFormat,

    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Show the resolved configuration
    Config,

    /// Show the targets a suite would be staged with
    Plan(plan::PlanArgs),
}
