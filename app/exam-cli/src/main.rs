//! Exam CLI - inspect configuration and addressing plans.

use anyhow::{Context, Result};
use clap::Parser;
use exam_reactor::{ExamConfig, logging};

mod commands;

use commands::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.file {
        Some(path) => ExamConfig::load_from(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => ExamConfig::load().context("failed to load configuration")?,
    };
    if cli.debug {
        config.logging.level = "debug".to_string();
    }
    logging::init(&config.logging);

    match cli.command {
        Commands::Config => commands::config::execute(&config, cli.format),
        Commands::Plan(args) => commands::plan::execute(args, &config, cli.format),
    }
}
