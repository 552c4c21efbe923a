//! `exam config`.

use super::OutputFormat;
use anyhow::Result;
use exam_reactor::ExamConfig;

/// Prints the resolved configuration.
pub fn execute(config: &ExamConfig, format: OutputFormat) -> Result<()> {
    config.validate()?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    println!("Strategy:       {}", config.reactor.strategy);
    println!(
        "Invoke timeout: {}",
        config
            .reactor
            .invoke_timeout_secs
            .map_or_else(|| "none".to_string(), |secs| format!("{secs}s"))
    );
    println!("Log level:      {}", config.logging.level);
    println!();

    if config.environments.is_empty() {
        println!("No default environments configured.");
        return Ok(());
    }

    println!("{:<20} {:<12} {:<10} {:<8}", "ENVIRONMENT", "KIND", "INVOKER", "TIMEOUT");
    for environment in &config.environments {
        println!(
            "{:<20} {:<12} {:<10} {:<8}",
            environment.id,
            environment.kind,
            environment
                .invoker
                .as_deref()
                .unwrap_or(exam_reactor::environment::DEFAULT_INVOKER),
            environment
                .invoke_timeout_secs
                .map_or_else(|| "-".to_string(), |secs| format!("{secs}s")),
        );
    }

    Ok(())
}
