use std::path::{Path, PathBuf};

use clap::Parser;

mod app;
mod audit;
mod config;
mod observability;

#[cfg(test)]
mod tests;

use crate::config::{AppConfig, ConfigError};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Emit a Kubernetes audit event as an OpenTelemetry log record",
    long_about = None
)]
struct Args {
    /// Audit event file (defaults to `input` from the config, then `audit.log`)
    input: Option<PathBuf>,

    /// Path to config file (built-in defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = observability::init_tracing(&config.logging) {
        eprintln!("Warning: {e}");
    }

    let input = args.input.unwrap_or_else(|| config.input.clone());
    tracing::debug!(
        input = %input.display(),
        exporter = config.exporter.kind(),
        "Starting"
    );

    if let Err(e) = app::run(&config, &input) {
        tracing::error!(setup = e.is_setup(), error = %e, "Run failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => AppConfig::from_file(path),
        None => Ok(AppConfig::default()),
    }
}
