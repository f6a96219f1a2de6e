//! Configuration for the audit log emitter.
//!
//! Configuration is optional. When present it is read from a TOML file, with
//! support for environment variable interpolation using `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! input = "/var/log/kubernetes/audit.log"
//!
//! [service]
//! name = "audit-forwarder"
//! version = "1.2.0"
//!
//! [exporter]
//! type = "otlp_http"
//! endpoint = "http://collector:4318/v1/logs"
//! headers = { authorization = "Bearer ${COLLECTOR_TOKEN}" }
//! ```

mod observability;

use std::path::{Path, PathBuf};

pub use observability::*;
use serde::{Deserialize, Serialize};

/// Path read when neither the command line nor the config names an input.
pub const DEFAULT_INPUT: &str = "audit.log";

/// Root configuration.
///
/// Every section has defaults that reproduce the stock behaviour: a console
/// exporter, a batch processor with queue 4 / batch 1, and the
/// `test-service` / `0.1.0` service identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Audit event file to read.
    #[serde(default = "default_input")]
    pub input: PathBuf,

    /// Service identity attached to the telemetry resource.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Where log records are exported.
    #[serde(default)]
    pub exporter: ExporterConfig,

    /// Batch processor limits.
    #[serde(default)]
    pub batch: BatchConfig,

    /// Diagnostic logging for the program itself.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            input: default_input(),
            service: ServiceConfig::default(),
            exporter: ExporterConfig::default(),
            batch: BatchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_input() -> PathBuf {
    PathBuf::from(DEFAULT_INPUT)
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing variables cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;

        let config: AppConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration for consistency.
    fn validate(&self) -> Result<(), ConfigError> {
        self.service.validate().map_err(ConfigError::Validation)?;
        self.batch.validate().map_err(ConfigError::Validation)?;
        self.exporter.validate().map_err(ConfigError::Validation)?;
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Expand environment variables in the format `${VAR_NAME}`.
/// Variables inside a trailing `#` comment are left untouched. A `#` within a
/// quoted string does not start a comment.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = env_var_pattern();
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = comment_start(line);
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
                continue;
            };

            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            result.push_str(&line[last_end..whole.start()]);
            let value = std::env::var(name.as_str())
                .map_err(|_| ConfigError::EnvVarNotFound(name.as_str().to_string()))?;
            result.push_str(&value);
            last_end = whole.end();
        }

        result.push_str(&line[last_end..]);
        result.push('\n');
    }

    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}

/// Byte offset of the `#` opening a comment on `line`, if any.
///
/// Tracks single-line basic (`"..."`) and literal (`'...'`) strings only.
fn comment_start(line: &str) -> Option<usize> {
    let mut quote = None;
    let mut escaped = false;

    for (pos, c) in line.char_indices() {
        match quote {
            Some('"') if escaped => escaped = false,
            Some('"') if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '#' => return Some(pos),
            None => {}
        }
    }

    None
}

fn env_var_pattern() -> &'static regex::Regex {
    static PATTERN: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    PATTERN.get_or_init(|| {
        #[allow(clippy::unwrap_used)] // literal pattern
        regex::Regex::new(r"\$\{([^}]+)\}").unwrap()
    })
}
