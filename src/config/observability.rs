use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Service identity
// ─────────────────────────────────────────────────────────────────────────────

/// Service identity attached to every exported record as resource attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// `service.name` resource attribute.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// `service.version` resource attribute.
    #[serde(default = "default_service_version")]
    pub version: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            version: default_service_version(),
        }
    }
}

impl ServiceConfig {
    pub(super) fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("service.name must not be empty".into());
        }
        Ok(())
    }
}

fn default_service_name() -> String {
    "test-service".to_string()
}

fn default_service_version() -> String {
    "0.1.0".to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Exporter
// ─────────────────────────────────────────────────────────────────────────────

/// Log record exporter selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExporterConfig {
    /// Write records to standard output.
    Console(ConsoleExporterConfig),
    /// Send records to an OpenTelemetry collector over OTLP/HTTP.
    OtlpHttp(OtlpConfig),
}

impl Default for ExporterConfig {
    fn default() -> Self {
        ExporterConfig::Console(ConsoleExporterConfig::default())
    }
}

impl ExporterConfig {
    pub(super) fn validate(&self) -> Result<(), String> {
        match self {
            ExporterConfig::Console(_) => Ok(()),
            #[cfg(feature = "otlp")]
            ExporterConfig::OtlpHttp(otlp) => otlp.validate(),
            #[cfg(not(feature = "otlp"))]
            ExporterConfig::OtlpHttp(_) => Err(
                "exporter type 'otlp_http' requires the 'otlp' feature. \
                 Rebuild with: cargo build --features otlp"
                    .into(),
            ),
        }
    }

    /// Short name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            ExporterConfig::Console(_) => "console",
            ExporterConfig::OtlpHttp(_) => "otlp_http",
        }
    }
}

/// Console exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConsoleExporterConfig {
    /// Indent the JSON output. When false each record is one line.
    #[serde(default = "default_true")]
    pub pretty: bool,
}

impl Default for ConsoleExporterConfig {
    fn default() -> Self {
        Self { pretty: true }
    }
}

/// OTLP/HTTP exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OtlpConfig {
    /// OTLP logs endpoint URL (e.g. `http://localhost:4318/v1/logs`).
    pub endpoint: String,

    /// Headers to include (e.g., for authentication).
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Timeout in seconds.
    #[serde(default = "default_otlp_timeout")]
    pub timeout_secs: u64,
}

impl OtlpConfig {
    #[cfg_attr(not(feature = "otlp"), allow(dead_code))]
    fn validate(&self) -> Result<(), String> {
        if self.endpoint.trim().is_empty() {
            return Err("exporter.endpoint must not be empty".into());
        }
        Ok(())
    }
}

fn default_otlp_timeout() -> u64 {
    10
}

// ─────────────────────────────────────────────────────────────────────────────
// Batch processor
// ─────────────────────────────────────────────────────────────────────────────

/// Batch log processor limits.
///
/// The defaults keep a queue of four records and export each record on its
/// own, so a single emitted record never waits for a second one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    /// Records buffered before new ones are dropped.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Records handed to the exporter per export call.
    #[serde(default = "default_max_export_batch_size")]
    pub max_export_batch_size: usize,

    /// Interval between scheduled exports, in milliseconds.
    #[serde(default = "default_scheduled_delay_ms")]
    pub scheduled_delay_ms: u64,

    /// Upper bound on pipeline shutdown. The SDK default applies when unset.
    #[serde(default)]
    pub shutdown_timeout_secs: Option<u64>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_queue_size: default_max_queue_size(),
            max_export_batch_size: default_max_export_batch_size(),
            scheduled_delay_ms: default_scheduled_delay_ms(),
            shutdown_timeout_secs: None,
        }
    }
}

impl BatchConfig {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.max_queue_size == 0 {
            return Err("batch.max_queue_size must be greater than zero".into());
        }
        if self.max_export_batch_size == 0 {
            return Err("batch.max_export_batch_size must be greater than zero".into());
        }
        if self.max_export_batch_size > self.max_queue_size {
            return Err(format!(
                "batch.max_export_batch_size ({}) must not exceed batch.max_queue_size ({})",
                self.max_export_batch_size, self.max_queue_size
            ));
        }
        Ok(())
    }

    pub fn shutdown_timeout(&self) -> Option<std::time::Duration> {
        self.shutdown_timeout_secs.map(std::time::Duration::from_secs)
    }
}

fn default_max_queue_size() -> usize {
    4
}

fn default_max_export_batch_size() -> usize {
    1
}

fn default_scheduled_delay_ms() -> u64 {
    1000
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

/// Diagnostic logging configuration.
///
/// Diagnostics go to stderr so that stdout carries only exported records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include timestamps.
    #[serde(default = "default_true")]
    pub timestamps: bool,

    /// Include file/line information.
    #[serde(default)]
    pub file_line: bool,

    /// Filter directives (e.g., "opentelemetry_sdk=debug").
    #[serde(default)]
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            timestamps: true,
            file_line: false,
            filter: None,
        }
    }
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable multi-line format.
    Pretty,
    /// Compact single-line format.
    #[default]
    Compact,
    /// JSON format (for log aggregation).
    Json,
}

fn default_true() -> bool {
    true
}
