//! Log record pipeline: exporter, batch processor and logger provider.
//!
//! The [`Pipeline`] is an explicitly owned value rather than a global
//! provider. It hands out nothing: callers emit through it and it is shut down
//! exactly once, either explicitly or when dropped.

use std::time::{Duration, SystemTime};

use opentelemetry::{
    InstrumentationScope,
    logs::{AnyValue, LogRecord as _, Logger as _, LoggerProvider as _, Severity},
};
use opentelemetry_sdk::{
    Resource,
    logs::{BatchConfigBuilder, BatchLogProcessor, LogExporter, SdkLogger, SdkLoggerProvider},
};

#[cfg(feature = "otlp")]
use crate::config::OtlpConfig;
use crate::{
    audit::LogAttribute,
    config::{BatchConfig, ExporterConfig},
    observability::console::ConsoleExporter,
};

/// Severity of emitted audit records.
pub const RECORD_SEVERITY: Severity = Severity::Info;

/// Text accompanying [`RECORD_SEVERITY`].
pub const RECORD_SEVERITY_TEXT: &str = "INFO";

/// Pipeline construction and shutdown errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid batch configuration: {0}")]
    InvalidBatch(String),

    #[error("Failed to create log exporter: {0}")]
    Exporter(String),

    #[error("Failed to shut down logging pipeline: {0}")]
    Shutdown(String),
}

/// Owned logging pipeline.
pub struct Pipeline {
    provider: SdkLoggerProvider,
    logger: SdkLogger,
    shutdown_timeout: Option<Duration>,
    is_shut_down: bool,
}

impl Pipeline {
    /// Wire `exporter` behind a batch processor into a provider bound to `resource`.
    pub fn with_exporter<E>(
        resource: Resource,
        exporter: E,
        batch: &BatchConfig,
    ) -> Result<Self, PipelineError>
    where
        E: LogExporter + 'static,
    {
        batch.validate().map_err(PipelineError::InvalidBatch)?;

        let batch_config = BatchConfigBuilder::default()
            .with_max_queue_size(batch.max_queue_size)
            .with_max_export_batch_size(batch.max_export_batch_size)
            .with_scheduled_delay(Duration::from_millis(batch.scheduled_delay_ms))
            .build();

        let processor = BatchLogProcessor::builder(exporter)
            .with_batch_config(batch_config)
            .build();

        let provider = SdkLoggerProvider::builder()
            .with_resource(resource)
            .with_log_processor(processor)
            .build();

        let scope = InstrumentationScope::builder(env!("CARGO_PKG_NAME"))
            .with_version(env!("CARGO_PKG_VERSION"))
            .build();
        let logger = provider.logger_with_scope(scope);

        Ok(Self {
            provider,
            logger,
            shutdown_timeout: batch.shutdown_timeout(),
            is_shut_down: false,
        })
    }

    /// Emit one record with `message` as its body and `attributes` in order.
    ///
    /// The record is queued; it reaches the exporter asynchronously and at the
    /// latest on [`Pipeline::shutdown`].
    pub fn emit(&self, message: &str, attributes: Vec<LogAttribute>) {
        let mut record = self.logger.create_log_record();
        let now = SystemTime::now();

        record.set_timestamp(now);
        record.set_observed_timestamp(now);
        record.set_severity_number(RECORD_SEVERITY);
        record.set_severity_text(RECORD_SEVERITY_TEXT);
        record.set_body(AnyValue::from(message.to_string()));
        record.add_attributes(attributes.into_iter().map(LogAttribute::into_key_value));

        self.logger.emit(record);
    }

    /// Flush queued records and release the exporter.
    ///
    /// Only the first call does any work. The configured shutdown timeout
    /// bounds it; without one the SDK default applies.
    pub fn shutdown(&mut self) -> Result<(), PipelineError> {
        if self.is_shut_down {
            return Ok(());
        }
        self.is_shut_down = true;

        let result = match self.shutdown_timeout {
            Some(timeout) => self.provider.shutdown_with_timeout(timeout),
            None => self.provider.shutdown(),
        };

        result.map_err(|e| PipelineError::Shutdown(e.to_string()))?;
        tracing::debug!("Logging pipeline shut down");
        Ok(())
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!(error = %e, "Error shutting down logging pipeline");
        }
    }
}

/// Build the pipeline for the configured exporter.
pub fn build_pipeline(
    exporter: &ExporterConfig,
    batch: &BatchConfig,
    resource: Resource,
) -> Result<Pipeline, PipelineError> {
    let pipeline = match exporter {
        ExporterConfig::Console(console) => {
            Pipeline::with_exporter(resource, ConsoleExporter::stdout(console.pretty), batch)?
        }
        #[cfg(feature = "otlp")]
        ExporterConfig::OtlpHttp(otlp) => {
            Pipeline::with_exporter(resource, build_otlp_exporter(otlp)?, batch)?
        }
        #[cfg(not(feature = "otlp"))]
        ExporterConfig::OtlpHttp(_) => {
            return Err(PipelineError::Exporter(
                "the 'otlp_http' exporter requires the 'otlp' feature".into(),
            ));
        }
    };

    tracing::debug!(
        exporter = exporter.kind(),
        max_queue_size = batch.max_queue_size,
        max_export_batch_size = batch.max_export_batch_size,
        "Built logging pipeline"
    );

    Ok(pipeline)
}

/// Build the OTLP/HTTP log exporter.
#[cfg(feature = "otlp")]
fn build_otlp_exporter(
    config: &OtlpConfig,
) -> Result<opentelemetry_otlp::LogExporter, PipelineError> {
    use opentelemetry_otlp::{WithExportConfig, WithHttpConfig};

    let mut builder = opentelemetry_otlp::LogExporter::builder()
        .with_http()
        .with_endpoint(&config.endpoint)
        .with_timeout(Duration::from_secs(config.timeout_secs));

    if !config.headers.is_empty() {
        builder = builder.with_headers(config.headers.clone());
    }

    builder.build().map_err(|e| {
        PipelineError::Exporter(format!("Failed to create HTTP OTLP log exporter: {}", e))
    })
}
