//! One run: load an audit event and emit it as a single log record.

use std::path::Path;

use crate::{
    audit::{AuditError, load_event, map_to_attributes},
    config::AppConfig,
    observability::{Pipeline, PipelineError, ResourceError, build_pipeline, build_resource},
};

/// Body of the emitted record.
pub const RECORD_MESSAGE: &str = "Hello World!";

/// Errors that end a run.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Failed to build telemetry resource: {0}")]
    Resource(#[from] ResourceError),

    #[error("Failed to build logging pipeline: {0}")]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Audit(#[from] AuditError),
}

impl AppError {
    /// True for failures that happen before any record could be emitted.
    pub fn is_setup(&self) -> bool {
        matches!(self, AppError::Resource(_) | AppError::Pipeline(_))
    }
}

/// Build the resource and pipeline from `config`, then emit the event at `input`.
pub fn run(config: &AppConfig, input: &Path) -> Result<(), AppError> {
    let resource = build_resource(&config.service)?;
    let pipeline = build_pipeline(&config.exporter, &config.batch, resource)?;

    run_with_pipeline(pipeline, input)
}

/// Emit the event at `input` through `pipeline`, then shut the pipeline down.
///
/// The pipeline is shut down whether or not the event could be loaded. A
/// shutdown failure is logged and never replaces the run's own outcome.
pub fn run_with_pipeline(mut pipeline: Pipeline, input: &Path) -> Result<(), AppError> {
    let outcome = emit_event(&pipeline, input);

    if let Err(e) = pipeline.shutdown() {
        tracing::warn!(error = %e, "Error shutting down logging pipeline");
    }

    outcome
}

fn emit_event(pipeline: &Pipeline, input: &Path) -> Result<(), AppError> {
    let event = load_event(input)?;
    let attributes = map_to_attributes(&event);

    tracing::info!(
        audit_id = %event.audit_id,
        verb = %event.verb,
        attributes = attributes.len(),
        "Emitting audit record"
    );
    pipeline.emit(RECORD_MESSAGE, attributes);

    Ok(())
}
