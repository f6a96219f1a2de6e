//! Observability: the OpenTelemetry log pipeline that carries audit records,
//! and diagnostic logging for the program itself.
//!
//! This module provides:
//! - Resource construction (service identity plus platform defaults)
//! - The log pipeline: exporter, batch processor and logger provider
//! - A console exporter printing records as JSON
//! - Diagnostic `tracing` output on stderr

pub(crate) mod console;
mod pipeline;
mod resource;
mod tracing_init;

pub use pipeline::*;
pub use resource::*;
pub use tracing_init::*;
