//! End-to-end runs and shared test doubles.

use std::{
    future::{Future, ready},
    io::{self, Write},
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use opentelemetry::logs::{AnyValue, Severity};
use opentelemetry_sdk::{
    Resource,
    error::OTelSdkResult,
    logs::{LogBatch, LogExporter},
};
use parking_lot::Mutex;
use tempfile::TempDir;

use crate::{
    app::{AppError, RECORD_MESSAGE, run, run_with_pipeline},
    audit::{ATTRIBUTE_KEYS, AuditError, fixtures::*},
    config::{AppConfig, BatchConfig},
    observability::{Pipeline, build_resource, console::ConsoleExporter},
};

/// A record as seen by [`RecordingExporter`].
#[derive(Debug, Clone)]
pub(crate) struct ExportedRecord {
    pub body: Option<String>,
    pub severity: Option<Severity>,
    pub keys: Vec<String>,
}

/// How long a stalled exporter blocks each export.
pub(crate) const EXPORT_STALL: Duration = Duration::from_millis(1500);

#[derive(Debug, Default)]
struct RecorderState {
    records: Mutex<Vec<ExportedRecord>>,
    shutdowns: AtomicUsize,
    stall: Option<Duration>,
}

/// Exporter that keeps exported records in memory and counts shutdowns.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingExporter {
    state: Arc<RecorderState>,
}

impl RecordingExporter {
    /// An exporter that records each batch and then blocks for [`EXPORT_STALL`].
    pub fn stalled() -> Self {
        Self {
            state: Arc::new(RecorderState {
                stall: Some(EXPORT_STALL),
                ..Default::default()
            }),
        }
    }

    pub fn records(&self) -> Vec<ExportedRecord> {
        self.state.records.lock().clone()
    }

    pub fn shutdowns(&self) -> usize {
        self.state.shutdowns.load(Ordering::SeqCst)
    }
}

impl LogExporter for RecordingExporter {
    fn export(&self, batch: LogBatch<'_>) -> impl Future<Output = OTelSdkResult> + Send {
        let mut records = self.state.records.lock();
        for (record, _scope) in batch.iter() {
            records.push(ExportedRecord {
                body: record.body().map(|body| match body {
                    AnyValue::String(s) => s.as_str().to_string(),
                    other => format!("{other:?}"),
                }),
                severity: record.severity_number(),
                keys: record
                    .attributes_iter()
                    .map(|(key, _)| key.as_str().to_string())
                    .collect(),
            });
        }
        drop(records);

        if let Some(stall) = self.state.stall {
            std::thread::sleep(stall);
        }
        ready(Ok(()))
    }

    fn shutdown_with_timeout(&self, _timeout: Duration) -> OTelSdkResult {
        self.state.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Cloneable in-memory writer.
#[derive(Debug, Clone, Default)]
pub(crate) struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn write_input(contents: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit.log");
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}

/// A pipeline whose shutdown deadline is shorter than [`EXPORT_STALL`].
pub(crate) fn stalled_pipeline() -> (Pipeline, RecordingExporter) {
    let exporter = RecordingExporter::stalled();
    let batch = BatchConfig {
        shutdown_timeout_secs: Some(1),
        ..Default::default()
    };
    let pipeline =
        Pipeline::with_exporter(Resource::builder_empty().build(), exporter.clone(), &batch)
            .unwrap();
    (pipeline, exporter)
}

fn recording_pipeline() -> (Pipeline, RecordingExporter) {
    let exporter = RecordingExporter::default();
    let resource = build_resource(&AppConfig::default().service).unwrap();
    let pipeline =
        Pipeline::with_exporter(resource, exporter.clone(), &BatchConfig::default()).unwrap();
    (pipeline, exporter)
}

#[test]
fn test_run_emits_one_record() {
    let (_dir, path) = write_input(POD_GET_EVENT);
    let (pipeline, exporter) = recording_pipeline();

    run_with_pipeline(pipeline, &path).unwrap();

    let records = exporter.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].body.as_deref(), Some(RECORD_MESSAGE));
    assert_eq!(records[0].severity, Some(Severity::Info));
    assert_eq!(records[0].keys, ATTRIBUTE_KEYS);
    assert_eq!(exporter.shutdowns(), 1);
}

#[test]
fn test_run_minimal_event() {
    let (_dir, path) = write_input(MINIMAL_EVENT);
    let (pipeline, exporter) = recording_pipeline();

    run_with_pipeline(pipeline, &path).unwrap();

    assert_eq!(exporter.records()[0].keys.len(), ATTRIBUTE_KEYS.len());
}

#[test]
fn test_run_missing_file_fails_fast() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit.log");
    let (pipeline, exporter) = recording_pipeline();

    let err = run_with_pipeline(pipeline, &path).unwrap_err();

    assert!(matches!(err, AppError::Audit(AuditError::Io { .. })));
    assert!(!err.is_setup());
    assert!(exporter.records().is_empty());
    assert_eq!(exporter.shutdowns(), 1);
}

#[test]
fn test_run_not_json_fails_fast() {
    let (_dir, path) = write_input("not json");
    let (pipeline, exporter) = recording_pipeline();

    let err = run_with_pipeline(pipeline, &path).unwrap_err();

    assert!(matches!(err, AppError::Audit(AuditError::Decode { .. })));
    assert!(exporter.records().is_empty());
    assert_eq!(exporter.shutdowns(), 1);
}

#[test]
fn test_shutdown_timeout_does_not_mask_success() {
    let (_dir, path) = write_input(POD_GET_EVENT);
    let (pipeline, exporter) = stalled_pipeline();

    run_with_pipeline(pipeline, &path).unwrap();

    let records = exporter.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].keys, ATTRIBUTE_KEYS);
}

#[test]
fn test_shutdown_timeout_keeps_load_error() {
    let (_dir, path) = write_input("{");
    let (pipeline, exporter) = stalled_pipeline();
    // Keep the exporter busy so the final drain outlasts the deadline.
    pipeline.emit("earlier record", Vec::new());

    let err = run_with_pipeline(pipeline, &path).unwrap_err();

    assert!(matches!(err, AppError::Audit(AuditError::Decode { .. })));
    let records = exporter.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].body.as_deref(), Some("earlier record"));
}

#[test]
fn test_single_record_exported_without_second() {
    let (_dir, path) = write_input(POD_GET_EVENT);
    let buffer = SharedBuffer::default();
    let batch = BatchConfig {
        shutdown_timeout_secs: Some(5),
        ..Default::default()
    };
    let pipeline = Pipeline::with_exporter(
        build_resource(&AppConfig::default().service).unwrap(),
        ConsoleExporter::new(buffer.clone(), true),
        &batch,
    )
    .unwrap();

    run_with_pipeline(pipeline, &path).unwrap();

    let output: serde_json::Value = serde_json::from_str(&buffer.contents()).unwrap();
    assert_eq!(output["body"], RECORD_MESSAGE);
    assert_eq!(output["resource"]["service.name"], "test-service");
    assert_eq!(output["resource"]["service.version"], "0.1.0");
    assert_eq!(
        output["attributes"].as_array().map(Vec::len),
        Some(ATTRIBUTE_KEYS.len())
    );
}

#[test]
fn test_run_with_invalid_batch_is_setup_error() {
    let (_dir, path) = write_input(POD_GET_EVENT);
    let mut config = AppConfig::default();
    config.batch.max_export_batch_size = 10;

    let err = run(&config, &path).unwrap_err();

    assert!(err.is_setup());
    assert!(matches!(err, AppError::Pipeline(_)));
}
