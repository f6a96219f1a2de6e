//! Console log exporter.
//!
//! Writes each exported record as a JSON object, pretty-printed by default.
//! Record attributes keep their emission order; resource attributes are
//! sorted by key.

use std::{
    collections::BTreeMap,
    fmt,
    future::{Future, ready},
    io::{self, Write},
    time::SystemTime,
};

use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};
use opentelemetry::{InstrumentationScope, Value, logs::AnyValue};
use opentelemetry_sdk::{
    Resource,
    error::{OTelSdkError, OTelSdkResult},
    logs::{LogBatch, LogExporter, SdkLogRecord},
};
use parking_lot::Mutex;
use serde::Serialize;

/// Exporter that writes log records to a [`Write`] sink, stdout by default.
pub struct ConsoleExporter {
    writer: Mutex<Box<dyn Write + Send>>,
    pretty: bool,
    resource: BTreeMap<String, serde_json::Value>,
}

impl ConsoleExporter {
    /// Exporter writing to standard output.
    pub fn stdout(pretty: bool) -> Self {
        Self::new(io::stdout(), pretty)
    }

    /// Exporter writing to an arbitrary sink.
    pub fn new(writer: impl Write + Send + 'static, pretty: bool) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
            pretty,
            resource: BTreeMap::new(),
        }
    }

    fn write_record(
        &self,
        writer: &mut dyn Write,
        record: &SdkLogRecord,
        scope: &InstrumentationScope,
    ) -> io::Result<()> {
        let rendered = ConsoleRecord {
            timestamp: record.timestamp().map(format_time),
            observed_timestamp: record.observed_timestamp().map(format_time),
            severity_number: record.severity_number().map(|s| s as i32),
            severity_text: record.severity_text(),
            body: record.body().map(any_value_to_json),
            attributes: record
                .attributes_iter()
                .map(|(key, value)| ConsoleAttribute {
                    key: key.as_str(),
                    value: any_value_to_json(value),
                })
                .collect(),
            resource: &self.resource,
            scope: ConsoleScope {
                name: scope.name(),
                version: scope.version(),
            },
        };

        if self.pretty {
            serde_json::to_writer_pretty(&mut *writer, &rendered)?;
        } else {
            serde_json::to_writer(&mut *writer, &rendered)?;
        }
        writer.write_all(b"\n")
    }

    fn write_batch(&self, batch: &LogBatch<'_>) -> OTelSdkResult {
        let mut writer = self.writer.lock();

        for (record, scope) in batch.iter() {
            self.write_record(&mut **writer, record, scope)
                .map_err(|e| OTelSdkError::InternalFailure(format!("console write: {e}")))?;
        }

        writer
            .flush()
            .map_err(|e| OTelSdkError::InternalFailure(format!("console flush: {e}")))
    }
}

impl fmt::Debug for ConsoleExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleExporter")
            .field("pretty", &self.pretty)
            .field("resource_attributes", &self.resource.len())
            .finish_non_exhaustive()
    }
}

impl LogExporter for ConsoleExporter {
    fn export(&self, batch: LogBatch<'_>) -> impl Future<Output = OTelSdkResult> + Send {
        ready(self.write_batch(&batch))
    }

    fn set_resource(&mut self, resource: &Resource) {
        self.resource = resource
            .iter()
            .map(|(key, value)| (key.as_str().to_string(), value_to_json(value)))
            .collect();
    }
}

#[derive(Serialize)]
struct ConsoleRecord<'a> {
    timestamp: Option<String>,
    observed_timestamp: Option<String>,
    severity_number: Option<i32>,
    severity_text: Option<&'static str>,
    body: Option<serde_json::Value>,
    attributes: Vec<ConsoleAttribute<'a>>,
    resource: &'a BTreeMap<String, serde_json::Value>,
    scope: ConsoleScope<'a>,
}

#[derive(Serialize)]
struct ConsoleAttribute<'a> {
    key: &'a str,
    value: serde_json::Value,
}

#[derive(Serialize)]
struct ConsoleScope<'a> {
    name: &'a str,
    version: Option<&'a str>,
}

fn format_time(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn any_value_to_json(value: &AnyValue) -> serde_json::Value {
    match value {
        AnyValue::Int(i) => serde_json::Value::from(*i),
        AnyValue::Double(d) => serde_json::Value::from(*d),
        AnyValue::String(s) => serde_json::Value::from(s.as_str()),
        AnyValue::Boolean(b) => serde_json::Value::from(*b),
        AnyValue::Bytes(bytes) => {
            serde_json::Value::from(base64::engine::general_purpose::STANDARD.encode(&**bytes))
        }
        AnyValue::ListAny(items) => items.iter().map(any_value_to_json).collect(),
        AnyValue::Map(fields) => serde_json::Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.as_str().to_string(), any_value_to_json(v)))
                .collect(),
        ),
        other => serde_json::Value::from(format!("{other:?}")),
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Bool(b) => serde_json::Value::from(*b),
        Value::I64(i) => serde_json::Value::from(*i),
        Value::F64(f) => serde_json::Value::from(*f),
        Value::String(s) => serde_json::Value::from(s.as_str()),
        other => serde_json::Value::from(other.to_string()),
    }
}
