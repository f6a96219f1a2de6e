//! Kubernetes audit events.
//!
//! Only the subset of the `audit.k8s.io/v1` `Event` schema that is mapped to
//! log attributes is modelled here. Decoding is permissive: unknown fields are
//! ignored, and missing or `null` fields decode to their empty value.

mod attributes;

use std::path::{Path, PathBuf};

pub use attributes::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// A single audit event as written by the API server's log backend.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuditEvent {
    #[serde(deserialize_with = "null_as_default")]
    pub level: String,

    #[serde(rename = "auditID", deserialize_with = "null_as_default")]
    pub audit_id: String,

    #[serde(deserialize_with = "null_as_default")]
    pub stage: String,

    #[serde(rename = "requestURI", deserialize_with = "null_as_default")]
    pub request_uri: String,

    #[serde(deserialize_with = "null_as_default")]
    pub verb: String,

    #[serde(deserialize_with = "null_as_default")]
    pub user: UserInfo,

    #[serde(rename = "sourceIPs", deserialize_with = "null_as_default")]
    pub source_ips: Vec<String>,

    #[serde(deserialize_with = "null_as_default")]
    pub user_agent: String,

    #[serde(deserialize_with = "null_as_default")]
    pub object_ref: ObjectReference,

    /// Embedded API object of the request, kept as raw JSON.
    pub request_object: Option<serde_json::Value>,

    /// Embedded API object of the response, kept as raw JSON.
    pub response_object: Option<serde_json::Value>,

    /// `metav1.Status` returned to the client, kept as raw JSON.
    pub response_status: Option<serde_json::Value>,

    pub request_received_timestamp: Option<DateTime<Utc>>,

    pub stage_timestamp: Option<DateTime<Utc>>,
}

/// Authenticated user that made the request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UserInfo {
    #[serde(deserialize_with = "null_as_default")]
    pub username: String,

    #[serde(deserialize_with = "null_as_default")]
    pub uid: String,

    #[serde(deserialize_with = "null_as_default")]
    pub groups: Vec<String>,
}

/// Object the request was about.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObjectReference {
    #[serde(deserialize_with = "null_as_default")]
    pub uid: String,

    #[serde(deserialize_with = "null_as_default")]
    pub resource: String,

    #[serde(deserialize_with = "null_as_default")]
    pub name: String,

    #[serde(deserialize_with = "null_as_default")]
    pub namespace: String,

    #[serde(deserialize_with = "null_as_default")]
    pub api_group: String,

    #[serde(deserialize_with = "null_as_default")]
    pub api_version: String,

    #[serde(deserialize_with = "null_as_default")]
    pub resource_version: String,
}

/// Errors from loading an audit event.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Failed to read audit event {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode audit event {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl AuditEvent {
    /// Decode an event from JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Read the file at `path` and decode it as one audit event.
pub fn load_event(path: impl AsRef<Path>) -> Result<AuditEvent, AuditError> {
    let path = path.as_ref();

    let bytes = std::fs::read(path).map_err(|source| AuditError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let event = AuditEvent::from_slice(&bytes).map_err(|source| AuditError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(
        path = %path.display(),
        bytes = bytes.len(),
        audit_id = %event.audit_id,
        "Loaded audit event"
    );

    Ok(event)
}

/// Treat an explicit JSON `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
