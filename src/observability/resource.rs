//! Telemetry resource construction.

use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions::{
    SCHEMA_URL,
    resource::{SERVICE_NAME, SERVICE_VERSION},
};

use crate::config::ServiceConfig;

/// Resource construction errors.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("Conflicting resource schema URLs: default {default} vs service {service}")]
    SchemaConflict { default: String, service: String },
}

/// Build the resource attached to every exported record.
///
/// Platform defaults (SDK telemetry attributes, `OTEL_SERVICE_NAME` and
/// `OTEL_RESOURCE_ATTRIBUTES`, host and process identity) are combined with the
/// configured service name and version. The service attributes win on key
/// collisions.
pub fn build_resource(service: &ServiceConfig) -> Result<Resource, ResourceError> {
    let resource = with_service(&default_resource(), service)?;

    tracing::debug!(
        service_name = %service.name,
        service_version = %service.version,
        attributes = resource.len(),
        "Built telemetry resource"
    );

    Ok(resource)
}

/// Layer the service identity over `defaults` under [`SCHEMA_URL`].
fn with_service(
    defaults: &Resource,
    service: &ServiceConfig,
) -> Result<Resource, ResourceError> {
    if let Some(default) = defaults.schema_url()
        && default != SCHEMA_URL
    {
        return Err(ResourceError::SchemaConflict {
            default: default.to_string(),
            service: SCHEMA_URL.to_string(),
        });
    }

    let inherited = defaults
        .iter()
        .map(|(key, value)| KeyValue::new(key.clone(), value.clone()));

    // Later attributes win; the schema URL is attached without touching them.
    Ok(Resource::builder_empty()
        .with_attributes(inherited)
        .with_attributes([
            KeyValue::new(SERVICE_NAME, service.name.clone()),
            KeyValue::new(SERVICE_VERSION, service.version.clone()),
        ])
        .with_schema_url(Vec::<KeyValue>::new(), SCHEMA_URL)
        .build())
}

/// SDK-detected attributes plus host and process identity.
fn default_resource() -> Resource {
    let mut attrs = vec![KeyValue::new("process.pid", i64::from(std::process::id()))];

    match hostname::get() {
        Ok(name) => attrs.push(KeyValue::new(
            "host.name",
            name.to_string_lossy().into_owned(),
        )),
        Err(e) => tracing::debug!(error = %e, "Could not determine host name"),
    }

    Resource::builder().with_attributes(attrs).build()
}
