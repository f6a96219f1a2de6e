//! Projection of an audit event onto log record attributes.
//!
//! Every event produces the same 22 attributes in the same order, whatever
//! fields the event actually carried. Unset fields map to empty values.

use chrono::{DateTime, SecondsFormat, Utc};
use opentelemetry::{Key, logs::AnyValue};

use super::AuditEvent;

/// Separator used to flatten multi-valued fields into one string.
///
/// Values that themselves contain a comma cannot be recovered after joining.
pub const JOIN_SEPARATOR: &str = ",";

/// Value of a mapped audit attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// A scalar string field.
    Text(String),
    /// A multi-valued field joined with [`JOIN_SEPARATOR`].
    Joined(String),
    /// An embedded JSON document, passed through without interpretation.
    Document(Option<serde_json::Value>),
    /// A request or stage timestamp.
    Timestamp(Option<DateTime<Utc>>),
}

/// One `audit.*` attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct LogAttribute {
    pub key: &'static str,
    pub value: AttributeValue,
}

impl LogAttribute {
    fn new(key: &'static str, value: AttributeValue) -> Self {
        Self { key, value }
    }

    fn text(key: &'static str, value: &str) -> Self {
        Self::new(key, AttributeValue::Text(value.to_string()))
    }

    fn joined(key: &'static str, values: &[String]) -> Self {
        Self::new(key, AttributeValue::Joined(values.join(JOIN_SEPARATOR)))
    }

    fn document(key: &'static str, value: &Option<serde_json::Value>) -> Self {
        Self::new(key, AttributeValue::Document(value.clone()))
    }

    fn timestamp(key: &'static str, value: Option<DateTime<Utc>>) -> Self {
        Self::new(key, AttributeValue::Timestamp(value))
    }
}

/// Attribute keys in emission order.
#[cfg(test)]
pub const ATTRIBUTE_KEYS: [&str; 22] = [
    "audit.level",
    "audit.auditID",
    "audit.stage",
    "audit.requestURI",
    "audit.verb",
    "audit.user.username",
    "audit.user.uid",
    "audit.user.groups",
    "audit.sourceIPs",
    "audit.userAgent",
    "audit.objectRef.uid",
    "audit.objectRef.resource",
    "audit.objectRef.name",
    "audit.objectRef.namespace",
    "audit.objectRef.apiGroup",
    "audit.objectRef.apiVersion",
    "audit.objectRef.resourceVersion",
    "audit.requestObject",
    "audit.responseObject",
    "audit.responseStatus",
    "audit.requestReceivedTimestamp",
    "audit.stageTimestamp",
];

/// Map an audit event to its log attributes, always in the same order.
pub fn map_to_attributes(event: &AuditEvent) -> Vec<LogAttribute> {
    let user = &event.user;
    let object_ref = &event.object_ref;

    vec![
        LogAttribute::text("audit.level", &event.level),
        LogAttribute::text("audit.auditID", &event.audit_id),
        LogAttribute::text("audit.stage", &event.stage),
        LogAttribute::text("audit.requestURI", &event.request_uri),
        LogAttribute::text("audit.verb", &event.verb),
        LogAttribute::text("audit.user.username", &user.username),
        LogAttribute::text("audit.user.uid", &user.uid),
        LogAttribute::joined("audit.user.groups", &user.groups),
        LogAttribute::joined("audit.sourceIPs", &event.source_ips),
        LogAttribute::text("audit.userAgent", &event.user_agent),
        LogAttribute::text("audit.objectRef.uid", &object_ref.uid),
        LogAttribute::text("audit.objectRef.resource", &object_ref.resource),
        LogAttribute::text("audit.objectRef.name", &object_ref.name),
        LogAttribute::text("audit.objectRef.namespace", &object_ref.namespace),
        LogAttribute::text("audit.objectRef.apiGroup", &object_ref.api_group),
        LogAttribute::text("audit.objectRef.apiVersion", &object_ref.api_version),
        LogAttribute::text(
            "audit.objectRef.resourceVersion",
            &object_ref.resource_version,
        ),
        LogAttribute::document("audit.requestObject", &event.request_object),
        LogAttribute::document("audit.responseObject", &event.response_object),
        LogAttribute::document("audit.responseStatus", &event.response_status),
        LogAttribute::timestamp(
            "audit.requestReceivedTimestamp",
            event.request_received_timestamp,
        ),
        LogAttribute::timestamp("audit.stageTimestamp", event.stage_timestamp),
    ]
}

impl LogAttribute {
    /// The attribute as an OpenTelemetry key/value pair.
    pub fn into_key_value(self) -> (Key, AnyValue) {
        (Key::from_static_str(self.key), self.value.into())
    }
}

impl From<AttributeValue> for AnyValue {
    fn from(value: AttributeValue) -> Self {
        match value {
            AttributeValue::Text(s) | AttributeValue::Joined(s) => AnyValue::from(s),
            AttributeValue::Document(Some(doc)) => json_to_any_value(doc),
            AttributeValue::Document(None) => AnyValue::from(String::new()),
            AttributeValue::Timestamp(Some(ts)) => {
                AnyValue::from(ts.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
            AttributeValue::Timestamp(None) => AnyValue::from(String::new()),
        }
    }
}

/// Convert a JSON document into the equivalent structured log value.
///
/// JSON `null` has no log value counterpart and becomes an empty string.
fn json_to_any_value(value: serde_json::Value) -> AnyValue {
    match value {
        serde_json::Value::Null => AnyValue::from(String::new()),
        serde_json::Value::Bool(b) => AnyValue::Boolean(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => AnyValue::Int(i),
            None => AnyValue::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => AnyValue::from(s),
        serde_json::Value::Array(items) => AnyValue::ListAny(Box::new(
            items.into_iter().map(json_to_any_value).collect(),
        )),
        serde_json::Value::Object(fields) => AnyValue::Map(Box::new(
            fields
                .into_iter()
                .map(|(k, v)| (Key::new(k), json_to_any_value(v)))
                .collect(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::audit::{UserInfo, fixtures::*};

    fn value_of<'a>(attrs: &'a [LogAttribute], key: &str) -> &'a AttributeValue {
        &attrs
            .iter()
            .find(|a| a.key == key)
            .unwrap_or_else(|| panic!("missing attribute {key}"))
            .value
    }

    fn as_string(value: AnyValue) -> String {
        match value {
            AnyValue::String(s) => s.as_str().to_string(),
            other => panic!("expected string value, got {other:?}"),
        }
    }

    #[test]
    fn test_keys_complete_and_ordered() {
        let event = AuditEvent::from_slice(POD_GET_EVENT.as_bytes()).unwrap();
        let keys: Vec<&str> = map_to_attributes(&event).iter().map(|a| a.key).collect();

        assert_eq!(keys, ATTRIBUTE_KEYS);
    }

    #[test]
    fn test_keys_are_unique() {
        let mut keys = ATTRIBUTE_KEYS.to_vec();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), ATTRIBUTE_KEYS.len());
    }

    #[test]
    fn test_full_event_values() {
        let event = AuditEvent::from_slice(POD_GET_EVENT.as_bytes()).unwrap();
        let attrs = map_to_attributes(&event);

        assert_eq!(
            value_of(&attrs, "audit.verb"),
            &AttributeValue::Text("get".into())
        );
        assert_eq!(
            value_of(&attrs, "audit.user.groups"),
            &AttributeValue::Joined("system:serviceaccounts,system:authenticated".into())
        );
        assert_eq!(
            value_of(&attrs, "audit.sourceIPs"),
            &AttributeValue::Joined("10.0.0.12,192.168.1.4".into())
        );
        assert_eq!(
            value_of(&attrs, "audit.objectRef.namespace"),
            &AttributeValue::Text("default".into())
        );
        assert!(matches!(
            value_of(&attrs, "audit.responseObject"),
            AttributeValue::Document(Some(_))
        ));
    }

    #[rstest]
    #[case(&["a", "b"], "a,b")]
    #[case(&["system:masters"], "system:masters")]
    #[case(&[], "")]
    #[case(&["x,y", "z"], "x,y,z")]
    fn test_groups_join(#[case] groups: &[&str], #[case] expected: &str) {
        let event = AuditEvent {
            user: UserInfo {
                groups: groups.iter().map(|g| g.to_string()).collect(),
                ..Default::default()
            },
            ..Default::default()
        };
        let attrs = map_to_attributes(&event);

        assert_eq!(
            value_of(&attrs, "audit.user.groups"),
            &AttributeValue::Joined(expected.to_string())
        );
    }

    #[test]
    fn test_minimal_event_maps_to_empty_values() {
        let event = AuditEvent::from_slice(MINIMAL_EVENT.as_bytes()).unwrap();
        let attrs = map_to_attributes(&event);

        assert_eq!(attrs.len(), ATTRIBUTE_KEYS.len());
        assert_eq!(
            value_of(&attrs, "audit.auditID"),
            &AttributeValue::Text("abc-123".into())
        );
        assert_eq!(
            value_of(&attrs, "audit.user.username"),
            &AttributeValue::Text(String::new())
        );
        assert_eq!(
            value_of(&attrs, "audit.sourceIPs"),
            &AttributeValue::Joined(String::new())
        );
        assert_eq!(
            value_of(&attrs, "audit.objectRef.resourceVersion"),
            &AttributeValue::Text(String::new())
        );
        assert_eq!(
            value_of(&attrs, "audit.requestObject"),
            &AttributeValue::Document(None)
        );
        assert_eq!(
            value_of(&attrs, "audit.stageTimestamp"),
            &AttributeValue::Timestamp(None)
        );

        for attr in attrs.into_iter().skip(5) {
            let (_, value) = attr.into_key_value();
            assert_eq!(as_string(value), "");
        }
    }

    #[test]
    fn test_timestamp_rendered_with_microseconds() {
        let event = AuditEvent::from_slice(POD_GET_EVENT.as_bytes()).unwrap();
        let attr = map_to_attributes(&event)
            .into_iter()
            .find(|a| a.key == "audit.requestReceivedTimestamp")
            .unwrap();

        let (key, value) = attr.into_key_value();
        assert_eq!(key.as_str(), "audit.requestReceivedTimestamp");
        assert_eq!(as_string(value), "2024-05-14T09:21:07.123456Z");
    }

    #[test]
    fn test_document_becomes_structured_value() {
        let doc = serde_json::json!({
            "code": 404,
            "reason": "NotFound",
            "ratio": 0.5,
            "retry": false,
            "causes": [{"field": "name"}],
            "details": null
        });
        let value = AnyValue::from(AttributeValue::Document(Some(doc)));

        let AnyValue::Map(map) = value else {
            panic!("expected map value");
        };
        assert_eq!(map.get(&Key::from_static_str("code")), Some(&AnyValue::Int(404)));
        assert_eq!(
            map.get(&Key::from_static_str("reason")),
            Some(&AnyValue::from("NotFound".to_string()))
        );
        assert_eq!(
            map.get(&Key::from_static_str("ratio")),
            Some(&AnyValue::Double(0.5))
        );
        assert_eq!(
            map.get(&Key::from_static_str("retry")),
            Some(&AnyValue::Boolean(false))
        );
        assert!(matches!(
            map.get(&Key::from_static_str("causes")),
            Some(AnyValue::ListAny(items)) if items.len() == 1
        ));
        assert_eq!(
            map.get(&Key::from_static_str("details")),
            Some(&AnyValue::from(String::new()))
        );
    }
}
