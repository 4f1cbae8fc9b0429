use crate::http::TransportError;
use crate::support::retry::{Fault, FaultKind, RetryError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Ordered sequence of groups, exactly as returned by the classifier.
pub type Hierarchy = Vec<Group>;

/// A node classification group.
///
/// The group keeps every field of the source document in its original order.
/// Only `name`, `classes` and `rule` are ever interpreted; environment,
/// variables, parent id and anything else pass through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Group {
    fields: Map<String, Value>,
}

impl Group {
    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }

    pub fn classes(&self) -> Option<&Map<String, Value>> {
        self.fields.get("classes").and_then(Value::as_object)
    }

    /// Class names in document order. Empty when `classes` is absent.
    pub fn class_names(&self) -> Vec<&str> {
        self.classes()
            .map(|classes| classes.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn rule(&self) -> Option<&Value> {
        self.fields.get("rule").filter(|rule| !rule.is_null())
    }

    pub(crate) fn fields_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.fields
    }
}

/// Closed view over the dynamically shaped rule and parameter trees.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueNode {
    Text(String),
    List(Vec<ValueNode>),
    Opaque(Value),
}

impl From<Value> for ValueNode {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => ValueNode::Text(text),
            Value::Array(items) => ValueNode::List(items.into_iter().map(ValueNode::from).collect()),
            other => ValueNode::Opaque(other),
        }
    }
}

impl From<ValueNode> for Value {
    fn from(node: ValueNode) -> Self {
        match node {
            ValueNode::Text(text) => Value::String(text),
            ValueNode::List(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            ValueNode::Opaque(value) => value,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("{0}")]
    Authentication(String),
    #[error("Expected {expected} response, got {actual} body: {body}")]
    Api {
        expected: u16,
        actual: u16,
        body: String,
    },
    #[error("Timeout expired after {attempts} attempt(s) in {elapsed:?}: {source}")]
    Timeout {
        attempts: u32,
        elapsed: Duration,
        source: Box<ClientError>,
    },
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Failed to parse response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Request body already sent {bytes} byte(s) and cannot be replayed: {source}")]
    BodyConsumed { bytes: u64, source: TransportError },
}

impl Fault for ClientError {
    fn kind(&self) -> FaultKind {
        match self {
            ClientError::Transport(e) => e.kind(),
            ClientError::Authentication(_) => FaultKind::Authentication,
            ClientError::Api { .. } => FaultKind::Api,
            ClientError::Timeout { .. } => FaultKind::Timeout,
            ClientError::Configuration(_) => FaultKind::Configuration,
            ClientError::Decode(_) => FaultKind::Decode,
            ClientError::BodyConsumed { .. } => FaultKind::Stream,
        }
    }
}

impl From<RetryError<ClientError>> for ClientError {
    fn from(error: RetryError<ClientError>) -> Self {
        match error {
            RetryError::NoTimeoutGiven => {
                ClientError::Configuration("retry enabled without a timeout".to_string())
            }
            RetryError::Timeout {
                attempts,
                elapsed,
                last,
            } => ClientError::Timeout {
                attempts,
                elapsed,
                source: Box::new(last),
            },
            RetryError::Failed(error) => error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_group_preserves_field_order() {
        let text = r#"{"parent":"00000000-0000-4000-8000-000000000000","name":"g1","environment":"production","classes":{},"variables":{}}"#;
        let group: Group = serde_json::from_str(text).unwrap();
        assert_eq!(group.name(), Some("g1"));
        assert_eq!(serde_json::to_string(&group).unwrap(), text);
    }

    #[test]
    fn test_class_names_in_document_order() {
        let group: Group = serde_json::from_value(json!({
            "name": "g",
            "classes": {"zeta": {}, "alpha": {}, "puppet_enterprise": {}}
        }))
        .unwrap();
        assert_eq!(group.class_names(), vec!["zeta", "alpha", "puppet_enterprise"]);

        let bare: Group = serde_json::from_value(json!({"name": "bare"})).unwrap();
        assert!(bare.class_names().is_empty());
        assert!(bare.rule().is_none());
    }

    #[test]
    fn test_value_node_conversion_keeps_opaque_values() {
        let value = json!(["or", ["=", "name", "a.example"], 42, null, {"k": "v"}]);
        let node = ValueNode::from(value.clone());
        match &node {
            ValueNode::List(items) => {
                assert_eq!(items[0], ValueNode::Text("or".into()));
                assert!(matches!(items[2], ValueNode::Opaque(_)));
                assert!(matches!(items[4], ValueNode::Opaque(_)));
            }
            other => panic!("Expected list, got {:?}", other),
        }
        assert_eq!(Value::from(node), value);
    }

    #[test]
    fn test_retry_errors_flatten_into_client_errors() {
        let failed = ClientError::from(RetryError::Failed(ClientError::Authentication(
            "denied".into(),
        )));
        assert_eq!(failed.kind(), FaultKind::Authentication);

        let timeout = ClientError::from(RetryError::Timeout {
            attempts: 3,
            elapsed: Duration::from_secs(5),
            last: ClientError::Configuration("x".into()),
        });
        assert_eq!(timeout.kind(), FaultKind::Timeout);

        let missing = ClientError::from(RetryError::<ClientError>::NoTimeoutGiven);
        assert_eq!(missing.kind(), FaultKind::Configuration);
    }
}
