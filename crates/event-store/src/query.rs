use crate::AggregateId;

/// Filter for reading events across aggregates.
///
/// `payload_contains` matches events whose JSON payload contains the given
/// document, with the semantics of PostgreSQL's `jsonb @>` operator.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub aggregate_id: Option<AggregateId>,
    pub aggregate_type: Option<String>,

    /// Any of these event types.
    pub event_types: Option<Vec<String>>,

    pub payload_contains: Option<serde_json::Value>,

    pub limit: Option<usize>,
}

impl EventQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query over every event of one aggregate type.
    pub fn for_aggregate_type(aggregate_type: impl Into<String>) -> Self {
        Self {
            aggregate_type: Some(aggregate_type.into()),
            ..Default::default()
        }
    }

    pub fn aggregate_id(mut self, id: AggregateId) -> Self {
        self.aggregate_id = Some(id);
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_types = Some(vec![event_type.into()]);
        self
    }

    pub fn payload_contains(mut self, document: serde_json::Value) -> Self {
        self.payload_contains = Some(document);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Returns true if `document` contains `pattern` (`jsonb @>` semantics).
///
/// Objects match when every key of the pattern is present and matches
/// recursively; arrays match when every pattern element is contained in some
/// document element; scalars match on equality.
pub fn json_contains(document: &serde_json::Value, pattern: &serde_json::Value) -> bool {
    use serde_json::Value;

    match (document, pattern) {
        (Value::Object(doc), Value::Object(pat)) => pat
            .iter()
            .all(|(key, value)| doc.get(key).is_some_and(|d| json_contains(d, value))),
        (Value::Array(doc), Value::Array(pat)) => pat
            .iter()
            .all(|value| doc.iter().any(|d| json_contains(d, value))),
        (doc, pat) => doc == pat,
    }
}
