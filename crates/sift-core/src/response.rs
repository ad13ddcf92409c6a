//! Response envelope returned to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// User-visible aggregation results keyed by aggregation name.
pub type AggregationMap = BTreeMap<String, serde_json::Value>;

/// A single denormalized search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    #[serde(rename = "_index")]
    pub index: String,
    /// Mirrors `index`.
    #[serde(rename = "_type")]
    pub type_name: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_score")]
    pub score: f64,
    /// UNIX epoch when the document carried no readable timestamp.
    #[serde(rename = "@timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "_source")]
    pub source: serde_json::Value,
}

impl Hit {
    pub fn new(index: &str, id: String, score: f64) -> Self {
        Self {
            index: index.to_string(),
            type_name: index.to_string(),
            id,
            score,
            timestamp: DateTime::<Utc>::default(),
            source: serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Total {
    pub value: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hits {
    pub total: Total,
    pub max_score: f64,
    pub hits: Vec<Hit>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Milliseconds spent executing the plan.
    pub took: u64,
    pub hits: Hits,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aggregations: AggregationMap,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl SearchResponse {
    /// Envelope for a request rejected before execution.
    pub fn from_error(message: impl Into<String>) -> Self {
        Self { error: message.into(), ..Self::default() }
    }
}

/// A fault the pipeline absorbed while still producing a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum SearchWarning {
    SnapshotUnavailable(String),
    ExecutionFailed(String),
    /// Stored fields of one document could not be fully decoded; the hit was kept.
    StoredFields { id: String, reason: String },
    /// The result cursor stopped before exhaustion; earlier hits were kept.
    CursorAborted(String),
    AggregationProjection(String),
}

impl std::fmt::Display for SearchWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchWarning::SnapshotUnavailable(reason) => write!(f, "snapshot unavailable: {reason}"),
            SearchWarning::ExecutionFailed(reason) => write!(f, "execution failed: {reason}"),
            SearchWarning::StoredFields { id, reason } => {
                write!(f, "stored fields of '{id}' not decoded: {reason}")
            }
            SearchWarning::CursorAborted(reason) => write!(f, "result cursor aborted: {reason}"),
            SearchWarning::AggregationProjection(reason) => {
                write!(f, "aggregation results not projected: {reason}")
            }
        }
    }
}

/// A response plus every degraded path taken while building it. An empty
/// `warnings` list means the response is complete.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    pub response: SearchResponse,
    pub warnings: Vec<SearchWarning>,
}

impl SearchOutcome {
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }
}
