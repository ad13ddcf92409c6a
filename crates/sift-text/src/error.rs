use thiserror::Error;

use sift_core::query::{AggregationKind, SearchType};
use sift_core::response::SearchResponse;
use sift_core::types::FieldKind;

/// A query descriptor that cannot be turned into a plan.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("{kind} query requires '{param}'")]
    MissingParameter { kind: SearchType, param: &'static str },

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("field '{field}' cannot be used by a {kind} query: {reason}")]
    FieldType { kind: SearchType, field: String, reason: String },

    #[error("invalid '{param}' for {kind} query: {reason}")]
    InvalidParameter { kind: SearchType, param: &'static str, reason: String },

    #[error("query string could not be parsed: {0}")]
    QueryString(String),
}

/// An aggregation definition rejected against the field mapping.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("aggregation name '{0}' is reserved")]
    ReservedName(String),

    #[error("aggregation '{agg}' references unknown field '{field}'")]
    UnknownField { agg: String, field: String },

    #[error("aggregation '{agg}' of type {kind} cannot target {field_kind} field '{field}'")]
    FieldType { agg: String, kind: AggregationKind, field: String, field_kind: FieldKind },

    #[error("aggregation '{agg}' is invalid: {reason}")]
    Invalid { agg: String, reason: String },
}

/// The cursor could not advance past the current position.
#[derive(Debug, Error)]
#[error("document {doc} of segment {segment} is outside the snapshot ({segments} segments)")]
pub struct CursorError {
    pub segment: u32,
    pub doc: u32,
    pub segments: usize,
}

/// Failures that abort a request before execution.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Mapping(#[from] sift_core::error::Error),
}

/// A rejected request: the error plus the envelope mirroring it.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct SearchFailure {
    pub response: SearchResponse,
    #[source]
    pub error: SearchError,
}

impl From<SearchError> for SearchFailure {
    fn from(error: SearchError) -> Self {
        Self { response: SearchResponse::from_error(error.to_string()), error }
    }
}
