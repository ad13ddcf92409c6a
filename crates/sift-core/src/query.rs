//! Caller-facing query descriptor.
//!
//! A descriptor is read-only to the pipeline: clamping `max_results` returns a
//! new value instead of touching the caller's copy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::SearchSettings;

/// Names the engine uses for its own bookkeeping metrics. User aggregations
/// may not take them.
pub const RESERVED_AGGREGATION_NAMES: [&str; 3] = ["count", "duration", "max_score"];

pub fn is_reserved_aggregation_name(name: &str) -> bool {
    RESERVED_AGGREGATION_NAMES.contains(&name)
}

/// The closed set of supported plan kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SearchType {
    #[default]
    AllDocuments,
    Wildcard,
    Fuzzy,
    Term,
    DateRange,
    MatchAll,
    Match,
    MatchPhrase,
    MultiPhrase,
    Prefix,
    QueryString,
}

impl SearchType {
    pub const ALL: [SearchType; 11] = [
        SearchType::AllDocuments,
        SearchType::Wildcard,
        SearchType::Fuzzy,
        SearchType::Term,
        SearchType::DateRange,
        SearchType::MatchAll,
        SearchType::Match,
        SearchType::MatchPhrase,
        SearchType::MultiPhrase,
        SearchType::Prefix,
        SearchType::QueryString,
    ];

    /// Parses a wire tag. Unknown or empty tags fall back to `AllDocuments`.
    pub fn parse(tag: &str) -> Self {
        match tag {
            "alldocuments" => SearchType::AllDocuments,
            "wildcard" => SearchType::Wildcard,
            "fuzzy" => SearchType::Fuzzy,
            "term" => SearchType::Term,
            "daterange" => SearchType::DateRange,
            "matchall" => SearchType::MatchAll,
            "match" => SearchType::Match,
            "matchphrase" => SearchType::MatchPhrase,
            "multiphrase" => SearchType::MultiPhrase,
            "prefix" => SearchType::Prefix,
            "querystring" => SearchType::QueryString,
            _ => SearchType::AllDocuments,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            SearchType::AllDocuments => "alldocuments",
            SearchType::Wildcard => "wildcard",
            SearchType::Fuzzy => "fuzzy",
            SearchType::Term => "term",
            SearchType::DateRange => "daterange",
            SearchType::MatchAll => "matchall",
            SearchType::Match => "match",
            SearchType::MatchPhrase => "matchphrase",
            SearchType::MultiPhrase => "multiphrase",
            SearchType::Prefix => "prefix",
            SearchType::QueryString => "querystring",
        }
    }
}

impl From<String> for SearchType {
    fn from(tag: String) -> Self {
        SearchType::parse(&tag)
    }
}

impl From<SearchType> for String {
    fn from(kind: SearchType) -> Self {
        kind.tag().to_string()
    }
}

impl std::fmt::Display for SearchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Per-kind parameters. Each plan builder reads the subset it needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryParams {
    /// Term, pattern, prefix, text or query string depending on the kind.
    pub term: Option<String>,
    /// Multi-phrase input: one list of alternatives per position.
    pub terms: Vec<Vec<String>>,
    pub field: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub boost: Option<f32>,
    /// Edit distance for fuzzy queries.
    pub fuzziness: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationKind {
    #[serde(alias = "term")]
    Terms,
    Range,
    Histogram,
    DateHistogram,
    Avg,
    Min,
    Max,
    Sum,
    Stats,
    Count,
}

impl AggregationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AggregationKind::Terms => "terms",
            AggregationKind::Range => "range",
            AggregationKind::Histogram => "histogram",
            AggregationKind::DateHistogram => "date_histogram",
            AggregationKind::Avg => "avg",
            AggregationKind::Min => "min",
            AggregationKind::Max => "max",
            AggregationKind::Sum => "sum",
            AggregationKind::Stats => "stats",
            AggregationKind::Count => "count",
        }
    }

    /// Bucket aggregations may carry nested aggregations.
    pub fn is_bucket(self) -> bool {
        matches!(
            self,
            AggregationKind::Terms
                | AggregationKind::Range
                | AggregationKind::Histogram
                | AggregationKind::DateHistogram
        )
    }
}

impl std::fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationRange {
    pub key: Option<String>,
    pub from: Option<f64>,
    pub to: Option<f64>,
}

/// One user-declared aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationSpec {
    pub agg_type: AggregationKind,
    pub field: String,
    /// Bucket count for terms aggregations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ranges: Vec<AggregationRange>,
    /// Bucket width for histograms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<f64>,
    /// Calendar-free interval for date histograms, e.g. `1d` or `30m`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_interval: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aggs: BTreeMap<String, AggregationSpec>,
}

impl AggregationSpec {
    pub fn new(agg_type: AggregationKind, field: impl Into<String>) -> Self {
        Self {
            agg_type,
            field: field.into(),
            size: None,
            ranges: Vec::new(),
            interval: None,
            fixed_interval: None,
            aggs: BTreeMap::new(),
        }
    }
}

/// What a caller asks for: a plan kind, its parameters, a result cap and
/// optional named aggregations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    #[serde(default)]
    pub search_type: SearchType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,
    #[serde(default)]
    pub query: QueryParams,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aggs: BTreeMap<String, AggregationSpec>,
}

impl QueryDescriptor {
    pub fn new(search_type: SearchType) -> Self {
        Self { search_type, ..Self::default() }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.query.term = Some(term.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.query.field = Some(field.into());
        self
    }

    pub fn with_aggregation(mut self, name: impl Into<String>, spec: AggregationSpec) -> Self {
        self.aggs.insert(name.into(), spec);
        self
    }

    /// Returns a copy whose `max_results` is resolved against the settings:
    /// defaulted when absent, capped at the ceiling. Applying it twice is a no-op.
    pub fn clamped(&self, settings: &SearchSettings) -> Self {
        let requested = self.max_results.unwrap_or(settings.default_max_results);
        Self { max_results: Some(requested.min(settings.max_results)), ..self.clone() }
    }

    /// The result cap a plan should use.
    pub fn effective_max_results(&self) -> usize {
        self.max_results.unwrap_or_else(|| SearchSettings::default().default_max_results)
    }
}
