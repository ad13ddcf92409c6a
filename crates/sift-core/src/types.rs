//! Field mapping types shared by the index writer and the aggregation binder.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stored field holding the document identifier.
pub const ID_FIELD: &str = "_id";
/// Stored field holding the JSON-encoded document body.
pub const SOURCE_FIELD: &str = "_source";
/// Indexed, stored and fast date field every document carries.
pub const TIMESTAMP_FIELD: &str = "@timestamp";
/// Analyzed catch-all field receiving every string value of the body.
pub const ALL_FIELD: &str = "_all";

/// Declared type of a mapped field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Analyzed full text.
    Text,
    /// Exact, untokenized string; usable in terms aggregations.
    Keyword,
    Numeric,
    Date,
    Bool,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Keyword => "keyword",
            FieldKind::Numeric => "numeric",
            FieldKind::Date => "date",
            FieldKind::Bool => "bool",
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema snapshot: field name to declared type.
///
/// Reserved fields (`_id`, `_source`, `_all`) are never part of a mapping;
/// `@timestamp` always is, as a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, FieldKind>", into = "BTreeMap<String, FieldKind>")]
pub struct FieldMapping {
    fields: BTreeMap<String, FieldKind>,
}

impl FieldMapping {
    pub fn new() -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(TIMESTAMP_FIELD.to_string(), FieldKind::Date);
        Self { fields }
    }

    /// Adds or replaces a field. Reserved names other than `@timestamp` are ignored.
    pub fn with_field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.insert(name, kind);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, kind: FieldKind) {
        let name = name.into();
        if is_reserved_field(&name) {
            return;
        }
        self.fields.insert(name, kind);
    }

    pub fn get(&self, name: &str) -> Option<FieldKind> {
        self.fields.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, FieldKind)> {
        self.fields.iter().map(|(name, kind)| (name.as_str(), *kind))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<(String, FieldKind)> for FieldMapping {
    fn from_iter<I: IntoIterator<Item = (String, FieldKind)>>(iter: I) -> Self {
        let mut mapping = Self::new();
        for (name, kind) in iter {
            mapping.insert(name, kind);
        }
        mapping
    }
}

impl From<BTreeMap<String, FieldKind>> for FieldMapping {
    fn from(fields: BTreeMap<String, FieldKind>) -> Self {
        fields.into_iter().collect()
    }
}

impl From<FieldMapping> for BTreeMap<String, FieldKind> {
    fn from(mapping: FieldMapping) -> Self {
        mapping.fields
    }
}

/// True for the engine-managed fields a mapping may not redeclare.
pub fn is_reserved_field(name: &str) -> bool {
    matches!(name, ID_FIELD | SOURCE_FIELD | ALL_FIELD | TIMESTAMP_FIELD)
}
