//! Turns cursor matches into hits.

use tantivy::schema::{Field, Schema, Value};
use tantivy::TantivyDocument;

use sift_core::response::{Hit, SearchWarning};
use sift_core::types::{ID_FIELD, SOURCE_FIELD, TIMESTAMP_FIELD};

use crate::executor::{DocumentMatch, ResultCursor};

/// The three stored fields a hit is built from. Everything else is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoredFields {
	id: Option<Field>,
	source: Option<Field>,
	timestamp: Option<Field>,
}

impl StoredFields {
	pub fn resolve(schema: &Schema) -> Self {
		Self {
			id: schema.get_field(ID_FIELD).ok(),
			source: schema.get_field(SOURCE_FIELD).ok(),
			timestamp: schema.get_field(TIMESTAMP_FIELD).ok(),
		}
	}
}

/// Lazily drains a cursor into hits, in cursor order.
///
/// A document whose stored fields do not fully decode is still emitted with
/// what did decode. A cursor error ends the sequence; hits already yielded
/// stand. Both cases are logged and kept as warnings.
pub struct Hydrator<'s> {
	cursor: ResultCursor<'s>,
	fields: StoredFields,
	index_name: String,
	warnings: Vec<SearchWarning>,
}

impl<'s> Hydrator<'s> {
	pub fn new(cursor: ResultCursor<'s>, fields: StoredFields, index_name: &str) -> Self {
		Self { cursor, fields, index_name: index_name.to_string(), warnings: Vec::new() }
	}

	pub fn into_warnings(self) -> Vec<SearchWarning> { self.warnings }

	fn hydrate(&mut self, doc_match: DocumentMatch<'_>) -> Hit {
		let mut hit = Hit::new(&self.index_name, String::new(), f64::from(doc_match.score));
		let doc: TantivyDocument = match doc_match.stored_document() {
			Ok(doc) => doc,
			Err(e) => {
				let at = format!("{}:{}", doc_match.address.segment_ord, doc_match.address.doc_id);
				self.stored_field_failure(at, e.to_string());
				return hit;
			}
		};

		if let Some(id) = self.fields.id.and_then(|f| doc.get_first(f)).and_then(|v| v.as_str()) {
			hit.id = id.to_string();
		}
		if let Some(raw) = self.fields.source.and_then(|f| doc.get_first(f)).and_then(|v| v.as_str()) {
			match serde_json::from_str(raw) {
				Ok(source) => hit.source = source,
				Err(e) => self.stored_field_failure(hit.id.clone(), format!("_source: {}", e)),
			}
		}
		if let Some(ts) = self.fields.timestamp.and_then(|f| doc.get_first(f)).and_then(|v| v.as_datetime()) {
			if let Some(timestamp) = chrono::DateTime::from_timestamp_micros(ts.into_timestamp_micros()) {
				hit.timestamp = timestamp;
			}
		}
		hit
	}

	fn stored_field_failure(&mut self, id: String, reason: String) {
		tracing::warn!(index = %self.index_name, doc = %id, %reason, "error accessing stored fields");
		self.warnings.push(SearchWarning::StoredFields { id, reason });
	}
}

impl Iterator for Hydrator<'_> {
	type Item = Hit;

	fn next(&mut self) -> Option<Hit> {
		match self.cursor.next()? {
			Ok(doc_match) => Some(self.hydrate(doc_match)),
			Err(e) => {
				tracing::warn!(index = %self.index_name, error = %e, "error iterating results");
				self.warnings.push(SearchWarning::CursorAborted(e.to_string()));
				None
			}
		}
	}
}
