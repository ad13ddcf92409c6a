use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tantivy::schema::Field;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, Searcher, TantivyDocument, Term};

use sift_core::error::Error as CoreError;
use sift_core::traits::MappingStore;
use sift_core::types::{FieldKind, FieldMapping, ALL_FIELD, ID_FIELD, SOURCE_FIELD, TIMESTAMP_FIELD};

use crate::schema::{build_schema, mapping_from_schema, register_analyzers};

const WRITER_HEAP_BYTES: usize = 50_000_000;

/// Long-lived handle the pipeline takes per-request snapshots from.
pub trait IndexHandle: Send + Sync {
	fn name(&self) -> &str;
	fn index(&self) -> &Index;
	/// A fresh point-in-time view. Dropping it releases the segments it pins.
	fn snapshot(&self) -> tantivy::Result<Searcher>;
}

pub struct TextIndex {
	name: String,
	index: Index,
	reader: IndexReader,
	/// Opened on the first write. Search-only handles never take the directory lock.
	writer: Mutex<Option<IndexWriter>>,
	mapping: FieldMapping,
	id_field: Field,
	source_field: Field,
	timestamp_field: Field,
	all_field: Field,
	mapped_fields: BTreeMap<String, (Field, FieldKind)>,
}

impl TextIndex {
	pub fn create_in_ram(name: &str, mapping: FieldMapping) -> Result<Self, anyhow::Error> {
		let index = Index::create_in_ram(build_schema(&mapping));
		Self::from_index(name, index)
	}

	/// Recreates `index_dir` from scratch.
	pub fn create_in_dir(name: &str, index_dir: PathBuf, mapping: FieldMapping) -> Result<Self, anyhow::Error> {
		if index_dir.exists() { std::fs::remove_dir_all(&index_dir)?; }
		std::fs::create_dir_all(&index_dir)?;
		let index = Index::create_in_dir(&index_dir, build_schema(&mapping))?;
		Self::from_index(name, index)
	}

	pub fn open_in_dir(name: &str, index_dir: PathBuf) -> Result<Self, anyhow::Error> {
		let index = Index::open_in_dir(&index_dir)?;
		Self::from_index(name, index)
	}

	fn from_index(name: &str, index: Index) -> Result<Self, anyhow::Error> {
		register_analyzers(&index);
		let schema = index.schema();
		let mapping = mapping_from_schema(&schema);
		let id_field = schema.get_field(ID_FIELD)?;
		let source_field = schema.get_field(SOURCE_FIELD)?;
		let timestamp_field = schema.get_field(TIMESTAMP_FIELD)?;
		let all_field = schema.get_field(ALL_FIELD)?;
		let mut mapped_fields = BTreeMap::new();
		for (field_name, kind) in mapping.iter() {
			if field_name == TIMESTAMP_FIELD { continue; }
			mapped_fields.insert(field_name.to_string(), (schema.get_field(field_name)?, kind));
		}
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		Ok(Self {
			name: name.to_string(),
			index,
			reader,
			writer: Mutex::new(None),
			mapping,
			id_field,
			source_field,
			timestamp_field,
			all_field,
			mapped_fields,
		})
	}

	pub fn mapping(&self) -> &FieldMapping { &self.mapping }

	/// Adds or replaces the document with this id. Visible after `commit`.
	///
	/// `@timestamp` is read from the body (RFC 3339 or epoch millis) and
	/// defaults to now. Mapped fields whose values do not convert are skipped.
	pub fn index_document(&self, id: &str, body: &JsonValue) -> Result<()> {
		let object = body.as_object().ok_or_else(|| anyhow!("document '{}' must be a JSON object", id))?;
		let mut doc = TantivyDocument::new();
		doc.add_text(self.id_field, id);
		doc.add_text(self.source_field, serde_json::to_string(body)?);
		let timestamp = object.get(TIMESTAMP_FIELD).and_then(parse_date).unwrap_or_else(Utc::now);
		doc.add_date(self.timestamp_field, to_engine_date(timestamp));

		let mut strings = Vec::new();
		collect_strings(body, &mut strings);
		for s in strings { doc.add_text(self.all_field, s); }

		for (field_name, value) in object {
			let Some((field, kind)) = self.mapped_fields.get(field_name) else { continue };
			if !add_value(&mut doc, *field, *kind, value) {
				tracing::warn!(index = %self.name, doc = id, field = %field_name, kind = %kind, "value does not match field type; skipped");
			}
		}

		self.with_writer(|writer| {
			writer.delete_term(Term::from_field_text(self.id_field, id));
			writer.add_document(doc).map(|_| ())
		})
	}

	/// Low-level insert of a prepared document.
	pub fn add_document(&self, doc: TantivyDocument) -> Result<()> {
		self.with_writer(|writer| writer.add_document(doc).map(|_| ()))
	}

	/// Commits pending writes, if this handle ever wrote, and reloads the reader.
	pub fn commit(&self) -> Result<()> {
		let mut guard = self.writer.lock().map_err(|_| anyhow!("index writer lock poisoned"))?;
		if let Some(writer) = guard.as_mut() {
			writer.commit()?;
		}
		drop(guard);
		self.reader.reload()?;
		Ok(())
	}

	/// Whether this handle holds the directory's writer lock.
	pub fn is_writing(&self) -> bool {
		self.writer.lock().map(|guard| guard.is_some()).unwrap_or(false)
	}

	fn with_writer<T>(&self, write: impl FnOnce(&mut IndexWriter) -> tantivy::Result<T>) -> Result<T> {
		let mut guard = self.writer.lock().map_err(|_| anyhow!("index writer lock poisoned"))?;
		if guard.is_none() {
			let writer: IndexWriter = self.index.writer_with_num_threads(1, WRITER_HEAP_BYTES)?;
			tracing::debug!(index = %self.name, "opened index writer");
			*guard = Some(writer);
		}
		let writer = guard.as_mut().ok_or_else(|| anyhow!("index writer unavailable"))?;
		Ok(write(writer)?)
	}
}

impl IndexHandle for TextIndex {
	fn name(&self) -> &str { &self.name }

	fn index(&self) -> &Index { &self.index }

	fn snapshot(&self) -> tantivy::Result<Searcher> {
		self.reader.reload()?;
		Ok(self.reader.searcher())
	}
}

impl MappingStore for TextIndex {
	fn stored_mapping(&self) -> Result<FieldMapping, CoreError> { Ok(self.mapping.clone()) }
}

fn add_value(doc: &mut TantivyDocument, field: Field, kind: FieldKind, value: &JsonValue) -> bool {
	match (kind, value) {
		(_, JsonValue::Null) => true,
		(_, JsonValue::Array(items)) => items.iter().fold(true, |ok, item| add_value(doc, field, kind, item) && ok),
		(FieldKind::Text | FieldKind::Keyword, JsonValue::String(s)) => { doc.add_text(field, s); true }
		(FieldKind::Text | FieldKind::Keyword, JsonValue::Number(n)) => { doc.add_text(field, n.to_string()); true }
		(FieldKind::Text | FieldKind::Keyword, JsonValue::Bool(b)) => { doc.add_text(field, b.to_string()); true }
		(FieldKind::Numeric, JsonValue::Number(n)) => match n.as_f64() { Some(v) => { doc.add_f64(field, v); true } None => false },
		(FieldKind::Numeric, JsonValue::String(s)) => match s.trim().parse::<f64>() { Ok(v) => { doc.add_f64(field, v); true } Err(_) => false },
		(FieldKind::Bool, JsonValue::Bool(b)) => { doc.add_bool(field, *b); true }
		(FieldKind::Date, v) => match parse_date(v) { Some(dt) => { doc.add_date(field, to_engine_date(dt)); true } None => false },
		_ => false,
	}
}

fn collect_strings<'a>(value: &'a JsonValue, out: &mut Vec<&'a str>) {
	match value {
		JsonValue::String(s) => out.push(s),
		JsonValue::Array(items) => for item in items { collect_strings(item, out); },
		JsonValue::Object(map) => for item in map.values() { collect_strings(item, out); },
		_ => {}
	}
}

/// RFC 3339 strings or integer epoch milliseconds.
pub(crate) fn parse_date(value: &JsonValue) -> Option<DateTime<Utc>> {
	match value {
		JsonValue::String(s) => DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc)),
		JsonValue::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
		_ => None,
	}
}

pub(crate) fn to_engine_date(dt: DateTime<Utc>) -> tantivy::DateTime {
	tantivy::DateTime::from_timestamp_micros(dt.timestamp_micros())
}
