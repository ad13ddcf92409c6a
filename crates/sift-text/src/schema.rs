use tantivy::schema::{
    DateOptions, FieldType, IndexRecordOption, NumericOptions, Schema, TextFieldIndexing, TextOptions, STORED, STRING,
};
use tantivy::tokenizer::{LowerCaser, RemoveLongFilter, SimpleTokenizer, TextAnalyzer};
use tantivy::Index;

use sift_core::types::{is_reserved_field, FieldKind, FieldMapping, ALL_FIELD, ID_FIELD, SOURCE_FIELD, TIMESTAMP_FIELD};

/// Analyzer used by text fields and the `_all` catch-all.
pub const STANDARD_ANALYZER: &str = "standard";
const KEYWORD_TOKENIZER: &str = "raw";

fn analyzed_options() -> TextOptions {
	let indexing = TextFieldIndexing::default()
		.set_tokenizer(STANDARD_ANALYZER)
		.set_index_option(IndexRecordOption::WithFreqsAndPositions);
	TextOptions::default().set_indexing_options(indexing)
}

fn keyword_options() -> TextOptions {
	let indexing = TextFieldIndexing::default()
		.set_tokenizer(KEYWORD_TOKENIZER)
		.set_index_option(IndexRecordOption::Basic);
	TextOptions::default().set_indexing_options(indexing).set_fast(None)
}

/// Reserved fields first, then one field per mapped name.
pub fn build_schema(mapping: &FieldMapping) -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_text_field(ID_FIELD, STRING | STORED);
	schema_builder.add_text_field(SOURCE_FIELD, TextOptions::default().set_stored());
	schema_builder.add_date_field(TIMESTAMP_FIELD, DateOptions::default().set_indexed().set_stored().set_fast());
	schema_builder.add_text_field(ALL_FIELD, analyzed_options());
	for (name, kind) in mapping.iter() {
		if is_reserved_field(name) { continue; }
		match kind {
			FieldKind::Text => { schema_builder.add_text_field(name, analyzed_options()); }
			FieldKind::Keyword => { schema_builder.add_text_field(name, keyword_options()); }
			FieldKind::Numeric => { schema_builder.add_f64_field(name, NumericOptions::default().set_indexed().set_fast()); }
			FieldKind::Date => { schema_builder.add_date_field(name, DateOptions::default().set_indexed().set_fast()); }
			FieldKind::Bool => { schema_builder.add_bool_field(name, NumericOptions::default().set_indexed().set_fast()); }
		}
	}
	schema_builder.build()
}

/// Recovers the field mapping an index was created with.
pub fn mapping_from_schema(schema: &Schema) -> FieldMapping {
	let mut mapping = FieldMapping::new();
	for (_, entry) in schema.fields() {
		let name = entry.name();
		if is_reserved_field(name) { continue; }
		let kind = match entry.field_type() {
			FieldType::Str(options) => match options.get_indexing_options() {
				Some(indexing) if indexing.tokenizer() == KEYWORD_TOKENIZER => FieldKind::Keyword,
				Some(_) => FieldKind::Text,
				None => continue,
			},
			FieldType::F64(_) | FieldType::I64(_) | FieldType::U64(_) => FieldKind::Numeric,
			FieldType::Date(_) => FieldKind::Date,
			FieldType::Bool(_) => FieldKind::Bool,
			_ => continue,
		};
		mapping.insert(name, kind);
	}
	mapping
}

pub fn register_analyzers(index: &Index) {
	let analyzer = TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(RemoveLongFilter::limit(40))
		.filter(LowerCaser)
		.build();
	index.tokenizers().register(STANDARD_ANALYZER, analyzer);
}
