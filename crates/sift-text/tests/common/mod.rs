#![allow(dead_code)]

use serde_json::{json, Value};

use sift_core::config::SearchSettings;
use sift_core::types::{FieldKind, FieldMapping};
use sift_text::{SearchService, TextIndex};

pub fn mapping() -> FieldMapping {
    FieldMapping::new()
        .with_field("title", FieldKind::Text)
        .with_field("city", FieldKind::Keyword)
        .with_field("price", FieldKind::Numeric)
        .with_field("in_stock", FieldKind::Bool)
}

pub fn documents() -> Vec<(&'static str, Value)> {
    vec![
        ("d1", json!({ "title": "The quick brown fox", "city": "Oslo", "price": 10, "in_stock": true, "@timestamp": "2024-01-01T00:00:00Z" })),
        ("d2", json!({ "title": "A lazy dog sleeps", "city": "Bergen", "price": 20, "in_stock": false, "@timestamp": "2024-02-01T00:00:00Z" })),
        ("d3", json!({ "title": "Quick thinking fox", "city": "Oslo", "price": 30, "in_stock": true, "@timestamp": "2024-03-01T00:00:00Z" })),
    ]
}

pub fn populated_index() -> TextIndex {
    let index = TextIndex::create_in_ram("products", mapping()).expect("index");
    for (id, body) in documents() {
        index.index_document(id, &body).expect("index document");
    }
    index.commit().expect("commit");
    index
}

pub fn service() -> SearchService<TextIndex> {
    SearchService::new(populated_index(), SearchSettings::default())
}

pub fn ids(hits: &[sift_core::response::Hit]) -> Vec<&str> {
    hits.iter().map(|h| h.id.as_str()).collect()
}
