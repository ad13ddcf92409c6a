mod common;

use serde_json::json;
use std::sync::Arc;
use std::thread;
use tantivy::{Index, Searcher, TantivyDocument, TantivyError};

use sift_core::config::SearchSettings;
use sift_core::query::{AggregationKind, AggregationSpec, QueryDescriptor, SearchType};
use sift_core::response::SearchWarning;
use sift_core::traits::MappingStore;
use sift_core::types::FieldMapping;
use sift_text::{BindError, IndexHandle, SearchError, SearchService, TextIndex};

fn total(service: &SearchService<TextIndex>, q: QueryDescriptor) -> u64 {
    let outcome = service.search(&q).expect("search");
    assert!(outcome.warnings.is_empty(), "unexpected warnings: {:?}", outcome.warnings);
    outcome.response.hits.total.value
}

#[test]
fn hits_round_trip_id_source_and_timestamp() {
    let service = common::service();
    let outcome = service
        .search(&QueryDescriptor::new(SearchType::Term).with_field("city").with_term("Bergen"))
        .expect("search");
    let hits = &outcome.response.hits.hits;
    assert_eq!(hits.len(), 1);
    let (_, expected) = common::documents().remove(1);
    assert_eq!(hits[0].id, "d2");
    assert_eq!(hits[0].index, "products");
    assert_eq!(hits[0].type_name, "products");
    assert_eq!(hits[0].source, expected);
    assert_eq!(hits[0].timestamp.to_rfc3339(), "2024-02-01T00:00:00+00:00");
    assert!(hits[0].score > 0.0);
}

#[test]
fn total_counts_all_matches_while_hits_are_capped() {
    let service = common::service();
    let outcome = service.search(&QueryDescriptor::new(SearchType::MatchAll).with_max_results(2)).expect("search");
    let hits = &outcome.response.hits;
    assert_eq!(hits.total.value, 3);
    assert_eq!(hits.hits.len(), 2);
    assert!(hits.hits.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(outcome.response.error.is_empty());
    assert!(!outcome.is_degraded());
}

#[test]
fn ceiling_caps_requested_results() {
    let settings = SearchSettings { max_results: 1, default_max_results: 1 };
    let service = SearchService::new(common::populated_index(), settings);
    let outcome = service.search(&QueryDescriptor::new(SearchType::MatchAll).with_max_results(100)).expect("search");
    assert_eq!(outcome.response.hits.total.value, 3);
    assert_eq!(outcome.response.hits.hits.len(), 1);
}

#[test]
fn absent_term_yields_empty_response() {
    let service = common::service();
    let outcome = service.search(&QueryDescriptor::new(SearchType::Term).with_term("zebra")).expect("search");
    assert_eq!(outcome.response.hits.total.value, 0);
    assert!(outcome.response.hits.hits.is_empty());
    assert_eq!(outcome.response.hits.max_score, 0.0);
    assert!(outcome.response.aggregations.is_empty());
}

#[test]
fn alldocuments_returns_newest_first() {
    let service = common::service();
    let outcome = service.search(&QueryDescriptor::new(SearchType::AllDocuments)).expect("search");
    assert_eq!(common::ids(&outcome.response.hits.hits), vec!["d3", "d2", "d1"]);
    assert!(outcome.response.hits.hits.iter().all(|h| h.score == 1.0));
}

#[test]
fn text_query_kinds_match_expected_documents() {
    let service = common::service();
    let title = |kind: SearchType, term: &str| QueryDescriptor::new(kind).with_field("title").with_term(term);

    assert_eq!(total(&service, QueryDescriptor::new(SearchType::Term).with_field("city").with_term("Oslo")), 2);
    assert_eq!(total(&service, QueryDescriptor::new(SearchType::Term).with_term("fox")), 2);
    assert_eq!(total(&service, title(SearchType::Match, "lazy fox")), 3);
    assert_eq!(total(&service, title(SearchType::MatchPhrase, "quick brown")), 1);
    assert_eq!(total(&service, title(SearchType::MatchPhrase, "brown quick")), 0);
    assert_eq!(total(&service, title(SearchType::Prefix, "Qui")), 2);
    assert_eq!(total(&service, title(SearchType::Wildcard, "f?x")), 2);
    assert_eq!(total(&service, title(SearchType::Wildcard, "*og")), 1);
    assert_eq!(total(&service, title(SearchType::Fuzzy, "fix")), 2);
    assert_eq!(total(&service, QueryDescriptor::new(SearchType::QueryString).with_term("fox AND quick")), 2);
    assert_eq!(total(&service, QueryDescriptor::new(SearchType::QueryString).with_term("oslo -thinking")), 1);
}

#[test]
fn multiphrase_matches_any_expansion() {
    let service = common::service();
    let mut q = QueryDescriptor::new(SearchType::MultiPhrase).with_field("title");
    q.query.terms = vec![vec!["quick".into()], vec!["brown".into(), "thinking".into()]];
    let outcome = service.search(&q).expect("search");
    let mut found = common::ids(&outcome.response.hits.hits);
    found.sort();
    assert_eq!(found, vec!["d1", "d3"]);
}

#[test]
fn daterange_includes_start_and_excludes_end() {
    let service = common::service();
    let range = |start: &str, end: &str| {
        let mut q = QueryDescriptor::new(SearchType::DateRange);
        q.query.start_time = Some(start.parse().expect("start"));
        q.query.end_time = Some(end.parse().expect("end"));
        q
    };
    let outcome = service.search(&range("2024-01-15T00:00:00Z", "2024-03-01T00:00:00Z")).expect("search");
    assert_eq!(common::ids(&outcome.response.hits.hits), vec!["d2"]);
    assert_eq!(total(&service, range("2024-01-01T00:00:00Z", "2024-01-01T00:00:01Z")), 1);

    let mut open_ended = QueryDescriptor::new(SearchType::DateRange);
    open_ended.query.start_time = Some("2024-02-01T00:00:00Z".parse().expect("start"));
    assert_eq!(total(&service, open_ended), 2);
}

#[test]
fn aggregations_are_projected_by_name() {
    let service = common::service();
    let q = QueryDescriptor::new(SearchType::MatchAll)
        .with_aggregation("by_city", AggregationSpec::new(AggregationKind::Terms, "city"))
        .with_aggregation("avg_price", AggregationSpec::new(AggregationKind::Avg, "price"))
        .with_aggregation("max_price", AggregationSpec::new(AggregationKind::Max, "price"));
    let outcome = service.search(&q).expect("search");
    assert!(outcome.warnings.is_empty());

    let aggs = &outcome.response.aggregations;
    assert_eq!(aggs.len(), 3);
    assert_eq!(aggs["avg_price"]["value"], json!(20.0));
    assert_eq!(aggs["max_price"]["value"], json!(30.0));
    let buckets = aggs["by_city"]["buckets"].as_array().expect("buckets");
    assert_eq!(buckets[0]["key"], json!("Oslo"));
    assert_eq!(buckets[0]["doc_count"], json!(2));
    assert_eq!(buckets[1]["key"], json!("Bergen"));
    for reserved in ["count", "duration", "max_score"] {
        assert!(!aggs.contains_key(reserved));
    }
}

#[test]
fn aggregations_follow_the_query() {
    let service = common::service();
    let q = QueryDescriptor::new(SearchType::Term)
        .with_field("city")
        .with_term("Oslo")
        .with_aggregation("total_price", AggregationSpec::new(AggregationKind::Sum, "price"));
    let outcome = service.search(&q).expect("search");
    assert_eq!(outcome.response.aggregations["total_price"]["value"], json!(40.0));
}

#[test]
fn invalid_aggregation_fails_with_error_envelope() {
    let service = common::service();
    let q = QueryDescriptor::new(SearchType::MatchAll)
        .with_aggregation("by_title", AggregationSpec::new(AggregationKind::Terms, "title"));
    let failure = service.search(&q).expect_err("terms on a text field");
    assert!(matches!(failure.error, SearchError::Bind(BindError::FieldType { .. })));
    assert_eq!(failure.response.error, failure.error.to_string());
    assert!(failure.response.hits.hits.is_empty());

    let reserved = QueryDescriptor::new(SearchType::MatchAll)
        .with_aggregation("max_score", AggregationSpec::new(AggregationKind::Max, "price"));
    let failure = service.search(&reserved).expect_err("reserved name");
    assert!(matches!(failure.error, SearchError::Bind(BindError::ReservedName(_))));
}

#[test]
fn plan_errors_fail_with_error_envelope() {
    let service = common::service();
    let failure = service.search(&QueryDescriptor::new(SearchType::MatchPhrase)).expect_err("no term");
    assert!(matches!(failure.error, SearchError::Plan(_)));
    assert_eq!(failure.to_string(), failure.response.error);
}

struct ClosedIndex(TextIndex);

impl IndexHandle for ClosedIndex {
    fn name(&self) -> &str { self.0.name() }
    fn index(&self) -> &Index { self.0.index() }
    fn snapshot(&self) -> tantivy::Result<Searcher> {
        Err(TantivyError::SystemError("reader closed".into()))
    }
}

impl MappingStore for ClosedIndex {
    fn stored_mapping(&self) -> sift_core::error::Result<FieldMapping> { self.0.stored_mapping() }
}

#[test]
fn unavailable_snapshot_degrades_to_empty_response() {
    let service = SearchService::new(ClosedIndex(common::populated_index()), SearchSettings::default());
    let q = QueryDescriptor::new(SearchType::MatchAll)
        .with_aggregation("avg_price", AggregationSpec::new(AggregationKind::Avg, "price"));
    let outcome = service.search(&q).expect("degraded, not failed");
    assert!(outcome.response.hits.hits.is_empty());
    assert_eq!(outcome.response.hits.total.value, 0);
    assert!(outcome.response.aggregations.is_empty());
    assert!(outcome.response.error.is_empty());
    assert!(matches!(outcome.warnings.as_slice(), [SearchWarning::SnapshotUnavailable(_)]));
}

#[test]
fn undecodable_source_keeps_partial_hit() {
    let index = TextIndex::create_in_ram("broken", FieldMapping::new()).expect("index");
    let schema = index.index().schema();
    let mut doc = TantivyDocument::new();
    doc.add_text(schema.get_field("_id").expect("_id"), "bad");
    doc.add_text(schema.get_field("_source").expect("_source"), "{not json");
    index.add_document(doc).expect("add");
    index.commit().expect("commit");

    let service = SearchService::new(index, SearchSettings::default());
    let outcome = service.search(&QueryDescriptor::new(SearchType::MatchAll)).expect("search");
    let hits = &outcome.response.hits.hits;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "bad");
    assert!(hits[0].source.is_null());
    assert_eq!(hits[0].timestamp.timestamp(), 0);
    assert!(matches!(
        outcome.warnings.as_slice(),
        [SearchWarning::StoredFields { id, .. }] if id == "bad"
    ));
}

#[test]
fn reindexing_an_id_replaces_the_document() {
    let index = common::populated_index();
    index
        .index_document("d1", &json!({ "title": "A slow red fox", "city": "Tromso", "price": 5 }))
        .expect("reindex");
    index.commit().expect("commit");
    let service = SearchService::new(index, SearchSettings::default());

    assert_eq!(total(&service, QueryDescriptor::new(SearchType::MatchAll)), 3);
    assert_eq!(total(&service, QueryDescriptor::new(SearchType::Term).with_field("city").with_term("Tromso")), 1);
    assert_eq!(total(&service, QueryDescriptor::new(SearchType::Match).with_field("title").with_term("brown")), 0);
}

#[test]
fn mismatched_values_are_skipped_not_fatal() {
    let index = TextIndex::create_in_ram("products", common::mapping()).expect("index");
    index.index_document("odd", &json!({ "price": "not a number", "title": "odd one" })).expect("index");
    index.commit().expect("commit");
    let service = SearchService::new(index, SearchSettings::default());
    assert_eq!(total(&service, QueryDescriptor::new(SearchType::Match).with_field("title").with_term("odd")), 1);
    assert!(service.search(&QueryDescriptor::new(SearchType::Term).with_term("x")).is_ok());
    assert!(index_rejects_non_objects());
}

fn index_rejects_non_objects() -> bool {
    let index = TextIndex::create_in_ram("products", common::mapping()).expect("index");
    index.index_document("arr", &json!([1, 2, 3])).is_err()
}

#[test]
fn on_disk_index_reopens_with_its_mapping() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("index");
    {
        let index = TextIndex::create_in_dir("products", path.clone(), common::mapping()).expect("create");
        for (id, body) in common::documents() {
            index.index_document(id, &body).expect("index document");
        }
        index.commit().expect("commit");
    }
    let reopened = TextIndex::open_in_dir("products", path).expect("open");
    assert_eq!(reopened.mapping(), &common::mapping());
    let service = SearchService::new(reopened, SearchSettings::default());
    assert_eq!(total(&service, QueryDescriptor::new(SearchType::Term).with_field("city").with_term("Oslo")), 2);
}

#[test]
fn search_handles_share_a_directory_with_a_writer() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("index");
    let writer = TextIndex::create_in_dir("products", path.clone(), common::mapping()).expect("create");
    for (id, body) in common::documents() {
        writer.index_document(id, &body).expect("index document");
    }
    writer.commit().expect("commit");
    assert!(writer.is_writing());

    let first = TextIndex::open_in_dir("products", path.clone()).expect("first reader");
    let second = TextIndex::open_in_dir("products", path).expect("second reader");
    assert!(!first.is_writing());
    assert!(!second.is_writing());
    assert!(second.index_document("d4", &json!({ "title": "second writer" })).is_err(), "directory lock is held");

    let first = SearchService::new(first, SearchSettings::default());
    let second = SearchService::new(second, SearchSettings::default());
    assert_eq!(total(&first, QueryDescriptor::new(SearchType::MatchAll)), 3);
    assert_eq!(total(&second, QueryDescriptor::new(SearchType::MatchAll)), 3);

    writer.index_document("d4", &json!({ "title": "A late arrival", "city": "Oslo" })).expect("index document");
    writer.commit().expect("commit");
    assert_eq!(total(&first, QueryDescriptor::new(SearchType::MatchAll)), 4);
}

#[test]
fn service_is_shared_across_threads() {
    let service = Arc::new(common::service());
    let workers: Vec<_> = (0..4)
        .map(|i| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                let q = QueryDescriptor::new(SearchType::MatchAll).with_max_results(i + 1);
                let outcome = service.search(&q).expect("search");
                (outcome.response.hits.total.value, outcome.response.hits.hits.len())
            })
        })
        .collect();
    for (i, worker) in workers.into_iter().enumerate() {
        let (total, returned) = worker.join().expect("worker");
        assert_eq!(total, 3);
        assert_eq!(returned, (i + 1).min(3));
    }
}
