mod common;

use serde_json::json;
use std::collections::BTreeMap;
use tantivy::aggregation::agg_req::Aggregations;
use tantivy::DocAddress;

use sift_core::config::SearchSettings;
use sift_core::query::{AggregationKind, AggregationSpec, QueryDescriptor, SearchType};
use sift_core::response::{Hit, SearchWarning};
use sift_core::types::FieldMapping;
use sift_text::executor::{ResultCursor, Snapshot};
use sift_text::hydrator::{Hydrator, StoredFields};
use sift_text::projector::project_results;
use sift_text::{AggregationBinder, BindError, IndexHandle, SearchPlan, SearchService};

/// Registers a terms aggregation on `title`, which is not a fast field.
struct TitleTermsBinder;

impl AggregationBinder for TitleTermsBinder {
    fn bind(
        &self,
        plan: &mut SearchPlan,
        _specs: &BTreeMap<String, AggregationSpec>,
        _mapping: &FieldMapping,
    ) -> Result<(), BindError> {
        let aggregations: Aggregations = serde_json::from_value(json!({ "by_title": { "terms": { "field": "title" } } }))
            .map_err(|e| BindError::Invalid { agg: "by_title".into(), reason: e.to_string() })?;
        plan.aggregations = Some(aggregations);
        Ok(())
    }
}

#[test]
fn failed_execution_degrades_to_empty_response() {
    let service = SearchService::new(common::populated_index(), SearchSettings::default()).with_binder(TitleTermsBinder);
    let q = QueryDescriptor::new(SearchType::MatchAll)
        .with_aggregation("by_title", AggregationSpec::new(AggregationKind::Terms, "title"));
    let outcome = service.search(&q).expect("degraded, not failed");

    assert!(outcome.response.hits.hits.is_empty());
    assert_eq!(outcome.response.hits.total.value, 0);
    assert!(outcome.response.aggregations.is_empty());
    assert!(outcome.response.error.is_empty());
    assert!(matches!(outcome.warnings.as_slice(), [SearchWarning::ExecutionFailed(_)]));
}

#[test]
fn cursor_stops_at_an_address_outside_its_snapshot() {
    let index = common::populated_index();
    let snapshot = Snapshot::acquire(&index).expect("snapshot");
    let first = DocAddress::new(0, 0);
    let stray = DocAddress::new(7, 0);

    let mut cursor = ResultCursor::over(&snapshot, vec![(1.0, first), (0.5, stray), (0.2, first)]);
    assert!(matches!(cursor.next(), Some(Ok(m)) if m.address == first));
    let err = cursor.next().expect("step").err().expect("stray address");
    assert_eq!(err.segment, 7);
    assert!(cursor.next().is_none(), "nothing follows an error");
}

#[test]
fn hydrator_keeps_hits_gathered_before_cursor_failure() {
    let index = common::populated_index();
    let snapshot = Snapshot::acquire(&index).expect("snapshot");
    let cursor = ResultCursor::over(
        &snapshot,
        vec![(1.0, DocAddress::new(0, 0)), (0.5, DocAddress::new(3, 1)), (0.2, DocAddress::new(0, 1))],
    );
    let mut hydrator = Hydrator::new(cursor, StoredFields::resolve(&index.index().schema()), index.name());
    let hits: Vec<Hit> = hydrator.by_ref().collect();
    let warnings = hydrator.into_warnings();

    assert_eq!(hits.len(), 1);
    assert!(["d1", "d2", "d3"].contains(&hits[0].id.as_str()));
    assert!(matches!(warnings.as_slice(), [SearchWarning::CursorAborted(_)]));
}

#[test]
fn projection_strips_reserved_names() {
    let mut warnings = Vec::new();
    let projected = project_results(
        &json!({ "by_city": { "buckets": [] }, "count": 3, "duration": 1.5, "max_score": 2.0 }),
        &mut warnings,
    );
    assert_eq!(projected.keys().map(String::as_str).collect::<Vec<_>>(), vec!["by_city"]);
    assert!(warnings.is_empty());
}

#[test]
fn unprojectable_results_yield_empty_mapping_and_warning() {
    let mut warnings = Vec::new();
    assert!(project_results(&json!([1, 2, 3]), &mut warnings).is_empty());

    let mut non_string_keys = BTreeMap::new();
    non_string_keys.insert(vec![1u8, 2u8], 1u8);
    assert!(project_results(&non_string_keys, &mut warnings).is_empty());

    assert_eq!(warnings.len(), 2);
    assert!(warnings.iter().all(|w| matches!(w, SearchWarning::AggregationProjection(_))));
}
