//! Reshapes engine aggregation results into the user-visible mapping.

use serde::Serialize;
use serde_json::Value;

use sift_core::query::RESERVED_AGGREGATION_NAMES;
use sift_core::response::{AggregationMap, SearchWarning};

use crate::executor::Accumulator;

/// Drains the accumulator's aggregation results into a name → JSON mapping.
/// Reserved bookkeeping names never survive. A failure is logged and yields
/// an empty mapping.
pub fn project(accumulator: &mut Accumulator, warnings: &mut Vec<SearchWarning>) -> AggregationMap {
	match accumulator.take_aggregations() {
		Some(results) => project_results(&results, warnings),
		None => AggregationMap::new(),
	}
}

/// Projects any serializable result set. Anything that does not serialize to
/// a JSON object is a projection failure.
pub fn project_results<T: Serialize + ?Sized>(results: &T, warnings: &mut Vec<SearchWarning>) -> AggregationMap {
	match serde_json::to_value(results) {
		Ok(Value::Object(map)) => {
			let mut aggregations: AggregationMap = map.into_iter().collect();
			for reserved in RESERVED_AGGREGATION_NAMES {
				aggregations.remove(reserved);
			}
			aggregations
		}
		Ok(other) => {
			fail(warnings, format!("expected an object, got {}", other));
			AggregationMap::new()
		}
		Err(e) => {
			fail(warnings, e.to_string());
			AggregationMap::new()
		}
	}
}

fn fail(warnings: &mut Vec<SearchWarning>, reason: String) {
	tracing::warn!(%reason, "error parse aggregation results");
	warnings.push(SearchWarning::AggregationProjection(reason));
}
