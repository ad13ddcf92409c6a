use sift_core::response::{AggregationMap, Hit, Hits, SearchResponse, Total};

use crate::executor::Accumulator;

/// Composes the response envelope. Never fails.
pub fn assemble(accumulator: &Accumulator, hits: Vec<Hit>, aggregations: AggregationMap) -> SearchResponse {
	SearchResponse {
		took: u64::try_from(accumulator.duration().as_millis()).unwrap_or(u64::MAX),
		hits: Hits {
			total: Total { value: accumulator.count() },
			max_score: accumulator.metric("max_score").unwrap_or_default(),
			hits,
		},
		aggregations,
		error: String::new(),
	}
}
