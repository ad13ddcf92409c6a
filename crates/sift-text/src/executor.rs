//! Runs a plan against a per-request snapshot.
//!
//! Snapshot and execution failures are absorbed: they are logged, recorded as
//! warnings, and yield an empty execution instead of an error.

use std::time::{Duration, Instant};
use tantivy::aggregation::agg_result::AggregationResults;
use tantivy::aggregation::AggregationCollector;
use tantivy::collector::{Collector, Count, TopDocs};
use tantivy::query::Query;
use tantivy::{DocAddress, Order, Score, Searcher, TantivyDocument};

use sift_core::response::SearchWarning;
use sift_core::types::TIMESTAMP_FIELD;

use crate::error::CursorError;
use crate::index::IndexHandle;
use crate::plan::{HitOrder, SearchPlan};

/// Scoped read view. Released when dropped.
pub struct Snapshot {
	searcher: Searcher,
}

impl Snapshot {
	pub fn acquire(handle: &dyn IndexHandle) -> tantivy::Result<Self> {
		let searcher = handle.snapshot()?;
		tracing::debug!(index = handle.name(), segments = searcher.segment_readers().len(), "acquired snapshot");
		Ok(Self { searcher })
	}

	pub fn searcher(&self) -> &Searcher { &self.searcher }
}

impl Drop for Snapshot {
	fn drop(&mut self) {
		tracing::debug!("released snapshot");
	}
}

/// Engine bookkeeping collected alongside the hits.
#[derive(Debug, Default)]
pub struct Accumulator {
	count: u64,
	duration: Duration,
	max_score: f64,
	aggregations: Option<AggregationResults>,
}

impl Accumulator {
	pub fn count(&self) -> u64 { self.count }

	pub fn duration(&self) -> Duration { self.duration }

	/// Bookkeeping metrics by name: `count`, `duration` (ms) and `max_score`.
	pub fn metric(&self, name: &str) -> Option<f64> {
		match name {
			"count" => Some(self.count as f64),
			"duration" => Some(self.duration.as_secs_f64() * 1000.0),
			"max_score" => Some(self.max_score),
			_ => None,
		}
	}

	pub fn take_aggregations(&mut self) -> Option<AggregationResults> { self.aggregations.take() }
}

/// Outcome of running a plan: the snapshot (when one was acquired), the
/// ranked matches and the accumulator.
pub struct Execution {
	snapshot: Option<Snapshot>,
	matches: Vec<(Score, DocAddress)>,
	accumulator: Accumulator,
}

impl Execution {
	fn empty(snapshot: Option<Snapshot>, duration: Duration) -> Self {
		Self { snapshot, matches: Vec::new(), accumulator: Accumulator { duration, ..Accumulator::default() } }
	}

	/// Hands the matches to a cursor. A second call yields an empty cursor.
	pub fn cursor(&mut self) -> ResultCursor<'_> {
		let matches = std::mem::take(&mut self.matches);
		match self.snapshot.as_ref() {
			Some(snapshot) => ResultCursor::over(snapshot, matches),
			None => ResultCursor { snapshot: None, matches: Vec::new().into_iter(), failed: false },
		}
	}

	pub fn accumulator(&self) -> &Accumulator { &self.accumulator }

	pub fn accumulator_mut(&mut self) -> &mut Accumulator { &mut self.accumulator }
}

/// One scored result whose stored fields are read on demand.
pub struct DocumentMatch<'s> {
	pub score: Score,
	pub address: DocAddress,
	snapshot: &'s Snapshot,
}

impl DocumentMatch<'_> {
	pub fn stored_document(&self) -> tantivy::Result<TantivyDocument> {
		self.snapshot.searcher().doc(self.address)
	}
}

/// Finite, non-restartable sequence of matches in rank order. Each step is a
/// match or a terminal error; nothing follows an error.
///
/// Tantivy collects the ranked addresses eagerly, so a step only fails when an
/// address does not belong to the cursor's snapshot. Reading a document's
/// stored fields happens later, per hit, and is reported separately.
pub struct ResultCursor<'s> {
	snapshot: Option<&'s Snapshot>,
	matches: std::vec::IntoIter<(Score, DocAddress)>,
	failed: bool,
}

impl<'s> ResultCursor<'s> {
	/// Walks already ranked addresses against `snapshot`.
	pub fn over(snapshot: &'s Snapshot, matches: Vec<(Score, DocAddress)>) -> Self {
		Self { snapshot: Some(snapshot), matches: matches.into_iter(), failed: false }
	}
}

impl<'s> Iterator for ResultCursor<'s> {
	type Item = Result<DocumentMatch<'s>, CursorError>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.failed { return None; }
		let snapshot = self.snapshot?;
		let (score, address) = self.matches.next()?;
		let segments = snapshot.searcher().segment_readers().len();
		if address.segment_ord as usize >= segments {
			self.failed = true;
			return Some(Err(CursorError { segment: address.segment_ord, doc: address.doc_id, segments }));
		}
		Some(Ok(DocumentMatch { score, address, snapshot }))
	}
}

pub fn execute(handle: &dyn IndexHandle, plan: SearchPlan, warnings: &mut Vec<SearchWarning>) -> Execution {
	let started = Instant::now();
	let snapshot = match Snapshot::acquire(handle) {
		Ok(snapshot) => snapshot,
		Err(e) => {
			tracing::warn!(index = handle.name(), error = %e, "error accessing reader");
			warnings.push(SearchWarning::SnapshotUnavailable(e.to_string()));
			return Execution::empty(None, started.elapsed());
		}
	};

	match collect(snapshot.searcher(), plan) {
		Ok(collected) => Execution {
			snapshot: Some(snapshot),
			matches: collected.matches,
			accumulator: Accumulator {
				count: collected.count as u64,
				duration: started.elapsed(),
				max_score: collected.max_score,
				aggregations: collected.aggregations,
			},
		},
		Err(e) => {
			tracing::warn!(index = handle.name(), error = %e, "error executing search");
			warnings.push(SearchWarning::ExecutionFailed(e.to_string()));
			Execution::empty(Some(snapshot), started.elapsed())
		}
	}
}

struct Collected {
	matches: Vec<(Score, DocAddress)>,
	count: usize,
	max_score: f64,
	aggregations: Option<AggregationResults>,
}

fn collect(searcher: &Searcher, plan: SearchPlan) -> tantivy::Result<Collected> {
	// TopDocs needs a non-zero limit; a zero cap still reports max_score.
	let top = TopDocs::with_limit(plan.limit.max(1));
	let aggregations = plan
		.aggregations
		.filter(|aggs| !aggs.is_empty())
		.map(|aggs| AggregationCollector::from_aggs(aggs, Default::default()));
	let query = plan.query.as_ref();
	let mut collected = match plan.order {
		HitOrder::Relevance => run(searcher, query, top, aggregations, |fruit| fruit)?,
		HitOrder::NewestFirst => {
			let top = top.order_by_fast_field::<tantivy::DateTime>(TIMESTAMP_FIELD, Order::Desc);
			run(searcher, query, top, aggregations, |fruit| fruit.into_iter().map(|(_, addr)| (1.0, addr)).collect())?
		}
	};
	collected.max_score = collected.matches.iter().map(|(score, _)| f64::from(*score)).fold(0.0, f64::max);
	collected.matches.truncate(plan.limit);
	Ok(collected)
}

fn run<C, F>(
	searcher: &Searcher,
	query: &dyn Query,
	top: C,
	aggregations: Option<AggregationCollector>,
	into_ranked: F,
) -> tantivy::Result<Collected>
where
	C: Collector,
	F: FnOnce(C::Fruit) -> Vec<(Score, DocAddress)>,
{
	match aggregations {
		Some(aggs) => {
			let (fruit, count, results) = searcher.search(query, &(top, Count, aggs))?;
			Ok(Collected { matches: into_ranked(fruit), count, max_score: 0.0, aggregations: Some(results) })
		}
		None => {
			let (fruit, count) = searcher.search(query, &(top, Count))?;
			Ok(Collected { matches: into_ranked(fruit), count, max_score: 0.0, aggregations: None })
		}
	}
}
