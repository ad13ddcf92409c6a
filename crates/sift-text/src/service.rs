use sift_core::config::SearchSettings;
use sift_core::query::QueryDescriptor;
use sift_core::response::{AggregationMap, Hit, SearchOutcome};
use sift_core::traits::MappingStore;

use crate::assembler::assemble;
use crate::binder::{AggregationBinder, FieldTypeBinder};
use crate::error::{SearchError, SearchFailure};
use crate::executor::execute;
use crate::hydrator::{Hydrator, StoredFields};
use crate::index::IndexHandle;
use crate::plan::{PlanRegistry, SearchPlan};
use crate::projector::project;

/// Entry point of the pipeline. Holds no per-request state, so one instance
/// can serve concurrent callers.
pub struct SearchService<H> {
	handle: H,
	settings: SearchSettings,
	registry: PlanRegistry,
	binder: Box<dyn AggregationBinder>,
}

impl<H: IndexHandle + MappingStore> SearchService<H> {
	pub fn new(handle: H, settings: SearchSettings) -> Self {
		Self { handle, settings, registry: PlanRegistry::default(), binder: Box::new(FieldTypeBinder) }
	}

	pub fn with_registry(mut self, registry: PlanRegistry) -> Self {
		self.registry = registry;
		self
	}

	pub fn with_binder(mut self, binder: impl AggregationBinder + 'static) -> Self {
		self.binder = Box::new(binder);
		self
	}

	pub fn handle(&self) -> &H { &self.handle }

	pub fn settings(&self) -> &SearchSettings { &self.settings }

	/// Clamps the descriptor, builds its plan and binds its aggregations.
	/// The mapping is only fetched when aggregations were requested.
	pub fn plan(&self, query: &QueryDescriptor) -> Result<SearchPlan, SearchError> {
		let query = query.clamped(&self.settings);
		let mut plan = self.registry.build(self.handle.index(), &query)?;
		if !query.aggs.is_empty() {
			let mapping = self.handle.stored_mapping()?;
			self.binder.bind(&mut plan, &query.aggs, &mapping)?;
		}
		Ok(plan)
	}

	/// Runs one request end to end.
	///
	/// Returns `Err` only when the descriptor cannot be planned or its
	/// aggregations cannot be bound; the failure carries an envelope whose
	/// `error` is the error message. Engine faults after that point degrade
	/// the response and are listed in the outcome's warnings.
	#[tracing::instrument(skip_all, fields(index = self.handle.name(), search_type = %query.search_type))]
	pub fn search(&self, query: &QueryDescriptor) -> Result<SearchOutcome, SearchFailure> {
		let plan = self.plan(query).map_err(|e| {
			tracing::warn!(error = %e, "rejected search request");
			SearchFailure::from(e)
		})?;
		let wants_aggregations = plan.has_aggregations();

		let mut warnings = Vec::new();
		let mut execution = execute(&self.handle, plan, &mut warnings);
		let fields = StoredFields::resolve(&self.handle.index().schema());
		let mut hydrator = Hydrator::new(execution.cursor(), fields, self.handle.name());
		let hits: Vec<Hit> = hydrator.by_ref().collect();
		warnings.extend(hydrator.into_warnings());

		let aggregations = if wants_aggregations {
			project(execution.accumulator_mut(), &mut warnings)
		} else {
			AggregationMap::new()
		};
		let response = assemble(execution.accumulator(), hits, aggregations);
		tracing::debug!(total = response.hits.total.value, returned = response.hits.hits.len(), took = response.took, "search completed");
		Ok(SearchOutcome { response, warnings })
	}
}
