//! Search plans and the registry that builds them.

use std::collections::HashMap;
use std::sync::Arc;
use tantivy::aggregation::agg_req::Aggregations;
use tantivy::query::Query;
use tantivy::Index;

use sift_core::query::{QueryDescriptor, SearchType};

use crate::builders::default_builder;
use crate::error::PlanError;

/// How the executor ranks collected documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOrder {
	/// Engine relevance, best score first.
	Relevance,
	/// `@timestamp` descending; every hit scores 1.0.
	NewestFirst,
}

/// An engine-ready query tree plus the aggregation request registered on it.
/// Built once per request and consumed by the executor.
#[derive(Debug)]
pub struct SearchPlan {
	pub kind: SearchType,
	pub query: Box<dyn Query>,
	pub limit: usize,
	pub order: HitOrder,
	pub aggregations: Option<Aggregations>,
}

impl SearchPlan {
	pub fn new(kind: SearchType, query: Box<dyn Query>, limit: usize) -> Self {
		Self { kind, query, limit, order: HitOrder::Relevance, aggregations: None }
	}

	pub fn ordered_by(mut self, order: HitOrder) -> Self {
		self.order = order;
		self
	}

	pub fn has_aggregations(&self) -> bool {
		self.aggregations.as_ref().is_some_and(|aggs| !aggs.is_empty())
	}
}

/// Builds the plan for one query kind, validating the parameters it needs.
pub trait PlanBuilder: Send + Sync {
	fn build(&self, index: &Index, query: &QueryDescriptor) -> Result<SearchPlan, PlanError>;
}

/// Maps every `SearchType` to its builder.
pub struct PlanRegistry {
	builders: HashMap<SearchType, Arc<dyn PlanBuilder>>,
}

impl Default for PlanRegistry {
	fn default() -> Self {
		let builders = SearchType::ALL.into_iter().map(|kind| (kind, default_builder(kind))).collect();
		Self { builders }
	}
}

impl PlanRegistry {
	/// Replaces the builder used for `kind`.
	pub fn register(&mut self, kind: SearchType, builder: impl PlanBuilder + 'static) {
		self.builders.insert(kind, Arc::new(builder));
	}

	pub fn builder(&self, kind: SearchType) -> Arc<dyn PlanBuilder> {
		self.builders
			.get(&kind)
			.cloned()
			.unwrap_or_else(|| default_builder(kind))
	}

	pub fn build(&self, index: &Index, query: &QueryDescriptor) -> Result<SearchPlan, PlanError> {
		self.builder(query.search_type).build(index, query)
	}
}
