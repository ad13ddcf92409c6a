//! sift-text
//!
//! Tantivy-backed query execution: a tagged query descriptor is dispatched to a
//! plan builder, aggregations are bound against the field mapping, the plan runs
//! on a per-request snapshot, and the cursor is hydrated into typed hits.

pub mod assembler;
pub mod binder;
pub mod builders;
pub mod error;
pub mod executor;
pub mod hydrator;
pub mod index;
pub mod plan;
pub mod projector;
pub mod schema;
pub mod service;

pub use binder::{AggregationBinder, FieldTypeBinder};
pub use error::{BindError, CursorError, PlanError, SearchError, SearchFailure};
pub use index::{IndexHandle, TextIndex};
pub use plan::{HitOrder, PlanBuilder, PlanRegistry, SearchPlan};
pub use service::SearchService;
