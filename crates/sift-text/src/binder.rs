//! Binds user-declared aggregations to the plan.
//!
//! Definitions are checked against the field mapping and compiled into
//! tantivy's aggregation request. The first bad definition aborts binding and
//! leaves the plan untouched.

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tantivy::aggregation::agg_req::{Aggregation, Aggregations};

use sift_core::query::{is_reserved_aggregation_name, AggregationKind, AggregationSpec};
use sift_core::types::{FieldKind, FieldMapping};

use crate::error::BindError;
use crate::plan::SearchPlan;

pub const DEFAULT_TERMS_SIZE: u32 = 10;

pub trait AggregationBinder: Send + Sync {
	fn bind(
		&self,
		plan: &mut SearchPlan,
		specs: &BTreeMap<String, AggregationSpec>,
		mapping: &FieldMapping,
	) -> Result<(), BindError>;
}

/// Validates each aggregation's field against its declared type.
#[derive(Debug, Default, Clone, Copy)]
pub struct FieldTypeBinder;

impl AggregationBinder for FieldTypeBinder {
	fn bind(
		&self,
		plan: &mut SearchPlan,
		specs: &BTreeMap<String, AggregationSpec>,
		mapping: &FieldMapping,
	) -> Result<(), BindError> {
		if specs.is_empty() {
			return Ok(());
		}
		let mut aggregations = Aggregations::new();
		for (name, spec) in specs {
			if is_reserved_aggregation_name(name) {
				return Err(BindError::ReservedName(name.clone()));
			}
			let request = compile(name, spec, mapping)?;
			let aggregation: Aggregation = serde_json::from_value(request)
				.map_err(|e| BindError::Invalid { agg: name.clone(), reason: e.to_string() })?;
			aggregations.insert(name.clone(), aggregation);
		}
		plan.aggregations = Some(aggregations);
		Ok(())
	}
}

/// Field kinds an aggregation type may target.
pub fn accepts(kind: AggregationKind, field_kind: FieldKind) -> bool {
	use AggregationKind as A;
	use FieldKind as F;
	match kind {
		A::Terms => matches!(field_kind, F::Keyword | F::Numeric | F::Date | F::Bool),
		A::Range | A::Histogram | A::Avg | A::Sum => field_kind == F::Numeric,
		A::Min | A::Max | A::Stats | A::Count => matches!(field_kind, F::Numeric | F::Date),
		A::DateHistogram => field_kind == F::Date,
	}
}

fn compile(name: &str, spec: &AggregationSpec, mapping: &FieldMapping) -> Result<Value, BindError> {
	let invalid = |reason: &str| BindError::Invalid { agg: name.to_string(), reason: reason.to_string() };
	let field_kind = mapping
		.get(&spec.field)
		.ok_or_else(|| BindError::UnknownField { agg: name.to_string(), field: spec.field.clone() })?;
	if !accepts(spec.agg_type, field_kind) {
		return Err(BindError::FieldType {
			agg: name.to_string(),
			kind: spec.agg_type,
			field: spec.field.clone(),
			field_kind,
		});
	}

	let field = spec.field.as_str();
	let mut request = match spec.agg_type {
		AggregationKind::Terms => {
			let size = spec.size.unwrap_or(DEFAULT_TERMS_SIZE);
			if size == 0 { return Err(invalid("size must be greater than zero")); }
			json!({ "terms": { "field": field, "size": size } })
		}
		AggregationKind::Range => {
			if spec.ranges.is_empty() { return Err(invalid("range aggregations need at least one range")); }
			let ranges: Vec<Value> = spec
				.ranges
				.iter()
				.map(|r| {
					let mut range = Map::new();
					if let Some(key) = &r.key { range.insert("key".into(), json!(key)); }
					if let Some(from) = r.from { range.insert("from".into(), json!(from)); }
					if let Some(to) = r.to { range.insert("to".into(), json!(to)); }
					Value::Object(range)
				})
				.collect();
			json!({ "range": { "field": field, "ranges": ranges } })
		}
		AggregationKind::Histogram => match spec.interval {
			Some(interval) if interval > 0.0 => json!({ "histogram": { "field": field, "interval": interval } }),
			_ => return Err(invalid("histogram needs a positive interval")),
		},
		AggregationKind::DateHistogram => match spec.fixed_interval.as_deref() {
			Some(interval) if !interval.is_empty() => {
				json!({ "date_histogram": { "field": field, "fixed_interval": interval } })
			}
			_ => return Err(invalid("date_histogram needs a fixed_interval")),
		},
		AggregationKind::Avg => json!({ "avg": { "field": field } }),
		AggregationKind::Min => json!({ "min": { "field": field } }),
		AggregationKind::Max => json!({ "max": { "field": field } }),
		AggregationKind::Sum => json!({ "sum": { "field": field } }),
		AggregationKind::Stats => json!({ "stats": { "field": field } }),
		AggregationKind::Count => json!({ "value_count": { "field": field } }),
	};

	if !spec.aggs.is_empty() {
		if !spec.agg_type.is_bucket() {
			return Err(invalid("only bucket aggregations accept nested aggs"));
		}
		let mut nested = Map::new();
		for (child_name, child) in &spec.aggs {
			nested.insert(child_name.clone(), compile(child_name, child, mapping)?);
		}
		if let Value::Object(body) = &mut request {
			body.insert("aggs".into(), Value::Object(nested));
		}
	}
	Ok(request)
}
