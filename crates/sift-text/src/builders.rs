//! One plan builder per query kind.

use std::ops::Bound;
use std::sync::Arc;
use tantivy::query::{
	AllQuery, BooleanQuery, BoostQuery, EmptyQuery, FuzzyTermQuery, Occur, PhraseQuery, Query, QueryParser,
	RangeQuery, RegexQuery, TermQuery,
};
use tantivy::schema::{Field, FieldType, IndexRecordOption};
use tantivy::{Index, Term};

use sift_core::query::{QueryDescriptor, SearchType};
use sift_core::types::{ALL_FIELD, TIMESTAMP_FIELD};

use crate::error::PlanError;
use crate::index::to_engine_date;
use crate::plan::{HitOrder, PlanBuilder, SearchPlan};

/// Upper bound on phrase combinations a multi-phrase query may expand to.
pub const MAX_PHRASE_EXPANSIONS: usize = 64;
pub const MAX_FUZZY_DISTANCE: u8 = 2;

pub fn default_builder(kind: SearchType) -> Arc<dyn PlanBuilder> {
	match kind {
		SearchType::AllDocuments => Arc::new(AllDocumentsBuilder),
		SearchType::Wildcard => Arc::new(WildcardBuilder),
		SearchType::Fuzzy => Arc::new(FuzzyBuilder),
		SearchType::Term => Arc::new(TermBuilder),
		SearchType::DateRange => Arc::new(DateRangeBuilder),
		SearchType::MatchAll => Arc::new(MatchAllBuilder),
		SearchType::Match => Arc::new(MatchBuilder),
		SearchType::MatchPhrase => Arc::new(MatchPhraseBuilder),
		SearchType::MultiPhrase => Arc::new(MultiPhraseBuilder),
		SearchType::Prefix => Arc::new(PrefixBuilder),
		SearchType::QueryString => Arc::new(QueryStringBuilder),
	}
}

pub struct AllDocumentsBuilder;
pub struct MatchAllBuilder;
pub struct TermBuilder;
pub struct MatchBuilder;
pub struct MatchPhraseBuilder;
pub struct MultiPhraseBuilder;
pub struct PrefixBuilder;
pub struct WildcardBuilder;
pub struct FuzzyBuilder;
pub struct DateRangeBuilder;
pub struct QueryStringBuilder;

impl PlanBuilder for AllDocumentsBuilder {
	fn build(&self, _index: &Index, q: &QueryDescriptor) -> Result<SearchPlan, PlanError> {
		Ok(finish(SearchType::AllDocuments, Box::new(AllQuery), q)?.ordered_by(HitOrder::NewestFirst))
	}
}

impl PlanBuilder for MatchAllBuilder {
	fn build(&self, _index: &Index, q: &QueryDescriptor) -> Result<SearchPlan, PlanError> {
		finish(SearchType::MatchAll, Box::new(AllQuery), q)
	}
}

impl PlanBuilder for TermBuilder {
	fn build(&self, index: &Index, q: &QueryDescriptor) -> Result<SearchPlan, PlanError> {
		let kind = SearchType::Term;
		let text = require_term(kind, q)?;
		let target = FieldTarget::resolve(index, q.query.field.as_deref().unwrap_or(ALL_FIELD))?;
		let invalid = |reason: String| PlanError::InvalidParameter { kind, param: "term", reason };
		let (term, option) = match &target.field_type {
			FieldType::Str(_) => (Term::from_field_text(target.field, text), IndexRecordOption::WithFreqs),
			FieldType::F64(_) => {
				let v = text.trim().parse::<f64>().map_err(|e| invalid(e.to_string()))?;
				(Term::from_field_f64(target.field, v), IndexRecordOption::Basic)
			}
			FieldType::I64(_) => {
				let v = text.trim().parse::<i64>().map_err(|e| invalid(e.to_string()))?;
				(Term::from_field_i64(target.field, v), IndexRecordOption::Basic)
			}
			FieldType::U64(_) => {
				let v = text.trim().parse::<u64>().map_err(|e| invalid(e.to_string()))?;
				(Term::from_field_u64(target.field, v), IndexRecordOption::Basic)
			}
			FieldType::Bool(_) => {
				let v = text.trim().parse::<bool>().map_err(|e| invalid(e.to_string()))?;
				(Term::from_field_bool(target.field, v), IndexRecordOption::Basic)
			}
			FieldType::Date(_) => {
				let v = chrono::DateTime::parse_from_rfc3339(text.trim()).map_err(|e| invalid(e.to_string()))?;
				(Term::from_field_date(target.field, to_engine_date(v.with_timezone(&chrono::Utc))), IndexRecordOption::Basic)
			}
			_ => return Err(target.mismatch(kind, "term queries need a text, numeric, bool or date field")),
		};
		finish(kind, Box::new(TermQuery::new(term, option)), q)
	}
}

impl PlanBuilder for MatchBuilder {
	fn build(&self, index: &Index, q: &QueryDescriptor) -> Result<SearchPlan, PlanError> {
		let kind = SearchType::Match;
		let text = require_term(kind, q)?;
		let target = FieldTarget::resolve(index, q.query.field.as_deref().unwrap_or(ALL_FIELD))?;
		let tokens = target.analyze(index, kind, text)?;
		let query: Box<dyn Query> = if tokens.is_empty() {
			Box::new(EmptyQuery)
		} else {
			let clauses = tokens
				.iter()
				.map(|token| (Occur::Should, text_term_query(target.field, token)))
				.collect();
			Box::new(BooleanQuery::new(clauses))
		};
		finish(kind, query, q)
	}
}

impl PlanBuilder for MatchPhraseBuilder {
	fn build(&self, index: &Index, q: &QueryDescriptor) -> Result<SearchPlan, PlanError> {
		let kind = SearchType::MatchPhrase;
		let text = require_term(kind, q)?;
		let target = FieldTarget::resolve(index, q.query.field.as_deref().unwrap_or(ALL_FIELD))?;
		let tokens = target.analyze(index, kind, text)?;
		if tokens.len() > 1 { target.require_positions(kind)?; }
		finish(kind, phrase_query(target.field, &tokens), q)
	}
}

impl PlanBuilder for MultiPhraseBuilder {
	fn build(&self, index: &Index, q: &QueryDescriptor) -> Result<SearchPlan, PlanError> {
		let kind = SearchType::MultiPhrase;
		if q.query.terms.is_empty() || q.query.terms.iter().any(|alternatives| alternatives.is_empty()) {
			return Err(PlanError::MissingParameter { kind, param: "terms" });
		}
		let target = FieldTarget::resolve(index, q.query.field.as_deref().unwrap_or(ALL_FIELD))?;
		if q.query.terms.len() > 1 { target.require_positions(kind)?; }

		let mut positions: Vec<Vec<String>> = Vec::with_capacity(q.query.terms.len());
		for alternatives in &q.query.terms {
			let mut normalized = Vec::with_capacity(alternatives.len());
			for alternative in alternatives {
				let mut tokens = target.analyze(index, kind, alternative)?;
				if tokens.len() != 1 {
					return Err(PlanError::InvalidParameter {
						kind,
						param: "terms",
						reason: format!("'{}' must analyze to exactly one token", alternative),
					});
				}
				normalized.extend(tokens.pop());
			}
			positions.push(normalized);
		}

		let expansions = positions.iter().try_fold(1usize, |acc, p| acc.checked_mul(p.len()));
		if expansions.map_or(true, |n| n > MAX_PHRASE_EXPANSIONS) {
			return Err(PlanError::InvalidParameter {
				kind,
				param: "terms",
				reason: format!("expands to more than {} phrases", MAX_PHRASE_EXPANSIONS),
			});
		}

		let mut combinations: Vec<Vec<&str>> = vec![Vec::new()];
		for alternatives in &positions {
			combinations = combinations
				.into_iter()
				.flat_map(|prefix| {
					alternatives.iter().map(move |alt| {
						let mut next = prefix.clone();
						next.push(alt.as_str());
						next
					})
				})
				.collect();
		}
		let clauses = combinations
			.iter()
			.map(|tokens| (Occur::Should, phrase_query(target.field, tokens)))
			.collect();
		finish(kind, Box::new(BooleanQuery::new(clauses)), q)
	}
}

impl PlanBuilder for PrefixBuilder {
	fn build(&self, index: &Index, q: &QueryDescriptor) -> Result<SearchPlan, PlanError> {
		let kind = SearchType::Prefix;
		let prefix = require_term(kind, q)?;
		let target = FieldTarget::resolve(index, q.query.field.as_deref().unwrap_or(ALL_FIELD))?;
		let prefix = target.normalize_case(kind, prefix)?;
		let pattern = format!("{}.*", regex::escape(&prefix));
		finish(kind, target.regex_query(kind, &pattern)?, q)
	}
}

impl PlanBuilder for WildcardBuilder {
	fn build(&self, index: &Index, q: &QueryDescriptor) -> Result<SearchPlan, PlanError> {
		let kind = SearchType::Wildcard;
		let wildcard = require_term(kind, q)?;
		let target = FieldTarget::resolve(index, q.query.field.as_deref().unwrap_or(ALL_FIELD))?;
		let wildcard = target.normalize_case(kind, wildcard)?;
		finish(kind, target.regex_query(kind, &wildcard_to_regex(&wildcard))?, q)
	}
}

impl PlanBuilder for FuzzyBuilder {
	fn build(&self, index: &Index, q: &QueryDescriptor) -> Result<SearchPlan, PlanError> {
		let kind = SearchType::Fuzzy;
		let text = require_term(kind, q)?;
		let distance = q.query.fuzziness.unwrap_or(1);
		if distance > MAX_FUZZY_DISTANCE {
			return Err(PlanError::InvalidParameter {
				kind,
				param: "fuzziness",
				reason: format!("{} exceeds the maximum edit distance of {}", distance, MAX_FUZZY_DISTANCE),
			});
		}
		let target = FieldTarget::resolve(index, q.query.field.as_deref().unwrap_or(ALL_FIELD))?;
		let token = target
			.analyze(index, kind, text)?
			.into_iter()
			.next()
			.ok_or(PlanError::MissingParameter { kind, param: "term" })?;
		let query = FuzzyTermQuery::new(Term::from_field_text(target.field, &token), distance, true);
		finish(kind, Box::new(query), q)
	}
}

impl PlanBuilder for DateRangeBuilder {
	fn build(&self, index: &Index, q: &QueryDescriptor) -> Result<SearchPlan, PlanError> {
		let kind = SearchType::DateRange;
		let (start, end) = (q.query.start_time, q.query.end_time);
		if start.is_none() && end.is_none() {
			return Err(PlanError::MissingParameter { kind, param: "start_time" });
		}
		if let (Some(s), Some(e)) = (start, end) {
			if s > e {
				return Err(PlanError::InvalidParameter { kind, param: "end_time", reason: "precedes start_time".into() });
			}
		}
		let target = FieldTarget::resolve(index, q.query.field.as_deref().unwrap_or(TIMESTAMP_FIELD))?;
		if !matches!(target.field_type, FieldType::Date(_)) {
			return Err(target.mismatch(kind, "date range queries need a date field"));
		}
		// Dates are indexed at second precision.
		let term = |dt: chrono::DateTime<chrono::Utc>| {
			Term::from_field_date(target.field, tantivy::DateTime::from_timestamp_secs(dt.timestamp()))
		};
		let lower = start.map_or(Bound::Unbounded, |s| Bound::Included(term(s)));
		let upper = end.map_or(Bound::Unbounded, |e| Bound::Excluded(term(e)));
		finish(kind, Box::new(RangeQuery::new(lower, upper)), q)
	}
}

impl PlanBuilder for QueryStringBuilder {
	fn build(&self, index: &Index, q: &QueryDescriptor) -> Result<SearchPlan, PlanError> {
		let kind = SearchType::QueryString;
		let text = require_term(kind, q)?;
		let target = FieldTarget::resolve(index, q.query.field.as_deref().unwrap_or(ALL_FIELD))?;
		let parser = QueryParser::for_index(index, vec![target.field]);
		let query = parser.parse_query(text).map_err(|e| PlanError::QueryString(e.to_string()))?;
		finish(kind, query, q)
	}
}

fn require_term(kind: SearchType, q: &QueryDescriptor) -> Result<&str, PlanError> {
	q.query
		.term
		.as_deref()
		.filter(|t| !t.trim().is_empty())
		.ok_or(PlanError::MissingParameter { kind, param: "term" })
}

/// Applies the optional boost and the clamped result cap.
fn finish(kind: SearchType, query: Box<dyn Query>, q: &QueryDescriptor) -> Result<SearchPlan, PlanError> {
	let query: Box<dyn Query> = match q.query.boost {
		None => query,
		Some(boost) if boost.is_finite() && boost > 0.0 => Box::new(BoostQuery::new(query, boost)),
		Some(boost) => {
			return Err(PlanError::InvalidParameter { kind, param: "boost", reason: format!("{} is not a positive number", boost) })
		}
	};
	Ok(SearchPlan::new(kind, query, q.effective_max_results()))
}

fn text_term_query(field: Field, token: &str) -> Box<dyn Query> {
	Box::new(TermQuery::new(Term::from_field_text(field, token), IndexRecordOption::WithFreqs))
}

fn phrase_query<S: AsRef<str>>(field: Field, tokens: &[S]) -> Box<dyn Query> {
	match tokens {
		[] => Box::new(EmptyQuery),
		[single] => text_term_query(field, single.as_ref()),
		_ => Box::new(PhraseQuery::new(tokens.iter().map(|t| Term::from_field_text(field, t.as_ref())).collect())),
	}
}

fn wildcard_to_regex(wildcard: &str) -> String {
	let mut pattern = String::with_capacity(wildcard.len() + 8);
	for c in wildcard.chars() {
		match c {
			'*' => pattern.push_str(".*"),
			'?' => pattern.push('.'),
			other => pattern.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
		}
	}
	pattern
}

/// A schema field resolved by name.
struct FieldTarget {
	name: String,
	field: Field,
	field_type: FieldType,
}

impl FieldTarget {
	fn resolve(index: &Index, name: &str) -> Result<Self, PlanError> {
		let schema = index.schema();
		let field = schema.get_field(name).map_err(|_| PlanError::UnknownField(name.to_string()))?;
		let field_type = schema.get_field_entry(field).field_type().clone();
		Ok(Self { name: name.to_string(), field, field_type })
	}

	fn mismatch(&self, kind: SearchType, reason: &str) -> PlanError {
		PlanError::FieldType { kind, field: self.name.clone(), reason: reason.to_string() }
	}

	fn indexed_text(&self, kind: SearchType) -> Result<&tantivy::schema::TextFieldIndexing, PlanError> {
		match &self.field_type {
			FieldType::Str(options) => options
				.get_indexing_options()
				.ok_or_else(|| self.mismatch(kind, "field is not indexed")),
			_ => Err(self.mismatch(kind, "field is not a text field")),
		}
	}

	fn require_positions(&self, kind: SearchType) -> Result<(), PlanError> {
		if self.indexed_text(kind)?.index_option().has_positions() {
			Ok(())
		} else {
			Err(self.mismatch(kind, "field does not index positions"))
		}
	}

	/// Runs `text` through the field's analyzer.
	fn analyze(&self, index: &Index, kind: SearchType, text: &str) -> Result<Vec<String>, PlanError> {
		self.indexed_text(kind)?;
		let mut analyzer = index
			.tokenizer_for_field(self.field)
			.map_err(|e| self.mismatch(kind, &e.to_string()))?;
		let mut stream = analyzer.token_stream(text);
		let mut tokens = Vec::new();
		while stream.advance() {
			tokens.push(stream.token().text.clone());
		}
		Ok(tokens)
	}

	/// Analyzed text fields are lowercased at index time; keyword fields are not.
	fn normalize_case(&self, kind: SearchType, text: &str) -> Result<String, PlanError> {
		let indexing = self.indexed_text(kind)?;
		Ok(if indexing.tokenizer() == "raw" { text.to_string() } else { text.to_lowercase() })
	}

	fn regex_query(&self, kind: SearchType, pattern: &str) -> Result<Box<dyn Query>, PlanError> {
		let query = RegexQuery::from_pattern(pattern, self.field).map_err(|e| PlanError::InvalidParameter {
			kind,
			param: "term",
			reason: e.to_string(),
		})?;
		Ok(Box::new(query))
	}
}
