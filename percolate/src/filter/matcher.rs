//! In-memory record matching
//!
//! Evaluates a filter directly against a [`Record`], for callers filtering
//! cached result sets without a backend round trip.
//!
//! Multi-value semantics deliberately differ from the generators: an
//! equality-family criterion only matches when *every* one of its values
//! holds, while generators OR multiple values together. This divergence is
//! a pinned, documented property of the system.

use std::sync::LazyLock;

use regex::Regex;

use super::record::Record;
use super::types::{Conjunction, Criterion, Filter, Operator};
use super::value::{Type, Value};

/// Non-word runs stripped by the term normalizer.
static CHAR_FILTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\W\s_]+").expect("char filter pattern"));

/// Normalize a term for fuzzy comparison: lowercase, strip non-word runs.
fn normalize_term(term: &str) -> String {
    CHAR_FILTER.replace_all(&term.to_lowercase(), "").into_owned()
}

impl Filter {
    /// Evaluate this filter against a single record.
    ///
    /// Criteria combine per the filter's conjunction; a filter with no
    /// criteria matches everything.
    pub fn matches_record(&self, record: &Record) -> bool {
        if self.is_match_all() || self.criteria.is_empty() {
            return true;
        }

        match self.conjunction {
            Conjunction::And => self
                .criteria
                .iter()
                .all(|c| self.criterion_matches(c, record)),
            Conjunction::Or => self
                .criteria
                .iter()
                .any(|c| self.criterion_matches(c, record)),
        }
    }

    fn criterion_matches(&self, criterion: &Criterion, record: &Record) -> bool {
        let record_value = if criterion.field == self.identity_field || criterion.field == "id" {
            Some(&record.id)
        } else {
            record.get(&criterion.field)
        };

        match &criterion.operator {
            // equality family: every value must independently hold
            Operator::Is => criterion
                .values
                .iter()
                .all(|v| equality_holds(criterion.declared_type, v, record_value)),
            Operator::Not => criterion
                .values
                .iter()
                .all(|v| !equality_holds(criterion.declared_type, v, record_value)),

            // pattern and comparison operators: any value may hold
            Operator::Prefix | Operator::Suffix | Operator::Contains => criterion
                .values
                .iter()
                .any(|v| pattern_holds(&criterion.operator, v, record_value)),
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => criterion
                .values
                .iter()
                .any(|v| comparison_holds(&criterion.operator, v, record_value)),

            // anything else fails closed
            _ => false,
        }
    }
}

fn equality_holds(declared: Type, value: &Value, record_value: Option<&Value>) -> bool {
    // the null literal and empty values test for a missing or null field
    if value.is_null() || matches!(value, Value::String(s) if s.is_empty()) {
        return record_value.is_none_or(Value::is_null);
    }

    let Some(record_value) = record_value else {
        return false;
    };

    if record_value.is_null() {
        return false;
    }

    match declared {
        Type::Auto => relaxed_eq(value, record_value),
        Type::Int | Type::Float => match (value.as_f64(), record_value.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        Type::Bool => truthy(value) == truthy(record_value),
        _ => value == record_value,
    }
}

/// Numeric-aware equality for untyped criteria: numbers compare as
/// numbers, everything else by its canonical text form.
fn relaxed_eq(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (numeric_view(a), numeric_view(b)) {
        return x == y;
    }

    a.to_string() == b.to_string()
}

/// Numeric reading that deliberately excludes booleans, so `true` never
/// equals `1` under relaxed comparison.
fn numeric_view(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::String(s) => matches!(s.to_ascii_lowercase().as_str(), "true" | "t" | "1"),
        Value::Time(_) => true,
        Value::Null => false,
    }
}

fn pattern_holds(operator: &Operator, value: &Value, record_value: Option<&Value>) -> bool {
    let Some(record_value) = record_value else {
        return false;
    };

    let term = normalize_term(&value.to_string());
    let field_text = normalize_term(&record_value.to_string());

    match operator {
        Operator::Prefix => field_text.starts_with(&term),
        Operator::Suffix => field_text.ends_with(&term),
        Operator::Contains => field_text.contains(&term),
        _ => false,
    }
}

fn comparison_holds(operator: &Operator, value: &Value, record_value: Option<&Value>) -> bool {
    let bound = value.as_f64().unwrap_or(0.0);
    let field = record_value.and_then(Value::as_f64).unwrap_or(0.0);

    match operator {
        Operator::Gt => field > bound,
        Operator::Gte => field >= bound,
        Operator::Lt => field < bound,
        Operator::Lte => field <= bound,
        _ => false,
    }
}
