//! Unified error type for filter parsing and query generation
//!
//! Every fallible operation in the crate reports through [`FilterError`].
//! Errors are returned to the immediate caller; nothing here retries or
//! logs-and-swallows.

use thiserror::Error;

/// Unified error type for filter parsing and query generation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    /// The filter spec could not be split into field/value pairs
    #[error("invalid filter spec {spec:?}: field term {token:?} has no paired value term")]
    UnpairedFieldTerm { spec: String, token: String },

    /// A `type#length` prefix carried a malformed length
    #[error("invalid field length {length:?} in {token:?}")]
    InvalidLength { token: String, length: String },

    /// A value could not be converted to the declared or required type
    #[error("cannot convert {value:?} for field {field:?}: expected {expected}")]
    ValueConversion {
        field: String,
        value: String,
        expected: &'static str,
    },

    /// Percent-decoding of a value failed
    #[error("cannot unescape value {value:?}: {reason}")]
    Unescape { value: String, reason: String },

    /// A generator has no mapping for the given operator
    #[error("unimplemented operator {operator:?} for {backend} generator")]
    UnimplementedOperator {
        backend: &'static str,
        operator: String,
    },

    /// A criterion reached a generator with no values at all
    #[error("criterion on field {field:?} must have at least one value")]
    EmptyValues { field: String },

    /// `range` criteria consume pairs of values
    #[error("ranging criteria on field {field:?} accept pairs of values, {count} given")]
    RangeArity { field: String, count: usize },

    /// Numeric comparators accept exactly one value
    #[error("comparator {operator:?} on field {field:?} accepts one value, {count} given")]
    ComparatorArity {
        operator: String,
        field: String,
        count: usize,
    },

    /// INSERT and UPDATE statements require input data
    #[error("{statement} statements must specify input data")]
    MissingInputData { statement: &'static str },

    /// An aggregation with no rendering for the target backend
    #[error("aggregation {aggregation:?} is not supported by the {backend} generator")]
    UnsupportedAggregation {
        backend: &'static str,
        aggregation: String,
    },
}

impl FilterError {
    /// Create a value-conversion error with preserved field context
    pub fn conversion(field: &str, value: &str, expected: &'static str) -> Self {
        Self::ValueConversion {
            field: field.to_string(),
            value: value.to_string(),
            expected,
        }
    }

    /// Create an unimplemented-operator error for the named backend
    pub fn unimplemented(backend: &'static str, operator: impl ToString) -> Self {
        Self::UnimplementedOperator {
            backend,
            operator: operator.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unimplemented_operator_display() {
        let err = FilterError::unimplemented("sql", "fulltext");
        assert_eq!(
            err.to_string(),
            "unimplemented operator \"fulltext\" for sql generator"
        );
    }

    #[test]
    fn range_arity_display() {
        let err = FilterError::RangeArity {
            field: "factor".to_string(),
            count: 3,
        };
        assert_eq!(
            err.to_string(),
            "ranging criteria on field \"factor\" accept pairs of values, 3 given"
        );
    }

    #[test]
    fn conversion_display() {
        let err = FilterError::conversion("age", "banana", "int");
        assert_eq!(
            err.to_string(),
            "cannot convert \"banana\" for field \"age\": expected int"
        );
    }
}
