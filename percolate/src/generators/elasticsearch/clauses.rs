//! Per-operator clause builders for the Elasticsearch generator

use serde_json::{Map, Value as Json};

use super::{Elasticsearch, EsCompat};
use crate::error::FilterError;
use crate::filter::{Criterion, Type, Value};
use crate::generators::obj;

impl Elasticsearch {
    fn multifield(&self) -> Option<String> {
        self.options.get("multifield").map(ToString::to_string)
    }

    /// The version-appropriate clause testing that a field is unset.
    fn missing_clause(&self, field: &str) -> Json {
        match self.compat {
            EsCompat::Modern => obj(
                "bool",
                obj(
                    "must_not",
                    Json::Array(vec![obj("exists", obj("field", Json::from(field)))]),
                ),
            ),
            EsCompat::Legacy => {
                let mut missing = Map::new();
                missing.insert("field".to_string(), Json::from(field));
                missing.insert("existence".to_string(), Json::Bool(true));
                missing.insert("null_value".to_string(), Json::Bool(true));
                obj("missing", Json::Object(missing))
            }
        }
    }

    fn existence_clause(&self, field: &str) -> Json {
        match self.compat {
            EsCompat::Modern => obj("exists", obj("field", Json::from(field))),
            EsCompat::Legacy => obj("bool", obj("must_not", self.missing_clause(field))),
        }
    }

    pub(super) fn is_clause(&mut self, criterion: &Criterion) -> Result<Json, FilterError> {
        if is_single_null(criterion) {
            self.values.push(Value::Null);
            return Ok(self.missing_clause(&criterion.field));
        }

        let multifield = self.multifield();
        let mut terms = Vec::new();

        for value in &criterion.values {
            self.values.push(value.clone());
            terms.push(obj("term", obj(&criterion.field, value.to_json())));

            if let Some(sub) = &multifield {
                let twin = format!("{}.{}", criterion.field, sub);
                terms.push(obj("term", obj(&twin, value.to_json())));
            }
        }

        Ok(should_wrap(terms))
    }

    pub(super) fn not_clause(&mut self, criterion: &Criterion) -> Result<Json, FilterError> {
        if is_single_null(criterion) {
            self.values.push(Value::Null);
            return Ok(self.existence_clause(&criterion.field));
        }

        let mut negations = Vec::new();

        for value in &criterion.values {
            self.values.push(value.clone());

            // declared strings negate as regular expressions
            let inner = if criterion.declared_type == Type::Str {
                let mut body = Map::new();
                body.insert("value".to_string(), value.to_json());
                body.insert("flags".to_string(), Json::from("ALL"));
                obj("regexp", obj(&criterion.field, Json::Object(body)))
            } else {
                obj("term", obj(&criterion.field, value.to_json()))
            };

            negations.push(obj("bool", obj("must_not", inner)));
        }

        if negations.len() == 1 {
            Ok(negations.remove(0))
        } else {
            Ok(obj("bool", obj("must", Json::Array(negations))))
        }
    }

    pub(super) fn like_clause(&mut self, criterion: &Criterion) -> Result<Json, FilterError> {
        if is_single_null(criterion) {
            return self.is_clause(criterion);
        }

        let mut matches = Vec::new();

        for value in &criterion.values {
            self.values.push(value.clone());
            matches.push(obj(
                "match",
                obj(&criterion.field, obj("query", value.to_json())),
            ));
        }

        Ok(should_wrap(matches))
    }

    pub(super) fn unlike_clause(&mut self, criterion: &Criterion) -> Result<Json, FilterError> {
        let like = self.like_clause(criterion)?;
        Ok(obj("bool", obj("must_not", like)))
    }

    pub(super) fn pattern_clause(&mut self, criterion: &Criterion) -> Result<Json, FilterError> {
        let multifield = self.multifield();
        let mut patterns = Vec::new();

        for value in &criterion.values {
            self.values.push(value.clone());

            let anchored = match criterion.operator {
                crate::filter::Operator::Prefix => format!("^{value}.*"),
                crate::filter::Operator::Suffix => format!(".*{value}$"),
                _ => format!(".*{value}.*"),
            };

            let regexp = |field: &str| {
                let mut body = Map::new();
                body.insert("value".to_string(), Json::from(anchored.as_str()));
                body.insert("flags".to_string(), Json::from("ALL"));
                obj("regexp", obj(field, Json::Object(body)))
            };

            patterns.push(regexp(&criterion.field));

            if let Some(sub) = &multifield {
                patterns.push(regexp(&format!("{}.{}", criterion.field, sub)));
            }
        }

        Ok(should_wrap(patterns))
    }

    pub(super) fn range_clause(&mut self, criterion: &Criterion) -> Result<Json, FilterError> {
        if criterion.values.len() != 1 {
            return Err(FilterError::ComparatorArity {
                operator: criterion.operator.token().to_string(),
                field: criterion.field.clone(),
                count: criterion.values.len(),
            });
        }

        let value = &criterion.values[0];
        self.values.push(value.clone());

        Ok(obj(
            "range",
            obj(
                &criterion.field,
                obj(criterion.operator.token(), value.to_json()),
            ),
        ))
    }

    pub(super) fn fulltext_clause(&mut self, criterion: &Criterion) -> Result<Json, FilterError> {
        let default_operator = if self.fulltext_default_and { "AND" } else { "OR" };
        let mut queries = Vec::new();

        for value in &criterion.values {
            self.values.push(value.clone());

            let mut body = Map::new();
            body.insert("query".to_string(), Json::from(value.to_string()));
            body.insert(
                "default_field".to_string(),
                Json::from(criterion.field.as_str()),
            );
            body.insert("default_operator".to_string(), Json::from(default_operator));
            body.insert("lenient".to_string(), Json::Bool(true));

            queries.push(obj("query_string", Json::Object(body)));
        }

        Ok(should_wrap(queries))
    }
}

fn is_single_null(criterion: &Criterion) -> bool {
    criterion.values.len() == 1 && criterion.values[0].is_null()
}

/// OR a clause list together; single clauses stay bare.
fn should_wrap(mut clauses: Vec<Json>) -> Json {
    if clauses.len() == 1 {
        clauses.remove(0)
    } else {
        obj("bool", obj("should", Json::Array(clauses)))
    }
}
