//! Per-operator document builders for the MongoDB generator

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value as Json};

use super::{ID_FIELD, MongoDb};
use crate::error::FilterError;
use crate::filter::{Criterion, Operator, Value};
use crate::generators::obj;

/// Characters replaced with a regex wildcard for `like`/`unlike` matching.
static CHAR_FILTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\W\s]").expect("char filter pattern"));

impl MongoDb {
    pub(super) fn is_clause(&mut self, criterion: &Criterion) -> Result<Json, FilterError> {
        if is_single_null(criterion) {
            self.values.push(Value::Null);

            return Ok(obj(
                "$or",
                Json::Array(vec![
                    obj(&criterion.field, obj("$exists", Json::Bool(false))),
                    obj(&criterion.field, Json::Null),
                ]),
            ));
        }

        for value in &criterion.values {
            self.values.push(value.clone());
        }

        if criterion.values.len() == 1 {
            // document identities are matched by their string form
            let value = if criterion.field == ID_FIELD {
                Json::from(criterion.values[0].to_string())
            } else {
                criterion.values[0].to_json()
            };

            return Ok(obj(&criterion.field, value));
        }

        let values: Vec<Json> = criterion.values.iter().map(Value::to_json).collect();
        Ok(obj(&criterion.field, obj("$in", Json::Array(values))))
    }

    pub(super) fn not_clause(&mut self, criterion: &Criterion) -> Result<Json, FilterError> {
        if is_single_null(criterion) {
            self.values.push(Value::Null);

            return Ok(obj(
                "$and",
                Json::Array(vec![
                    obj(&criterion.field, obj("$exists", Json::Bool(true))),
                    obj(&criterion.field, obj("$not", Json::Null)),
                ]),
            ));
        }

        for value in &criterion.values {
            self.values.push(value.clone());
        }

        if criterion.values.len() == 1 {
            return Ok(obj(
                &criterion.field,
                obj("$ne", criterion.values[0].to_json()),
            ));
        }

        let values: Vec<Json> = criterion.values.iter().map(Value::to_json).collect();
        Ok(obj(&criterion.field, obj("$nin", Json::Array(values))))
    }

    pub(super) fn pattern_clause(&mut self, criterion: &Criterion) -> Result<Json, FilterError> {
        let mut patterns = Vec::new();

        for value in &criterion.values {
            self.values.push(value.clone());
            let text = value.to_string();

            let pattern = match criterion.operator {
                Operator::Contains => format!(".*{text}.*"),
                Operator::Prefix => format!("^{text}.*"),
                Operator::Suffix => format!(".*{text}$"),
                // fuzzy matching wildcards every non-word character
                Operator::Like | Operator::Unlike => {
                    CHAR_FILTER.replace_all(&text, ".").into_owned()
                }
                _ => {
                    return Err(FilterError::unimplemented(
                        super::BACKEND,
                        &criterion.operator,
                    ));
                }
            };

            let mut body = Map::new();
            body.insert("$regex".to_string(), Json::from(pattern));
            body.insert("$options".to_string(), Json::from("si"));
            let clause = obj(&criterion.field, Json::Object(body));

            if criterion.operator == Operator::Unlike {
                patterns.push(obj("$not", clause));
            } else {
                patterns.push(clause);
            }
        }

        if patterns.len() == 1 {
            Ok(patterns.remove(0))
        } else {
            Ok(obj("$or", Json::Array(patterns)))
        }
    }

    pub(super) fn comparison_clause(&mut self, criterion: &Criterion) -> Result<Json, FilterError> {
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
            &criterion.field,
            obj(
                &format!("${}", criterion.operator.token()),
                value.to_json(),
            ),
        ))
    }

    pub(super) fn range_clause(&mut self, criterion: &Criterion) -> Result<Json, FilterError> {
        if criterion.values.is_empty() || criterion.values.len() % 2 != 0 {
            return Err(FilterError::RangeArity {
                field: criterion.field.clone(),
                count: criterion.values.len(),
            });
        }

        let mut spans = Vec::new();

        for pair in criterion.values.chunks(2) {
            self.values.push(pair[0].clone());
            self.values.push(pair[1].clone());

            let mut bounds = Map::new();
            bounds.insert("$gte".to_string(), pair[0].to_json());
            bounds.insert("$lt".to_string(), pair[1].to_json());

            spans.push(obj(&criterion.field, Json::Object(bounds)));
        }

        if spans.len() == 1 {
            Ok(spans.remove(0))
        } else {
            Ok(obj("$or", Json::Array(spans)))
        }
    }
}

fn is_single_null(criterion: &Criterion) -> bool {
    criterion.values.len() == 1 && criterion.values[0].is_null()
}
