//! MongoDB query generator
//!
//! Compiles criteria into the store's operator-document form (`$in`,
//! `$ne`, `$regex`, `$gte`/`$lt`, ...). The `id` field is aliased to the
//! store's `_id` document identity, and raw string values are autotyped
//! before capture unless the criterion declares an explicit type.

mod clauses;

use serde_json::{Map, Value as Json};
use tracing::debug;

use super::{Generator, obj};
use crate::error::FilterError;
use crate::filter::{Conjunction, Criterion, Filter, Operator, Value};

const BACKEND: &str = "mongodb";

/// The store's document identity field.
const ID_FIELD: &str = "_id";

/// MongoDB query generator.
#[derive(Debug, Clone, Default)]
pub struct MongoDb {
    collection: String,
    fields: Vec<String>,
    criteria: Vec<Json>,
    values: Vec<Value>,
    payload: Vec<u8>,
}

impl MongoDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Projected fields, with the identity alias applied.
    pub fn projected_fields(&self) -> &[String] {
        &self.fields
    }
}

fn alias_identity(field: &str) -> &str {
    if field == "id" { ID_FIELD } else { field }
}

impl Generator for MongoDb {
    fn initialize(&mut self, collection: &str) -> Result<(), FilterError> {
        self.reset();
        self.collection = collection.to_string();
        Ok(())
    }

    fn finalize(&mut self, filter: &Filter) -> Result<(), FilterError> {
        let document = if filter.is_match_all() || self.criteria.is_empty() {
            Json::Object(Map::new())
        } else if self.criteria.len() == 1 {
            self.criteria[0].clone()
        } else {
            let context = match filter.conjunction {
                Conjunction::And => "$and",
                Conjunction::Or => "$or",
            };

            obj(context, Json::Array(self.criteria.clone()))
        };

        self.payload =
            serde_json::to_vec_pretty(&document).expect("a JSON document always serializes");

        debug!(
            collection = %self.collection,
            clauses = self.criteria.len(),
            "assembled mongodb filter document"
        );

        Ok(())
    }

    fn with_field(&mut self, field: &str) -> Result<(), FilterError> {
        self.fields.push(alias_identity(field).to_string());
        Ok(())
    }

    fn with_criterion(&mut self, criterion: Criterion) -> Result<(), FilterError> {
        if criterion.values.is_empty() {
            return Err(FilterError::EmptyValues {
                field: criterion.field,
            });
        }

        let mut criterion = criterion;
        criterion.field = alias_identity(&criterion.field).to_string();

        // untyped string values are autotyped before they reach a clause
        if criterion.declared_type.is_auto() {
            for value in &mut criterion.values {
                if let Value::String(s) = value {
                    *value = Value::autotype(s);
                }
            }
        }

        let clause = match &criterion.operator {
            Operator::Is => self.is_clause(&criterion),
            Operator::Not => self.not_clause(&criterion),
            Operator::Contains
            | Operator::Prefix
            | Operator::Suffix
            | Operator::Like
            | Operator::Unlike => self.pattern_clause(&criterion),
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
                self.comparison_clause(&criterion)
            }
            Operator::Range => self.range_clause(&criterion),
            other => Err(FilterError::unimplemented(BACKEND, other)),
        }?;

        self.criteria.push(clause);
        Ok(())
    }

    fn set_option(&mut self, _key: &str, _value: Value) -> Result<(), FilterError> {
        Ok(())
    }

    fn payload(&self) -> Vec<u8> {
        self.payload.clone()
    }

    fn values(&self) -> Vec<Value> {
        self.values.clone()
    }

    fn reset(&mut self) {
        self.collection.clear();
        self.fields.clear();
        self.criteria.clear();
        self.values.clear();
        self.payload.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::parse;
    use crate::generators::render;
    use serde_json::json;

    fn render_query(spec: &str) -> (Json, Vec<Value>) {
        let filter = parse(spec).unwrap();
        let mut generator = MongoDb::new();
        let payload = render(&mut generator, "foo", &filter).unwrap();

        (
            serde_json::from_slice(&payload).unwrap(),
            generator.values(),
        )
    }

    #[test]
    fn operator_documents() {
        let cases: Vec<(&str, Json, Vec<Value>)> = vec![
            ("all", json!({}), vec![]),
            // the identity value is stringified for single equality
            ("id/1", json!({"_id": "1"}), vec![Value::Int(1)]),
            (
                "id/not:1",
                json!({"_id": {"$ne": 1}}),
                vec![Value::Int(1)],
            ),
            (
                "name/Bob Johnson",
                json!({"name": "Bob Johnson"}),
                vec![Value::from("Bob Johnson")],
            ),
            ("age/21", json!({"age": 21}), vec![Value::Int(21)]),
            (
                "enabled/true",
                json!({"enabled": true}),
                vec![Value::Bool(true)],
            ),
            (
                "enabled/false",
                json!({"enabled": false}),
                vec![Value::Bool(false)],
            ),
            (
                "enabled/null",
                json!({"$or": [
                    {"enabled": {"$exists": false}},
                    {"enabled": null}
                ]}),
                vec![Value::Null],
            ),
            (
                "enabled/not:null",
                json!({"$and": [
                    {"enabled": {"$exists": true}},
                    {"enabled": {"$not": null}}
                ]}),
                vec![Value::Null],
            ),
            (
                "age/lt:21",
                json!({"age": {"$lt": 21}}),
                vec![Value::Int(21)],
            ),
            (
                "age/lte:21",
                json!({"age": {"$lte": 21}}),
                vec![Value::Int(21)],
            ),
            (
                "age/gt:21",
                json!({"age": {"$gt": 21}}),
                vec![Value::Int(21)],
            ),
            (
                "age/gte:21",
                json!({"age": {"$gte": 21}}),
                vec![Value::Int(21)],
            ),
            (
                "factor/lt:3.141597",
                json!({"factor": {"$lt": 3.141597}}),
                vec![Value::Float(3.141597)],
            ),
            (
                "name/contains:ob",
                json!({"name": {"$regex": ".*ob.*", "$options": "si"}}),
                vec![Value::from("ob")],
            ),
            (
                "name/prefix:ob",
                json!({"name": {"$regex": "^ob.*", "$options": "si"}}),
                vec![Value::from("ob")],
            ),
            (
                "name/suffix:ob",
                json!({"name": {"$regex": ".*ob$", "$options": "si"}}),
                vec![Value::from("ob")],
            ),
            (
                "age/7/name/ted",
                json!({"$and": [{"age": 7}, {"name": "ted"}]}),
                vec![Value::Int(7), Value::from("ted")],
            ),
            (
                "id/1|2",
                json!({"_id": {"$in": [1, 2]}}),
                vec![Value::Int(1), Value::Int(2)],
            ),
            (
                "name/not:bob|alice",
                json!({"name": {"$nin": ["bob", "alice"]}}),
                vec![Value::from("bob"), Value::from("alice")],
            ),
        ];

        for (spec, query, values) in cases {
            let (actual, actual_values) = render_query(spec);
            assert_eq!(actual, query, "spec: {spec}");
            assert_eq!(actual_values, values, "spec: {spec}");
        }
    }

    #[test]
    fn like_passes_through_the_character_filter() {
        let (query, values) = render_query("name/like:Bob Johnson");
        assert_eq!(
            query,
            json!({"name": {"$regex": "Bob.Johnson", "$options": "si"}})
        );
        assert_eq!(values, vec![Value::from("Bob Johnson")]);

        let (query, _) = render_query("name/unlike:Bob-Johnson");
        assert_eq!(
            query,
            json!({"$not": {"name": {"$regex": "Bob.Johnson", "$options": "si"}}})
        );
    }

    #[test]
    fn multi_value_patterns_group_with_or() {
        let (query, _) = render_query("name/contains:ob|ed");
        assert_eq!(
            query,
            json!({"$or": [
                {"name": {"$regex": ".*ob.*", "$options": "si"}},
                {"name": {"$regex": ".*ed.*", "$options": "si"}}
            ]})
        );
    }

    #[test]
    fn range_consumes_value_pairs() {
        let (query, values) = render_query("factor/range:1|10");
        assert_eq!(query, json!({"factor": {"$gte": 1, "$lt": 10}}));
        assert_eq!(values, vec![Value::Int(1), Value::Int(10)]);

        let (query, _) = render_query("factor/range:1|10|20|30");
        assert_eq!(
            query,
            json!({"$or": [
                {"factor": {"$gte": 1, "$lt": 10}},
                {"factor": {"$gte": 20, "$lt": 30}}
            ]})
        );

        let filter = parse("factor/range:1|10|20").unwrap();
        let mut generator = MongoDb::new();
        let err = render(&mut generator, "foo", &filter).unwrap_err();
        assert_eq!(
            err,
            FilterError::RangeArity {
                field: "factor".to_string(),
                count: 3,
            }
        );
    }

    #[test]
    fn comparison_operators_take_one_value() {
        let filter = parse("age/gt:1|2").unwrap();
        let mut generator = MongoDb::new();
        let err = render(&mut generator, "foo", &filter).unwrap_err();

        assert_eq!(
            err,
            FilterError::ComparatorArity {
                operator: "gt".to_string(),
                field: "age".to_string(),
                count: 2,
            }
        );
    }

    #[test]
    fn declared_types_suppress_autotyping() {
        let (query, values) = render_query("str:age/21");
        assert_eq!(query, json!({"age": "21"}));
        assert_eq!(values, vec![Value::from("21")]);
    }

    #[test]
    fn fulltext_is_unimplemented() {
        let filter = parse("body/fulltext:hello").unwrap();
        let mut generator = MongoDb::new();
        let err = render(&mut generator, "foo", &filter).unwrap_err();
        assert_eq!(err, FilterError::unimplemented("mongodb", "fulltext"));
    }

    #[test]
    fn projected_fields_alias_the_identity() {
        let mut filter = parse("all").unwrap();
        filter.fields = vec!["id".to_string(), "name".to_string()];

        let mut generator = MongoDb::new();
        render(&mut generator, "foo", &filter).unwrap();

        assert_eq!(generator.projected_fields(), &["_id", "name"]);
    }

    #[test]
    fn or_conjunction_groups_criteria() {
        let mut filter = parse("age/7/name/ted").unwrap();
        filter.conjunction = Conjunction::Or;

        let mut generator = MongoDb::new();
        let payload = render(&mut generator, "foo", &filter).unwrap();
        let query: Json = serde_json::from_slice(&payload).unwrap();

        assert_eq!(query, json!({"$or": [{"age": 7}, {"name": "ted"}]}));
    }
}
