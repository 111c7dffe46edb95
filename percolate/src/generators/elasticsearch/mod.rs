//! Elasticsearch query generator
//!
//! Compiles criteria into the engine's boolean clause tree rather than
//! flat text. The envelope differs between pre-5.x and 5.x+ clusters
//! (legacy `fields` projection and `missing` clauses versus `_source`
//! includes and negated `exists`), selected by [`EsCompat`].

mod clauses;

use std::collections::BTreeMap;

use serde_json::{Map, Value as Json};
use tracing::debug;

use super::{Generator, obj};
use crate::error::FilterError;
use crate::filter::{Conjunction, Criterion, Filter, Operator, Value};

const BACKEND: &str = "elasticsearch";

/// Minimum cluster generation the payload must be compatible with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EsCompat {
    /// Pre-5.x: top-level `fields` projection, `missing` clauses.
    Legacy,
    /// 5.x and later: `_source` includes, `exists` negation.
    #[default]
    Modern,
}

/// Elasticsearch query generator.
#[derive(Debug, Clone, Default)]
pub struct Elasticsearch {
    pub compat: EsCompat,
    /// Default conjunction for `fulltext` query-string queries.
    pub fulltext_default_and: bool,

    collection: String,
    fields: Vec<String>,
    criteria: Vec<Json>,
    options: BTreeMap<String, Value>,
    values: Vec<Value>,
    payload: Vec<u8>,
}

impl Elasticsearch {
    pub fn new() -> Self {
        Self {
            fulltext_default_and: true,
            ..Self::default()
        }
    }

    /// A generator targeting pre-5.x clusters.
    pub fn legacy() -> Self {
        Self {
            compat: EsCompat::Legacy,
            ..Self::new()
        }
    }

    fn build_sort(&self, filter: &Filter) -> Json {
        let directives: Vec<Json> = filter
            .sort_specs()
            .iter()
            .map(|s| {
                let direction = if s.descending { "desc" } else { "asc" };

                match self.compat {
                    EsCompat::Modern => obj(&s.field, obj("order", Json::from(direction))),
                    EsCompat::Legacy => obj(&s.field, Json::from(direction)),
                }
            })
            .collect();

        Json::Array(directives)
    }
}

impl Generator for Elasticsearch {
    fn initialize(&mut self, collection: &str) -> Result<(), FilterError> {
        self.reset();
        self.collection = collection.to_string();
        Ok(())
    }

    fn finalize(&mut self, filter: &Filter) -> Result<(), FilterError> {
        let query = if filter.is_match_all() {
            obj("match_all", Json::Object(Map::new()))
        } else {
            let context = match filter.conjunction {
                Conjunction::And => "must",
                Conjunction::Or => "should",
            };

            obj("bool", obj(context, Json::Array(self.criteria.clone())))
        };

        let mut document = Map::new();
        document.insert("query".to_string(), query);

        if filter.offset > 0 {
            document.insert("from".to_string(), Json::from(filter.offset));
        }

        if filter.limit > 0 {
            document.insert("size".to_string(), Json::from(filter.limit));
        }

        if !filter.sort.is_empty() {
            document.insert("sort".to_string(), self.build_sort(filter));
        }

        if !self.fields.is_empty() {
            let fields: Vec<Json> = self.fields.iter().map(|f| Json::from(f.as_str())).collect();

            match self.compat {
                EsCompat::Modern => {
                    document.insert(
                        "_source".to_string(),
                        obj("include", Json::Array(fields)),
                    );
                }
                EsCompat::Legacy => {
                    document.insert("fields".to_string(), Json::Array(fields));
                }
            }
        }

        self.payload = serde_json::to_vec_pretty(&Json::Object(document))
            .expect("a JSON document always serializes");

        debug!(
            collection = %self.collection,
            clauses = self.criteria.len(),
            "assembled elasticsearch query"
        );

        Ok(())
    }

    fn with_field(&mut self, field: &str) -> Result<(), FilterError> {
        self.fields.push(field.to_string());
        Ok(())
    }

    fn with_criterion(&mut self, criterion: Criterion) -> Result<(), FilterError> {
        if criterion.values.is_empty() {
            return Err(FilterError::EmptyValues {
                field: criterion.field,
            });
        }

        let clause = match &criterion.operator {
            Operator::Is => self.is_clause(&criterion),
            Operator::Not => self.not_clause(&criterion),
            Operator::Like => self.like_clause(&criterion),
            Operator::Unlike => self.unlike_clause(&criterion),
            Operator::Contains | Operator::Prefix | Operator::Suffix => {
                self.pattern_clause(&criterion)
            }
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
                self.range_clause(&criterion)
            }
            Operator::Fulltext => self.fulltext_clause(&criterion),
            other => Err(FilterError::unimplemented(BACKEND, other)),
        }?;

        self.criteria.push(clause);
        Ok(())
    }

    fn set_option(&mut self, key: &str, value: Value) -> Result<(), FilterError> {
        self.options.insert(key.to_string(), value);
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
        self.options.clear();
        self.values.clear();
        self.payload.clear();
    }
}
