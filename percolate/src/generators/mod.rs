//! Backend query generators
//!
//! Each generator compiles a [`Filter`] into one backend's native query
//! payload. The [`render`] driver sequences the same calls into any
//! generator, which is what lets every backend be tested against the same
//! filter fixtures.

pub mod bleve;
pub mod elasticsearch;
pub mod mongodb;
pub mod sql;

use serde_json::{Map, Value as Json};
use tracing::debug;

pub use bleve::Bleve;
pub use elasticsearch::{Elasticsearch, EsCompat};
pub use mongodb::MongoDb;
pub use sql::{PlaceholderArgument, Sql, SqlDialect, SqlStatement, SqlTypeMapping};

use crate::error::FilterError;
use crate::filter::{Aggregation, Criterion, Filter, Value};

/// Single-entry JSON object, preserving insertion order.
pub(crate) fn obj(key: &str, value: Json) -> Json {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Json::Object(map)
}

/// Capability interface implemented by every backend generator.
///
/// A generator is a per-render accumulator: `initialize` resets it,
/// `with_*` calls feed it, `finalize` assembles the payload. Generators
/// are reusable sequentially, never concurrently.
pub trait Generator {
    fn initialize(&mut self, collection: &str) -> Result<(), FilterError>;

    fn finalize(&mut self, filter: &Filter) -> Result<(), FilterError>;

    fn with_field(&mut self, field: &str) -> Result<(), FilterError>;

    fn with_criterion(&mut self, criterion: Criterion) -> Result<(), FilterError>;

    fn set_option(&mut self, key: &str, value: Value) -> Result<(), FilterError>;

    fn group_by_field(&mut self, _field: &str) -> Result<(), FilterError> {
        Ok(())
    }

    fn aggregate_by_field(
        &mut self,
        _aggregation: Aggregation,
        _field: &str,
    ) -> Result<(), FilterError> {
        Ok(())
    }

    /// The serialized query payload assembled by `finalize`.
    fn payload(&self) -> Vec<u8>;

    /// Captured bind values, in placeholder emission order.
    fn values(&self) -> Vec<Value>;

    /// Clear accumulated state so the generator can be reused.
    fn reset(&mut self);
}

/// Drive a generator over a filter and return the payload.
///
/// Projection fields and criteria naming the literal `id` are substituted
/// with the filter's identity field. The first error aborts the render;
/// no partial payload is ever returned.
pub fn render(
    generator: &mut dyn Generator,
    collection: &str,
    filter: &Filter,
) -> Result<Vec<u8>, FilterError> {
    debug!(
        collection,
        criteria = filter.criteria.len(),
        "rendering filter"
    );

    generator.initialize(collection)?;

    for (key, value) in &filter.options {
        generator.set_option(key, value.clone())?;
    }

    for field in &filter.fields {
        let field = if !filter.identity_field.is_empty() && field == "id" {
            filter.identity_field.as_str()
        } else {
            field.as_str()
        };

        generator.with_field(field)?;
    }

    for criterion in &filter.criteria {
        let mut criterion = criterion.clone();

        if !filter.identity_field.is_empty() && criterion.field == "id" {
            criterion.field = filter.identity_field.clone();
        }

        generator.with_criterion(criterion)?;
    }

    generator.finalize(filter)?;

    Ok(generator.payload())
}

/// Construct a generator by backend name.
pub fn generator_for(backend: &str) -> Option<Box<dyn Generator>> {
    match backend {
        "sql" => Some(Box::new(Sql::new())),
        "elasticsearch" | "es" => Some(Box::new(Elasticsearch::new())),
        "mongodb" | "mongo" => Some(Box::new(MongoDb::new())),
        "bleve" => Some(Box::new(Bleve::new())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::parse;

    #[test]
    fn registry_knows_every_backend() {
        for backend in ["sql", "elasticsearch", "es", "mongodb", "mongo", "bleve"] {
            assert!(generator_for(backend).is_some(), "missing {backend}");
        }

        assert!(generator_for("cobol").is_none());
    }

    #[test]
    fn render_substitutes_the_identity_field() {
        let mut filter = parse("id/1").unwrap();
        filter.identity_field = "uuid".to_string();
        filter.fields = vec!["id".to_string(), "name".to_string()];

        let mut generator = Sql::new();
        let payload = render(&mut generator, "foo", &filter).unwrap();

        assert_eq!(
            String::from_utf8(payload).unwrap(),
            "SELECT uuid, name FROM foo WHERE (uuid = ?)"
        );
    }

    #[test]
    fn render_is_idempotent_across_fresh_generators() {
        let filter = parse("age/gt:21/name/prefix:bob").unwrap();

        let mut first = Sql::new();
        let mut second = Sql::new();

        let a = render(&mut first, "foo", &filter).unwrap();
        let b = render(&mut second, "foo", &filter).unwrap();

        assert_eq!(a, b);
        assert_eq!(first.values(), second.values());
    }

    #[test]
    fn render_aborts_on_the_first_error() {
        let filter = parse("name/fulltext:hello").unwrap();
        let mut generator = Sql::new();

        let err = render(&mut generator, "foo", &filter).unwrap_err();
        assert_eq!(err, FilterError::unimplemented("sql", "fulltext"));
    }
}
