//! Backend-agnostic query compilation.
//!
//! Application code expresses data-selection intent once, in a compact
//! URL-safe filter grammar, and percolate compiles that intent into the
//! native query representation of heterogeneous storage engines:
//! parameterized SQL, Elasticsearch boolean-query documents, MongoDB
//! operator documents, and Bleve-style full-text query strings.
//!
//! The core is a small parser plus a family of generators that preserve
//! identical query semantics (operator meaning, multi-value handling,
//! null handling, type coercion, sort order, pagination) while emitting
//! very different surface syntaxes. It never opens connections or
//! executes queries; it consumes a [`Filter`] and a collection name and
//! produces an opaque payload plus an ordered list of bind values.
//!
//! ```
//! use percolate::{Filter, Sql, render};
//!
//! let filter = Filter::parse("name/contains:ob/-age/gt:21")?;
//!
//! let mut generator = Sql::new();
//! let payload = render(&mut generator, "users", &filter)?;
//!
//! assert_eq!(
//!     String::from_utf8(payload).unwrap(),
//!     "SELECT * FROM users WHERE (name LIKE ?) AND (age > ?) ORDER BY age DESC",
//! );
//! # Ok::<(), percolate::FilterError>(())
//! ```

pub mod error;
pub mod filter;
pub mod generators;

pub use error::FilterError;
pub use filter::{
    Aggregation, Conjunction, Criterion, Filter, Operator, Parser, ParserConfig, Record, SortSpec,
    Type, Value, parse,
};
pub use generators::{
    Bleve, Elasticsearch, EsCompat, Generator, MongoDb, PlaceholderArgument, Sql, SqlDialect,
    SqlStatement, SqlTypeMapping, generator_for, render,
};
