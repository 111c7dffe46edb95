//! Filter model, grammar parser, and in-memory matcher

mod matcher;
mod parser;
mod record;
mod types;
mod value;

pub use parser::{Parser, ParserConfig, parse};
pub use record::Record;
pub use types::{Aggregation, Conjunction, Criterion, Filter, Operator, SortSpec};
pub use value::{Type, Value};
