//! Full-text query-string generator
//!
//! Compiles criteria into a flat query-string mini-language: `+` marks
//! required terms, `-` prohibited ones, `*` wildcards express prefix,
//! suffix, and substring matches, and numeric comparisons become
//! `field:>N` range tokens.

use tracing::debug;

use super::Generator;
use crate::error::FilterError;
use crate::filter::{Conjunction, Criterion, Filter, Operator, Type, Value};

const BACKEND: &str = "bleve";

/// Query-string generator for Bleve-style full-text indexes.
#[derive(Debug, Clone, Default)]
pub struct Bleve {
    collection: String,
    must: Vec<String>,
    must_not: Vec<String>,
    values: Vec<Value>,
    payload: String,
}

impl Bleve {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_term(&mut self, criterion: &Criterion, value: &Value) -> Result<(), FilterError> {
        let field = &criterion.field;

        match &criterion.operator {
            Operator::Is | Operator::Not => {
                let term = if value.is_null() {
                    format!("{field}:\"\"")
                } else {
                    let text = value.to_string();

                    // declared strings and terms with whitespace are quoted
                    if criterion.declared_type == Type::Str || text.contains(char::is_whitespace) {
                        format!("{field}:{text:?}")
                    } else {
                        format!("{field}:{text}")
                    }
                };

                if criterion.operator == Operator::Not {
                    self.must_not.push(term);
                } else {
                    self.must.push(term);
                }
            }
            Operator::Prefix | Operator::Suffix | Operator::Contains => {
                let text = value.to_string();

                let wildcarded = match criterion.operator {
                    Operator::Prefix => format!("{text}*"),
                    Operator::Suffix => format!("*{text}"),
                    _ => format!("*{text}*"),
                };

                self.must.push(format!("{field}:{wildcarded:?}"));
            }
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
                let symbol = match criterion.operator {
                    Operator::Gt => ">",
                    Operator::Gte => ">=",
                    Operator::Lt => "<",
                    _ => "<=",
                };

                let bound = numeric_text(field, value)?;
                self.must.push(format!("{field}:{symbol}{bound}"));
            }
            other => {
                return Err(FilterError::unimplemented(BACKEND, other));
            }
        }

        self.values.push(value.clone());
        Ok(())
    }
}

/// Integer-then-float coercion for range tokens.
fn numeric_text(field: &str, value: &Value) -> Result<String, FilterError> {
    match value {
        Value::Int(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::String(s) => {
            if let Ok(i) = s.parse::<i64>() {
                Ok(i.to_string())
            } else if let Ok(f) = s.parse::<f64>() {
                Ok(f.to_string())
            } else {
                Err(FilterError::conversion(field, s, "number"))
            }
        }
        other => Err(FilterError::conversion(field, &other.to_string(), "number")),
    }
}

impl Generator for Bleve {
    fn initialize(&mut self, collection: &str) -> Result<(), FilterError> {
        self.reset();
        self.collection = collection.to_string();
        Ok(())
    }

    fn finalize(&mut self, filter: &Filter) -> Result<(), FilterError> {
        if filter.is_match_all() {
            self.payload.clear();
            return Ok(());
        }

        // under an OR conjunction terms are optional rather than required
        let must_prefix = match filter.conjunction {
            Conjunction::And => "+",
            Conjunction::Or => "",
        };

        let mut terms: Vec<String> = self
            .must
            .iter()
            .map(|t| format!("{must_prefix}{t}"))
            .collect();
        terms.extend(self.must_not.iter().map(|t| format!("-{t}")));

        self.payload = terms.join(" ");

        debug!(
            collection = %self.collection,
            terms = terms.len(),
            "assembled query string"
        );

        Ok(())
    }

    fn with_field(&mut self, _field: &str) -> Result<(), FilterError> {
        Ok(())
    }

    fn with_criterion(&mut self, criterion: Criterion) -> Result<(), FilterError> {
        if criterion.values.is_empty() {
            return Err(FilterError::EmptyValues {
                field: criterion.field,
            });
        }

        for value in &criterion.values {
            self.push_term(&criterion, value)?;
        }

        Ok(())
    }

    fn set_option(&mut self, _key: &str, _value: Value) -> Result<(), FilterError> {
        Ok(())
    }

    fn payload(&self) -> Vec<u8> {
        self.payload.clone().into_bytes()
    }

    fn values(&self) -> Vec<Value> {
        self.values.clone()
    }

    fn reset(&mut self) {
        self.collection.clear();
        self.must.clear();
        self.must_not.clear();
        self.values.clear();
        self.payload.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::parse;
    use crate::generators::render;

    fn render_query(spec: &str) -> String {
        let filter = parse(spec).unwrap();
        let mut generator = Bleve::new();
        let payload = render(&mut generator, "test", &filter).unwrap();
        String::from_utf8(payload).unwrap()
    }

    #[test]
    fn query_string_terms() {
        let cases: Vec<(&str, &str)> = vec![
            ("id/1", "+id:1"),
            ("str:id/2", "+id:\"2\""),
            ("int:id/3", "+id:3"),
            ("float:id/4", "+id:4"),
            ("id/prefix:5", "+id:\"5*\""),
            ("id/suffix:6", "+id:\"*6\""),
            ("id/contains:7", "+id:\"*7*\""),
            ("str:id/prefix:8", "+id:\"8*\""),
            ("str:id/suffix:9", "+id:\"*9\""),
            ("str:id/contains:10", "+id:\"*10*\""),
            ("id/not:11", "-id:11"),
            ("str:id/not:12", "-id:\"12\""),
            ("num/gt:13", "+num:>13"),
            ("num/gte:14", "+num:>=14"),
            ("num/lt:15", "+num:<15"),
            ("num/lte:16", "+num:<=16"),
            ("int:num/gt:17", "+num:>17"),
            ("int:num/gte:18", "+num:>=18"),
            ("int:num/lt:19", "+num:<19"),
            ("int:num/lte:20", "+num:<=20"),
            ("float:num/gt:21", "+num:>21"),
            ("float:num/gte:22", "+num:>=22"),
            ("float:num/lt:23", "+num:<23"),
            ("float:num/lte:24", "+num:<=24"),
            ("num/gte:0/num/lt:5", "+num:>=0 +num:<5"),
            ("id/4/name/contains:Test Phrase", "+id:4 +name:\"*Test Phrase*\""),
            (
                "name/prefix:Starts With/name/not:Starts With",
                "+name:\"Starts With*\" -name:\"Starts With\"",
            ),
            (
                "name/prefix:Starts With/name/not:Starts",
                "+name:\"Starts With*\" -name:Starts",
            ),
            ("id/null", "+id:\"\""),
            ("id/not:null", "-id:\"\""),
        ];

        for (spec, expected) in cases {
            assert_eq!(render_query(spec), expected, "spec: {spec}");
        }
    }

    #[test]
    fn match_all_renders_an_empty_query() {
        assert_eq!(render_query("all"), "");
    }

    #[test]
    fn or_conjunction_drops_the_must_prefix() {
        let mut filter = parse("name/bob/age/gt:21").unwrap();
        filter.conjunction = Conjunction::Or;

        let mut generator = Bleve::new();
        let payload = render(&mut generator, "test", &filter).unwrap();

        assert_eq!(String::from_utf8(payload).unwrap(), "name:bob age:>21");
    }

    #[test]
    fn non_numeric_range_bounds_are_rejected() {
        let filter = parse("num/gt:banana").unwrap();
        let mut generator = Bleve::new();

        let err = render(&mut generator, "test", &filter).unwrap_err();
        assert_eq!(err, FilterError::conversion("num", "banana", "number"));
    }

    #[test]
    fn unsupported_operators_are_reported() {
        for spec in ["name/like:bob", "name/fulltext:bob", "factor/range:1|2"] {
            let filter = parse(spec).unwrap();
            let mut generator = Bleve::new();

            let err = render(&mut generator, "test", &filter).unwrap_err();
            assert!(
                matches!(err, FilterError::UnimplementedOperator { backend: "bleve", .. }),
                "spec: {spec}"
            );
        }
    }

    #[test]
    fn values_are_captured_in_term_order() {
        let filter = parse("id/4/name/contains:Test Phrase").unwrap();
        let mut generator = Bleve::new();
        render(&mut generator, "test", &filter).unwrap();

        assert_eq!(
            generator.values(),
            vec![Value::Int(4), Value::from("Test Phrase")]
        );
    }
}
