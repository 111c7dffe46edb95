//! Filter and criterion type definitions
//!
//! A [`Criterion`] is one field comparison; a [`Filter`] is the full query
//! intent: ordered criteria plus sort, projection, paging, and options.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use super::parser::{ParserConfig, query_escape};
use super::value::{Type, Value};

/// Comparison operator carried by a criterion.
///
/// Unrecognized operator tokens are preserved verbatim so that each
/// generator can fail fast with an error naming the operator, instead of
/// silently compiling a wrong clause.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Operator {
    #[default]
    Is,
    Not,
    Contains,
    Prefix,
    Suffix,
    Like,
    Unlike,
    Gt,
    Gte,
    Lt,
    Lte,
    Range,
    Fulltext,
    Other(String),
}

impl Operator {
    /// Parse a value-term operator token; the empty token is equality.
    pub fn from_token(token: &str) -> Self {
        match token {
            "" | "is" => Self::Is,
            "not" => Self::Not,
            "contains" => Self::Contains,
            "prefix" => Self::Prefix,
            "suffix" => Self::Suffix,
            "like" => Self::Like,
            "unlike" => Self::Unlike,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "range" => Self::Range,
            "fulltext" => Self::Fulltext,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn token(&self) -> &str {
        match self {
            Self::Is => "is",
            Self::Not => "not",
            Self::Contains => "contains",
            Self::Prefix => "prefix",
            Self::Suffix => "suffix",
            Self::Like => "like",
            Self::Unlike => "unlike",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Range => "range",
            Self::Fulltext => "fulltext",
            Self::Other(s) => s,
        }
    }

    /// Whether the operator compares values exactly (no normalization).
    pub fn is_exact_match(&self) -> bool {
        matches!(
            self,
            Self::Is | Self::Not | Self::Gt | Self::Gte | Self::Lt | Self::Lte
        )
    }

    /// Whether the operator inverts its comparison.
    pub fn is_inverting(&self) -> bool {
        matches!(self, Self::Not | Self::Unlike)
    }

    fn is_default(&self) -> bool {
        *self == Self::Is
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl Serialize for Operator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.token())
    }
}

impl<'de> Deserialize<'de> for Operator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        Ok(Self::from_token(&token))
    }
}

/// One field/operator/values comparison unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    #[serde(rename = "type", default, skip_serializing_if = "Type::is_auto")]
    pub declared_type: Type,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub length: usize,
    pub field: String,
    #[serde(default, skip_serializing_if = "Operator::is_default")]
    pub operator: Operator,
    pub values: Vec<Value>,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl Criterion {
    /// Equality criterion on a field.
    pub fn equals(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            declared_type: Type::Auto,
            length: 0,
            field: field.into(),
            operator: Operator::Is,
            values,
        }
    }

    /// Criterion with an explicit operator.
    pub fn with_operator(field: impl Into<String>, operator: Operator, values: Vec<Value>) -> Self {
        Self {
            declared_type: Type::Auto,
            length: 0,
            field: field.into(),
            operator,
            values,
        }
    }

    /// Canonical spec form of this criterion under the given grammar
    /// configuration. Equality elides its operator token.
    pub fn to_spec(&self, config: &ParserConfig) -> String {
        let mut out = String::new();

        if !self.declared_type.is_auto() {
            out.push_str(self.declared_type.token());

            if self.length > 0 {
                out.push_str(&config.field_length_delimiter);
                out.push_str(&self.length.to_string());
            }

            out.push_str(&config.modifier_delimiter);
        }

        out.push_str(&self.field);
        out.push_str(&config.field_term_separator);

        if !self.operator.is_default() {
            out.push_str(self.operator.token());
            out.push_str(&config.modifier_delimiter);
        }

        let values: Vec<String> = self
            .values
            .iter()
            .map(|v| {
                let text = v.to_string();
                if config.unescape_values {
                    query_escape(&text)
                } else {
                    text
                }
            })
            .collect();

        out.push_str(&values.join(&config.value_separator));
        out
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_spec(&ParserConfig::default()))
    }
}

/// One decoded sort directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub descending: bool,
}

/// How criteria combine within one filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Conjunction {
    #[default]
    And,
    Or,
}

/// Per-field aggregation applied during grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    First,
    Last,
    Minimum,
    Maximum,
    Sum,
    Average,
    Count,
}

impl Aggregation {
    /// The portable SQL aggregate function, where one exists.
    pub const fn sql_function(&self) -> Option<&'static str> {
        match self {
            Self::Minimum => Some("MIN"),
            Self::Maximum => Some("MAX"),
            Self::Sum => Some("SUM"),
            Self::Average => Some("AVG"),
            Self::Count => Some("COUNT"),
            Self::First | Self::Last => None,
        }
    }

    pub const fn token(&self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Last => "last",
            Self::Minimum => "minimum",
            Self::Maximum => "maximum",
            Self::Sum => "sum",
            Self::Average => "average",
            Self::Count => "count",
        }
    }
}

/// The full compiled query intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filter {
    /// The raw spec this filter was parsed from, if any.
    pub spec: String,
    pub match_all: bool,
    pub conjunction: Conjunction,
    pub criteria: Vec<Criterion>,
    /// Sort directives in sigil-encoded form (`-age` descends).
    pub sort: Vec<String>,
    /// Field projection; empty means all fields.
    pub fields: Vec<String>,
    /// Free-form generator options, applied before fields and criteria.
    pub options: BTreeMap<String, Value>,
    pub limit: usize,
    pub offset: usize,
    /// The field treated as the record identity, aliasable per backend.
    pub identity_field: String,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            spec: String::new(),
            match_all: false,
            conjunction: Conjunction::And,
            criteria: Vec::new(),
            sort: Vec::new(),
            fields: Vec::new(),
            options: BTreeMap::new(),
            limit: 0,
            offset: 0,
            identity_field: ParserConfig::default().default_identity_field,
        }
    }
}

impl Filter {
    /// The match-everything filter.
    pub fn all() -> Self {
        let all_value = ParserConfig::default().all_value;

        Self {
            spec: all_value,
            match_all: true,
            ..Self::default()
        }
    }

    /// A filter with no criteria at all. Distinct from [`Filter::all`]:
    /// what an empty criteria set selects is the caller's decision.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a spec string under the default grammar configuration.
    pub fn parse(spec: &str) -> Result<Self, crate::error::FilterError> {
        super::parser::Parser::default().parse(spec)
    }

    /// Build a filter from `field => value` pairs, where keys may carry a
    /// type prefix and values an operator prefix, exactly as in the
    /// textual grammar.
    pub fn from_map<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self, crate::error::FilterError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let config = ParserConfig::default();
        let mut filter = Self::default();

        for (key, value) in pairs {
            let (type_token, field) = config.split_modifier(key.as_ref());
            let (op_token, raw_values) = config.split_modifier(value.as_ref());
            let declared = Type::from_token(type_token);

            let mut values = Vec::new();
            for raw in raw_values.split(config.value_separator.as_str()) {
                values.push(Value::coerce(field, raw, declared)?);
            }

            filter.criteria.push(Criterion {
                declared_type: declared,
                length: 0,
                field: field.to_string(),
                operator: Operator::from_token(op_token),
                values,
            });
        }

        Ok(filter)
    }

    /// Append criteria; clears the match-all flag.
    pub fn add_criteria(&mut self, criteria: impl IntoIterator<Item = Criterion>) -> &mut Self {
        self.match_all = false;
        self.criteria.extend(criteria);
        self
    }

    /// Replace the sort directives (sigil-encoded).
    pub fn sort_by<S: Into<String>>(&mut self, fields: impl IntoIterator<Item = S>) -> &mut Self {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();

        if !fields.is_empty() {
            self.sort = fields;
        }

        self
    }

    /// Append projected fields.
    pub fn with_fields<S: Into<String>>(&mut self, fields: impl IntoIterator<Item = S>) -> &mut Self {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Set result paging.
    pub fn bounded_by(&mut self, limit: usize, offset: usize) -> &mut Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    /// Fields referenced by the criteria, in order.
    pub fn criteria_fields(&self) -> Vec<&str> {
        self.criteria.iter().map(|c| c.field.as_str()).collect()
    }

    /// Whether the projection selects exactly the identity field.
    pub fn id_only(&self) -> bool {
        self.fields.len() == 1 && self.fields[0] == self.identity_field
    }

    /// Values of the first criterion on the given field.
    pub fn values_for(&self, field: &str) -> Option<&[Value]> {
        self.criteria
            .iter()
            .find(|c| c.field == field)
            .map(|c| c.values.as_slice())
    }

    /// First value of the first criterion.
    pub fn first_value(&self) -> Option<&Value> {
        self.criteria.first().and_then(|c| c.values.first())
    }

    /// First value bound to the identity field.
    pub fn identity_value(&self) -> Option<&Value> {
        self.criteria
            .iter()
            .find(|c| c.field == self.identity_field)
            .and_then(|c| c.values.first())
    }

    /// True when this filter matches every record.
    pub fn is_match_all(&self) -> bool {
        self.criteria.is_empty()
            && (self.match_all || self.spec == ParserConfig::default().all_value)
    }

    /// Decode the sigil-encoded sort list in encounter order.
    pub fn sort_specs(&self) -> Vec<SortSpec> {
        let config = ParserConfig::default();

        self.sort
            .iter()
            .map(|entry| {
                let descending = entry.starts_with(&config.sort_descending);
                let field = entry
                    .trim_start_matches(&config.sort_descending)
                    .trim_start_matches(&config.sort_ascending);

                SortSpec {
                    field: field.to_string(),
                    descending,
                }
            })
            .collect()
    }

    /// Canonical spec form; the inverse of parsing.
    pub fn to_spec(&self) -> String {
        let config = ParserConfig::default();

        if self.is_match_all() {
            return config.all_value;
        }

        let criteria: Vec<String> = self.criteria.iter().map(|c| c.to_spec(&config)).collect();
        criteria.join(&config.criteria_separator)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_spec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn criterion_spec_round_trip_forms() {
        let c = Criterion {
            declared_type: Type::Str,
            length: 16,
            field: "name".to_string(),
            operator: Operator::Prefix,
            values: vec![Value::String("foo".to_string())],
        };
        assert_eq!(c.to_string(), "str#16:name/prefix:foo");

        let c = Criterion::equals("id", vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(c.to_string(), "id/1|2");
    }

    #[test]
    fn match_all_spec_form() {
        assert_eq!(Filter::all().to_spec(), "all");
        assert!(Filter::all().is_match_all());
        assert!(!Filter::empty().is_match_all());
    }

    #[test]
    fn id_only_projection() {
        let mut f = Filter::all();
        f.fields = vec!["id".to_string()];
        assert!(f.id_only());

        let f = Filter::all();
        assert!(!f.id_only());
    }

    #[test]
    fn sort_specs_decode_sigils() {
        let mut f = Filter::empty();
        f.sort = vec!["+name".to_string(), "-age".to_string(), "city".to_string()];

        assert_eq!(
            f.sort_specs(),
            vec![
                SortSpec {
                    field: "name".to_string(),
                    descending: false
                },
                SortSpec {
                    field: "age".to_string(),
                    descending: true
                },
                SortSpec {
                    field: "city".to_string(),
                    descending: false
                },
            ]
        );
    }

    #[test]
    fn from_map_carries_prefixes() {
        let f = Filter::from_map([("f1", "v1"), ("int:f2", "2"), ("float:f3", "gte:3")]).unwrap();
        assert_eq!(f.criteria.len(), 3);

        for criterion in &f.criteria {
            match criterion.field.as_str() {
                "f1" => {
                    assert_eq!(criterion.values, vec![Value::String("v1".to_string())]);
                }
                "f2" => {
                    assert_eq!(criterion.declared_type, Type::Int);
                    assert_eq!(criterion.values, vec![Value::Int(2)]);
                }
                "f3" => {
                    assert_eq!(criterion.declared_type, Type::Float);
                    assert_eq!(criterion.operator, Operator::Gte);
                    assert_eq!(criterion.values, vec![Value::Float(3.0)]);
                }
                other => panic!("unexpected field {other:?}"),
            }
        }
    }

    #[test]
    fn add_criteria_clears_match_all() {
        let mut f = Filter::all();
        f.add_criteria([Criterion::equals("id", vec![Value::Int(1)])]);
        assert!(!f.is_match_all());
        assert_eq!(f.criteria_fields(), vec!["id"]);
    }

    #[test]
    fn identity_value_lookup() {
        let mut f = Filter::empty();
        f.add_criteria([
            Criterion::equals("name", vec![Value::from("ted")]),
            Criterion::equals("id", vec![Value::Int(42)]),
        ]);

        assert_eq!(f.identity_value(), Some(&Value::Int(42)));
        assert_eq!(f.first_value(), Some(&Value::from("ted")));
        assert_eq!(f.values_for("name"), Some(&[Value::from("ted")][..]));
        assert_eq!(f.values_for("missing"), None);
    }
}
