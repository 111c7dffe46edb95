//! Filter spec parsing
//!
//! Parses the URL-safe filter grammar into [`Filter`] values. All grammar
//! separators live in an explicit [`ParserConfig`] so parsers are reentrant
//! and alternate delimiter schemes can be substituted wholesale.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{Criterion, Filter, Operator};
use super::value::{Type, Value};
use crate::error::FilterError;

/// Grammar configuration for one parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Separator between criteria (`/`).
    pub criteria_separator: String,
    /// Separator between a field term and its value term (`/`).
    pub field_term_separator: String,
    /// Delimiter between a type token and its length (`#`).
    pub field_length_delimiter: String,
    /// Delimiter after type and operator prefixes (`:`).
    pub modifier_delimiter: String,
    /// Separator between multiple values in one criterion (`|`).
    pub value_separator: String,
    /// Ascending sort sigil (`+`).
    pub sort_ascending: String,
    /// Descending sort sigil (`-`).
    pub sort_descending: String,
    /// The match-everything constant (`all`).
    pub all_value: String,
    /// Field name treated as the record identity by default (`id`).
    pub default_identity_field: String,
    /// Percent-decode each value after splitting.
    pub unescape_values: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            criteria_separator: "/".to_string(),
            field_term_separator: "/".to_string(),
            field_length_delimiter: "#".to_string(),
            modifier_delimiter: ":".to_string(),
            value_separator: "|".to_string(),
            sort_ascending: "+".to_string(),
            sort_descending: "-".to_string(),
            all_value: "all".to_string(),
            default_identity_field: "id".to_string(),
            unescape_values: false,
        }
    }
}

impl ParserConfig {
    /// Split a `modifier:rest` token at the first delimiter. Tokens with
    /// no delimiter have an empty modifier.
    pub fn split_modifier<'a>(&self, token: &'a str) -> (&'a str, &'a str) {
        match token.split_once(self.modifier_delimiter.as_str()) {
            Some((modifier, rest)) => (modifier, rest),
            None => ("", token),
        }
    }
}

/// Parser for the URL-safe filter grammar.
#[derive(Debug, Clone, Default)]
pub struct Parser {
    config: ParserConfig,
}

impl Parser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse a spec string into a [`Filter`].
    pub fn parse(&self, spec: &str) -> Result<Filter, FilterError> {
        let config = &self.config;
        let spec = spec
            .strip_prefix(config.criteria_separator.as_str())
            .unwrap_or(spec);

        let mut filter = Filter {
            spec: spec.to_string(),
            identity_field: config.default_identity_field.clone(),
            ..Filter::default()
        };

        if spec == config.all_value {
            filter.match_all = true;
            return Ok(filter);
        }

        if spec.is_empty() {
            return Ok(filter);
        }

        let tokens = self.tokenize(spec);

        if tokens.len() < 2 || tokens.len() % 2 != 0 {
            return Err(FilterError::UnpairedFieldTerm {
                spec: spec.to_string(),
                token: tokens.last().map(|t| t.to_string()).unwrap_or_default(),
            });
        }

        for pair in tokens.chunks(2) {
            let (field_token, value_token) = (pair[0], pair[1]);

            // sort sigils come before the type prefix and are recorded
            // once the bare field name is known
            let (descending, field_token) =
                if let Some(rest) = field_token.strip_prefix(config.sort_descending.as_str()) {
                    (Some(true), rest)
                } else if let Some(rest) = field_token.strip_prefix(config.sort_ascending.as_str())
                {
                    (Some(false), rest)
                } else {
                    (None, field_token)
                };

            let (type_token, field) = config.split_modifier(field_token);

            let (declared_type, length) = if type_token.is_empty() {
                (Type::Auto, 0)
            } else {
                match type_token.split_once(config.field_length_delimiter.as_str()) {
                    None => (Type::from_token(type_token), 0),
                    Some((type_name, length_token)) => {
                        let length = length_token.parse::<usize>().map_err(|_| {
                            FilterError::InvalidLength {
                                token: field_token.to_string(),
                                length: length_token.to_string(),
                            }
                        })?;

                        (Type::from_token(type_name), length)
                    }
                }
            };

            match descending {
                Some(true) => filter
                    .sort
                    .push(format!("{}{}", config.sort_descending, field)),
                Some(false) => filter.sort.push(field.to_string()),
                None => {}
            }

            let (op_token, values_token) = config.split_modifier(value_token);
            let operator = Operator::from_token(op_token);

            let mut values = Vec::new();

            for raw in values_token.split(config.value_separator.as_str()) {
                let raw = if config.unescape_values {
                    query_unescape(raw)?
                } else {
                    raw.to_string()
                };

                values.push(Value::coerce(field, &raw, declared_type)?);
            }

            filter.criteria.push(Criterion {
                declared_type,
                length,
                field: field.to_string(),
                operator,
                values,
            });
        }

        debug!(
            criteria = filter.criteria.len(),
            sort = filter.sort.len(),
            "parsed filter spec"
        );

        Ok(filter)
    }

    /// Split the spec into alternating field/value tokens. When the two
    /// separators differ, each criteria chunk splits once on the
    /// field-term separator.
    fn tokenize<'a>(&self, spec: &'a str) -> Vec<&'a str> {
        let config = &self.config;
        let chunks = spec.split(config.criteria_separator.as_str());

        if config.criteria_separator == config.field_term_separator {
            return chunks.collect();
        }

        let mut tokens = Vec::new();

        for chunk in chunks {
            match chunk.split_once(config.field_term_separator.as_str()) {
                Some((field, value)) => {
                    tokens.push(field);
                    tokens.push(value);
                }
                None => tokens.push(chunk),
            }
        }

        tokens
    }
}

/// Parse a spec string under the default grammar configuration.
pub fn parse(spec: &str) -> Result<Filter, FilterError> {
    Parser::default().parse(spec)
}

/// Decode percent escapes and `+`-encoded spaces.
pub(crate) fn query_unescape(raw: &str) -> Result<String, FilterError> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let (hi, lo) = match (bytes.get(i + 1), bytes.get(i + 2)) {
                    (Some(hi), Some(lo)) => (hex_digit(*hi), hex_digit(*lo)),
                    _ => (None, None),
                };

                match (hi, lo) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 3;
                    }
                    _ => {
                        return Err(FilterError::Unescape {
                            value: raw.to_string(),
                            reason: "invalid percent escape".to_string(),
                        });
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8(out).map_err(|_| FilterError::Unescape {
        value: raw.to_string(),
        reason: "decoded value is not valid utf-8".to_string(),
    })
}

/// Encode a value for embedding in a spec, the inverse of
/// [`query_unescape`].
pub(crate) fn query_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());

    for b in raw.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }

    out
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_all() {
        let f = parse("all").unwrap();
        assert!(f.match_all);
        assert_eq!(f.spec, "all");
        assert!(f.criteria.is_empty());
    }

    #[test]
    fn parse_empty_is_not_match_all() {
        let f = parse("").unwrap();
        assert!(!f.match_all);
        assert!(f.criteria.is_empty());
        assert!(!f.is_match_all());
    }

    #[test]
    fn parse_criteria_with_types_and_operators() {
        let f = parse("k1/contains:v1/int:k2/lt:2|3").unwrap();
        assert_eq!(f.criteria.len(), 2);

        assert_eq!(f.criteria[0].declared_type, Type::Auto);
        assert_eq!(f.criteria[0].field, "k1");
        assert_eq!(f.criteria[0].operator, Operator::Contains);
        assert_eq!(f.criteria[0].values, vec![Value::String("v1".to_string())]);

        assert_eq!(f.criteria[1].declared_type, Type::Int);
        assert_eq!(f.criteria[1].field, "k2");
        assert_eq!(f.criteria[1].operator, Operator::Lt);
        assert_eq!(f.criteria[1].values, vec![Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn parse_type_with_length() {
        let f = parse("str#16:name/prefix:foo").unwrap();
        assert_eq!(f.criteria.len(), 1);
        assert_eq!(f.criteria[0].declared_type, Type::Str);
        assert_eq!(f.criteria[0].length, 16);
        assert_eq!(f.criteria[0].field, "name");
        assert_eq!(f.criteria[0].operator, Operator::Prefix);
        assert_eq!(f.criteria[0].values, vec![Value::String("foo".to_string())]);

        // the spec form survives a round trip
        assert_eq!(f.to_spec(), "str#16:name/prefix:foo");
    }

    #[test]
    fn parse_malformed_length_fails() {
        let err = parse("str#xx:name/foo").unwrap_err();
        assert_eq!(
            err,
            FilterError::InvalidLength {
                token: "str#xx:name".to_string(),
                length: "xx".to_string(),
            }
        );
    }

    #[test]
    fn parse_unknown_type_falls_back_to_str() {
        let f = parse("varchar:name/7").unwrap();
        assert_eq!(f.criteria[0].declared_type, Type::Str);
        assert_eq!(f.criteria[0].values, vec![Value::String("7".to_string())]);
    }

    #[test]
    fn parse_declared_type_conversion_failure() {
        let err = parse("int:age/banana").unwrap_err();
        assert_eq!(err, FilterError::conversion("age", "banana", "int"));
    }

    #[test]
    fn parse_odd_token_count_fails() {
        assert!(matches!(
            parse("name").unwrap_err(),
            FilterError::UnpairedFieldTerm { .. }
        ));

        let err = parse("a/1/b").unwrap_err();
        assert_eq!(
            err,
            FilterError::UnpairedFieldTerm {
                spec: "a/1/b".to_string(),
                token: "b".to_string(),
            }
        );
    }

    #[test]
    fn parse_sort_sigils_in_encounter_order() {
        let f = parse("name/test/-age/4/+group/one").unwrap();

        assert_eq!(f.sort, vec!["-age".to_string(), "group".to_string()]);
        assert_eq!(f.criteria.len(), 3);
        assert_eq!(f.criteria_fields(), vec!["name", "age", "group"]);

        let sort = f.sort_specs();
        assert_eq!(sort.len(), 2);
        assert_eq!(sort[0].field, "age");
        assert!(sort[0].descending);
        assert_eq!(sort[1].field, "group");
        assert!(!sort[1].descending);
    }

    #[test]
    fn parse_autotypes_plain_values() {
        let f = parse("id/1/enabled/true/factor/3.5/name/ted").unwrap();
        assert_eq!(f.criteria[0].values, vec![Value::Int(1)]);
        assert_eq!(f.criteria[1].values, vec![Value::Bool(true)]);
        assert_eq!(f.criteria[2].values, vec![Value::Float(3.5)]);
        assert_eq!(f.criteria[3].values, vec![Value::String("ted".to_string())]);
    }

    #[test]
    fn parse_null_literal() {
        let f = parse("enabled/null").unwrap();
        assert_eq!(f.criteria[0].values, vec![Value::Null]);

        let f = parse("enabled/not:null").unwrap();
        assert_eq!(f.criteria[0].operator, Operator::Not);
        assert_eq!(f.criteria[0].values, vec![Value::Null]);
    }

    #[test]
    fn parse_leading_separator_is_tolerated() {
        let f = parse("/id/1").unwrap();
        assert_eq!(f.criteria.len(), 1);
        assert_eq!(f.criteria[0].field, "id");
    }

    #[test]
    fn parse_alternate_delimiters() {
        let parser = Parser::new(ParserConfig {
            criteria_separator: " ".to_string(),
            field_term_separator: "=".to_string(),
            ..ParserConfig::default()
        });

        let f = parser.parse("k1=contains:v1 int:k2=lt:4|5").unwrap();
        assert_eq!(f.criteria.len(), 2);

        assert_eq!(f.criteria[0].field, "k1");
        assert_eq!(f.criteria[0].operator, Operator::Contains);
        assert_eq!(f.criteria[0].values, vec![Value::String("v1".to_string())]);

        assert_eq!(f.criteria[1].declared_type, Type::Int);
        assert_eq!(f.criteria[1].field, "k2");
        assert_eq!(f.criteria[1].values, vec![Value::Int(4), Value::Int(5)]);
    }

    #[test]
    fn parse_unescapes_values_when_configured() {
        let parser = Parser::new(ParserConfig {
            unescape_values: true,
            ..ParserConfig::default()
        });

        let f = parser.parse("name/Bob%20Johnson|Frank+Stone").unwrap();
        assert_eq!(
            f.criteria[0].values,
            vec![
                Value::String("Bob Johnson".to_string()),
                Value::String("Frank Stone".to_string()),
            ]
        );

        let err = parser.parse("name/Bob%2").unwrap_err();
        assert!(matches!(err, FilterError::Unescape { .. }));
    }

    #[test]
    fn query_escape_round_trip() {
        let original = "Bob Johnson & Sons (est. 1987)";
        let escaped = query_escape(original);
        assert_eq!(query_unescape(&escaped).unwrap(), original);
    }

    #[test]
    fn unknown_operator_token_is_preserved() {
        let f = parse("name/hello:world").unwrap();
        assert_eq!(
            f.criteria[0].operator,
            Operator::Other("hello".to_string())
        );
        assert_eq!(
            f.criteria[0].values,
            vec![Value::String("world".to_string())]
        );
    }

    #[test]
    fn parse_time_typed_values() {
        let f = parse("time:created_at/lt:2006-01-02T00:00:00Z").unwrap();
        match &f.criteria[0].values[0] {
            Value::Time(t) => {
                assert_eq!(t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true), "2006-01-02T00:00:00Z");
            }
            other => panic!("expected a time value, got {other:?}"),
        }
    }
}
