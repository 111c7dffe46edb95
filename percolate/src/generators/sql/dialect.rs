//! SQL dialect configuration
//!
//! Placeholder style, identifier quoting, field normalization, and native
//! type mapping differ per database; a [`SqlDialect`] bundles those choices
//! so the generator itself stays dialect-agnostic.

use crate::filter::Type;

/// What gets substituted into the placeholder format string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaceholderArgument {
    /// The format string is emitted verbatim (`?`).
    #[default]
    None,
    /// Zero-based placeholder index.
    Index,
    /// One-based placeholder index (`$1`, `$2`, ...).
    Index1,
    /// The field name (`:name`).
    Field,
}

/// Native type names for each declared value type, with optional length
/// and float precision defaults.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SqlTypeMapping {
    pub string_type: String,
    pub string_type_length: usize,
    pub integer_type: String,
    pub float_type: String,
    pub float_type_length: usize,
    pub float_type_precision: usize,
    pub boolean_type: String,
    pub boolean_type_length: usize,
    pub datetime_type: String,
    pub object_type: String,
    pub array_type: String,
    pub raw_type: String,
}

impl SqlTypeMapping {
    /// No mapping at all: type-cast hints are omitted entirely.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn mysql() -> Self {
        Self {
            string_type: "VARCHAR".into(),
            string_type_length: 255,
            integer_type: "BIGINT".into(),
            float_type: "DECIMAL".into(),
            float_type_length: 10,
            float_type_precision: 8,
            boolean_type: "BOOL".into(),
            boolean_type_length: 0,
            datetime_type: "DATETIME".into(),
            object_type: "MEDIUMBLOB".into(),
            array_type: "MEDIUMBLOB".into(),
            raw_type: "MEDIUMBLOB".into(),
        }
    }

    pub fn postgres() -> Self {
        Self {
            string_type: "TEXT".into(),
            string_type_length: 0,
            integer_type: "BIGINT".into(),
            float_type: "NUMERIC".into(),
            float_type_length: 0,
            float_type_precision: 0,
            boolean_type: "BOOLEAN".into(),
            boolean_type_length: 0,
            datetime_type: "TIMESTAMP".into(),
            object_type: "VARCHAR".into(),
            array_type: "VARCHAR".into(),
            raw_type: "BYTEA".into(),
        }
    }

    pub fn sqlite() -> Self {
        Self {
            string_type: "TEXT".into(),
            string_type_length: 0,
            integer_type: "INTEGER".into(),
            float_type: "REAL".into(),
            float_type_length: 0,
            float_type_precision: 0,
            boolean_type: "INTEGER".into(),
            boolean_type_length: 1,
            datetime_type: "INTEGER".into(),
            object_type: "BLOB".into(),
            array_type: "BLOB".into(),
            raw_type: "BLOB".into(),
        }
    }

    pub fn cassandra() -> Self {
        Self {
            string_type: "VARCHAR".into(),
            string_type_length: 0,
            integer_type: "INT".into(),
            float_type: "FLOAT".into(),
            float_type_length: 0,
            float_type_precision: 0,
            boolean_type: "TINYINT".into(),
            boolean_type_length: 1,
            datetime_type: "DATETIME".into(),
            object_type: "BLOB".into(),
            array_type: "BLOB".into(),
            raw_type: "BLOB".into(),
        }
    }
}

/// One database's SQL surface: placeholders, quoting, normalization, and
/// type mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlDialect {
    /// Placeholder format string; `{}` receives the configured argument.
    pub placeholder_format: String,
    pub placeholder_argument: PlaceholderArgument,
    /// Format string wrapping table names (`{}`, `"{}"`, `` `{}` ``).
    pub table_name_format: String,
    /// Format string wrapping field names.
    pub field_name_format: String,
    /// Fields whose comparisons pass through the normalizer format.
    pub normalize_fields: Vec<String>,
    /// Format string wrapping normalized field and value tokens
    /// (`LOWER({})`).
    pub normalizer_format: String,
    pub type_mapping: SqlTypeMapping,
}

impl Default for SqlDialect {
    fn default() -> Self {
        Self::mysql()
    }
}

impl SqlDialect {
    /// MySQL/SQLite-compatible defaults: `?` placeholders, no quoting.
    pub fn mysql() -> Self {
        Self {
            placeholder_format: "?".to_string(),
            placeholder_argument: PlaceholderArgument::None,
            table_name_format: "{}".to_string(),
            field_name_format: "{}".to_string(),
            normalize_fields: Vec::new(),
            normalizer_format: "{}".to_string(),
            type_mapping: SqlTypeMapping::mysql(),
        }
    }

    /// PostgreSQL: `$N` placeholders, double-quoted identifiers.
    pub fn postgres() -> Self {
        Self {
            placeholder_format: "${}".to_string(),
            placeholder_argument: PlaceholderArgument::Index1,
            table_name_format: "\"{}\"".to_string(),
            field_name_format: "\"{}\"".to_string(),
            type_mapping: SqlTypeMapping::postgres(),
            ..Self::mysql()
        }
    }

    /// SQLite: `?` placeholders, double-quoted identifiers.
    pub fn sqlite() -> Self {
        Self {
            table_name_format: "\"{}\"".to_string(),
            field_name_format: "\"{}\"".to_string(),
            type_mapping: SqlTypeMapping::sqlite(),
            ..Self::mysql()
        }
    }

    pub fn table_name(&self, name: &str) -> String {
        apply_format(&self.table_name_format, name)
    }

    pub fn field_name(&self, name: &str) -> String {
        if name.is_empty() {
            return String::new();
        }

        apply_format(&self.field_name_format, name)
    }

    /// The placeholder token for the given field and zero-based index.
    pub fn placeholder(&self, field: &str, index: usize) -> String {
        match self.placeholder_argument {
            PlaceholderArgument::None => self.placeholder_format.clone(),
            PlaceholderArgument::Index => {
                apply_format(&self.placeholder_format, &index.to_string())
            }
            PlaceholderArgument::Index1 => {
                apply_format(&self.placeholder_format, &(index + 1).to_string())
            }
            PlaceholderArgument::Field => apply_format(&self.placeholder_format, field),
        }
    }

    /// Wrap a field or value token in the normalizer when the field is
    /// registered for normalization.
    pub fn normalize(&self, field: &str, token: &str) -> String {
        if self.normalize_fields.iter().any(|f| f == field) {
            apply_format(&self.normalizer_format, token)
        } else {
            token.to_string()
        }
    }

    /// The dialect's native type for a declared value type, with length
    /// and precision suffixes. `None` when the mapping has no entry.
    pub fn native_type(&self, declared: Type, length: usize) -> Option<String> {
        let m = &self.type_mapping;
        let mut precision = 0;

        let (name, length) = match declared {
            Type::Auto => return None,
            Type::Str => (
                &m.string_type,
                if length == 0 { m.string_type_length } else { length },
            ),
            Type::Int => (&m.integer_type, length),
            Type::Float => {
                precision = m.float_type_precision;
                (
                    &m.float_type,
                    if length == 0 { m.float_type_length } else { length },
                )
            }
            Type::Bool => (
                &m.boolean_type,
                if m.boolean_type_length > 0 {
                    m.boolean_type_length
                } else {
                    length
                },
            ),
            Type::Time => (&m.datetime_type, length),
            Type::Object => (&m.object_type, length),
            Type::Array => (&m.array_type, length),
            Type::Raw => (&m.raw_type, length),
        };

        if name.is_empty() {
            return None;
        }

        let mut out = name.to_uppercase();

        if length > 0 {
            if precision > 0 {
                out.push_str(&format!("({length},{precision})"));
            } else {
                out.push_str(&format!("({length})"));
            }
        }

        Some(out)
    }
}

/// Substitute a value into a `{}` format string; formats without a `{}`
/// are returned verbatim.
pub(crate) fn apply_format(format: &str, value: &str) -> String {
    if format.contains("{}") {
        format.replacen("{}", value, 1)
    } else {
        format.to_string()
    }
}
