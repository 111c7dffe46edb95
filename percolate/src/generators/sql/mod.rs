//! SQL statement generator
//!
//! Compiles criteria into parameterized SELECT/INSERT/UPDATE/DELETE
//! statements. Every dialect-specific choice (placeholders, quoting, type
//! names) lives in [`SqlDialect`]; this module only sequences clauses and
//! captures bind values in placeholder order.

mod dialect;

use std::collections::BTreeMap;

pub use dialect::{PlaceholderArgument, SqlDialect, SqlTypeMapping};

use dialect::apply_format;

use super::Generator;
use crate::error::FilterError;
use crate::filter::{Aggregation, Criterion, Filter, Operator, Value};

const BACKEND: &str = "sql";

/// Which statement shape `finalize` produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqlStatement {
    #[default]
    Select,
    Insert,
    Update,
    Delete,
}

/// SQL statement generator.
#[derive(Debug, Clone, Default)]
pub struct Sql {
    pub statement: SqlStatement,
    pub dialect: SqlDialect,
    /// Group multi-valued equality criteria into a single `IN(...)`.
    pub use_in_statement: bool,
    /// Emit `SELECT DISTINCT`.
    pub distinct: bool,
    /// Emit `SELECT COUNT(1)` and drop projection, ordering, and paging.
    pub count: bool,
    /// Per-field format strings applied to projected fields (`SUM({})`).
    pub field_wrappers: BTreeMap<String, String>,
    /// Column data for INSERT and UPDATE statements.
    pub input_data: BTreeMap<String, Value>,

    collection: String,
    fields: Vec<String>,
    group_by: Vec<String>,
    aggregates: Vec<(Aggregation, String)>,
    criteria: Vec<Criterion>,
    input_values: Vec<Value>,
    criterion_values: Vec<Value>,
    placeholders: usize,
    payload: String,
}

impl Sql {
    pub fn new() -> Self {
        Self {
            use_in_statement: true,
            ..Self::default()
        }
    }

    /// A generator preconfigured for one statement shape.
    pub fn statement(statement: SqlStatement) -> Self {
        Self {
            statement,
            ..Self::new()
        }
    }

    fn format_field(&self, name: &str) -> String {
        let formatted = self.dialect.field_name(name);

        match self.field_wrappers.get(name) {
            Some(wrapper) => apply_format(wrapper, &formatted),
            None => formatted,
        }
    }

    fn next_placeholder(&mut self, field: &str) -> String {
        let token = self.dialect.placeholder(field, self.placeholders);
        self.placeholders += 1;
        token
    }

    /// Whether a criterion takes the grouped `IN(...)` path.
    fn takes_in_statement(&self, criterion: &Criterion) -> bool {
        self.use_in_statement
            && criterion.values.len() > 1
            && matches!(
                criterion.operator,
                Operator::Is | Operator::Not | Operator::Like | Operator::Unlike
            )
    }

    fn build_select(&mut self, filter: &Filter) -> Result<String, FilterError> {
        let mut out = String::from("SELECT ");

        if self.count {
            out.push_str("COUNT(1)");
        } else {
            if self.distinct {
                out.push_str("DISTINCT ");
            }

            let mut projection: Vec<String> =
                self.fields.iter().map(|f| self.format_field(f)).collect();

            for (aggregation, field) in &self.aggregates {
                let function = aggregation.sql_function().ok_or_else(|| {
                    FilterError::UnsupportedAggregation {
                        backend: BACKEND,
                        aggregation: aggregation.token().to_string(),
                    }
                })?;

                let field = self.dialect.field_name(field);
                projection.push(format!("{function}({field}) AS {field}"));
            }

            if projection.is_empty() {
                out.push('*');
            } else {
                out.push_str(&projection.join(", "));
            }
        }

        out.push_str(" FROM ");
        out.push_str(&self.collection);
        out.push_str(&self.build_where(filter)?);

        if !self.group_by.is_empty() {
            let grouped: Vec<String> = self
                .group_by
                .iter()
                .map(|f| self.dialect.field_name(f))
                .collect();

            out.push_str(" GROUP BY ");
            out.push_str(&grouped.join(", "));
        }

        if !self.count {
            out.push_str(&self.build_order_by(filter));
            out.push_str(&build_limit_offset(filter));
        }

        Ok(out)
    }

    fn build_insert(&mut self) -> Result<String, FilterError> {
        if self.input_data.is_empty() {
            return Err(FilterError::MissingInputData {
                statement: "INSERT",
            });
        }

        let mut out = String::from("INSERT INTO ");
        out.push_str(&self.collection);
        out.push_str(" (");

        let fields: Vec<String> = self
            .input_data
            .keys()
            .map(|f| self.format_field(f))
            .collect();
        out.push_str(&fields.join(", "));
        out.push_str(") VALUES (");

        let input = std::mem::take(&mut self.input_data);
        let mut tokens = Vec::with_capacity(input.len());

        for (field, value) in &input {
            tokens.push(self.next_placeholder(field));
            self.input_values.push(value.clone());
        }

        self.input_data = input;

        out.push_str(&tokens.join(", "));
        out.push(')');

        Ok(out)
    }

    fn build_update(&mut self, filter: &Filter) -> Result<String, FilterError> {
        if self.input_data.is_empty() {
            return Err(FilterError::MissingInputData {
                statement: "UPDATE",
            });
        }

        let mut out = String::from("UPDATE ");
        out.push_str(&self.collection);
        out.push_str(" SET ");

        let input = std::mem::take(&mut self.input_data);
        let mut pairs = Vec::with_capacity(input.len());

        for (field, value) in &input {
            let formatted = self.format_field(field);
            let token = self.next_placeholder(field);
            self.input_values.push(value.clone());
            pairs.push(format!("{formatted} = {token}"));
        }

        self.input_data = input;

        out.push_str(&pairs.join(", "));
        out.push_str(&self.build_where(filter)?);

        Ok(out)
    }

    fn build_delete(&mut self, filter: &Filter) -> Result<String, FilterError> {
        let mut out = String::from("DELETE FROM ");
        out.push_str(&self.collection);
        out.push_str(&self.build_where(filter)?);
        Ok(out)
    }

    fn build_where(&mut self, filter: &Filter) -> Result<String, FilterError> {
        if self.criteria.is_empty() {
            return Ok(String::new());
        }

        let joiner = match filter.conjunction {
            crate::filter::Conjunction::And => " AND ",
            crate::filter::Conjunction::Or => " OR ",
        };

        let criteria = std::mem::take(&mut self.criteria);
        let mut clauses = Vec::with_capacity(criteria.len());

        for criterion in &criteria {
            clauses.push(self.build_criterion_clause(criterion)?);
        }

        self.criteria = criteria;

        Ok(format!(" WHERE {}", clauses.join(joiner)))
    }

    fn build_criterion_clause(&mut self, criterion: &Criterion) -> Result<String, FilterError> {
        let field = &criterion.field;

        // declared types become a cast hint when the dialect maps them
        let lhs = match self
            .dialect
            .native_type(criterion.declared_type, criterion.length)
        {
            Some(native) => format!("CAST({} AS {native})", self.format_field(field)),
            None => self.format_field(field),
        };

        if self.takes_in_statement(criterion) {
            let normalized_lhs = self.dialect.normalize(field, &lhs);
            let mut items = Vec::with_capacity(criterion.values.len());

            for value in &criterion.values {
                if value.is_null() {
                    self.criterion_values.push(Value::Null);
                    items.push("NULL".to_string());
                } else {
                    let token = self.next_placeholder(field);
                    self.criterion_values.push(value.clone());
                    items.push(self.dialect.normalize(field, &token));
                }
            }

            let negation = if criterion.operator.is_inverting() {
                "NOT "
            } else {
                ""
            };

            return Ok(format!(
                "({normalized_lhs} {negation}IN({}))",
                items.join(", ")
            ));
        }

        if criterion.operator == Operator::Range {
            let low = self.next_placeholder(field);
            self.criterion_values.push(criterion.values[0].clone());
            let high = self.next_placeholder(field);
            self.criterion_values.push(criterion.values[1].clone());

            return Ok(format!("({lhs} BETWEEN {low} AND {high})"));
        }

        let mut parts = Vec::with_capacity(criterion.values.len());

        for value in &criterion.values {
            let part = match &criterion.operator {
                Operator::Is if value.is_null() => {
                    self.criterion_values.push(Value::Null);
                    format!("{lhs} IS NULL")
                }
                Operator::Not if value.is_null() => {
                    self.criterion_values.push(Value::Null);
                    format!("{lhs} IS NOT NULL")
                }
                Operator::Is => {
                    let token = self.next_placeholder(field);
                    self.criterion_values.push(value.clone());
                    format!(
                        "{} = {}",
                        self.dialect.normalize(field, &lhs),
                        self.dialect.normalize(field, &token)
                    )
                }
                Operator::Not => {
                    let token = self.next_placeholder(field);
                    self.criterion_values.push(value.clone());
                    format!(
                        "{} <> {}",
                        self.dialect.normalize(field, &lhs),
                        self.dialect.normalize(field, &token)
                    )
                }
                Operator::Contains | Operator::Prefix | Operator::Suffix => {
                    // wildcards are doubled so the bound pattern survives
                    // printf-style statement formatting downstream
                    let text = value.to_string();
                    let pattern = match criterion.operator {
                        Operator::Prefix => format!("{text}%%"),
                        Operator::Suffix => format!("%%{text}"),
                        _ => format!("%%{text}%%"),
                    };

                    let token = self.next_placeholder(field);
                    self.criterion_values.push(Value::String(pattern));
                    format!(
                        "{} LIKE {}",
                        self.dialect.normalize(field, &lhs),
                        self.dialect.normalize(field, &token)
                    )
                }
                Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
                    let symbol = match criterion.operator {
                        Operator::Gt => ">",
                        Operator::Gte => ">=",
                        Operator::Lt => "<",
                        _ => "<=",
                    };

                    let token = self.next_placeholder(field);
                    self.criterion_values.push(value.clone());
                    format!("{lhs} {symbol} {token}")
                }
                other => {
                    return Err(FilterError::unimplemented(BACKEND, other));
                }
            };

            parts.push(part);
        }

        Ok(format!("({})", parts.join(" OR ")))
    }

    fn build_order_by(&self, filter: &Filter) -> String {
        let sort = filter.sort_specs();

        if sort.is_empty() {
            return String::new();
        }

        let directives: Vec<String> = sort
            .iter()
            .map(|s| {
                let direction = if s.descending { "DESC" } else { "ASC" };
                format!("{} {direction}", self.format_field(&s.field))
            })
            .collect();

        format!(" ORDER BY {}", directives.join(", "))
    }
}

fn build_limit_offset(filter: &Filter) -> String {
    let mut out = String::new();

    if filter.limit > 0 {
        out.push_str(&format!(" LIMIT {}", filter.limit));

        if filter.offset > 0 {
            out.push_str(&format!(" OFFSET {}", filter.offset));
        }
    }

    out
}

impl Generator for Sql {
    fn initialize(&mut self, collection: &str) -> Result<(), FilterError> {
        self.reset();
        self.collection = self.dialect.table_name(collection);
        Ok(())
    }

    fn finalize(&mut self, filter: &Filter) -> Result<(), FilterError> {
        self.payload = match self.statement {
            SqlStatement::Select => self.build_select(filter)?,
            SqlStatement::Insert => self.build_insert()?,
            SqlStatement::Update => self.build_update(filter)?,
            SqlStatement::Delete => self.build_delete(filter)?,
        };

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

        match &criterion.operator {
            Operator::Is
            | Operator::Not
            | Operator::Contains
            | Operator::Prefix
            | Operator::Suffix
            | Operator::Gt
            | Operator::Gte
            | Operator::Lt
            | Operator::Lte => {}
            Operator::Like | Operator::Unlike => {
                // fuzzy matching only has a SQL rendering as a grouped
                // IN over normalized values
                if !self.takes_in_statement(&criterion) {
                    return Err(FilterError::unimplemented(BACKEND, &criterion.operator));
                }
            }
            Operator::Range => {
                if criterion.values.len() != 2 {
                    return Err(FilterError::RangeArity {
                        field: criterion.field,
                        count: criterion.values.len(),
                    });
                }
            }
            other => {
                return Err(FilterError::unimplemented(BACKEND, other));
            }
        }

        self.criteria.push(criterion);
        Ok(())
    }

    fn set_option(&mut self, _key: &str, _value: Value) -> Result<(), FilterError> {
        Ok(())
    }

    fn group_by_field(&mut self, field: &str) -> Result<(), FilterError> {
        self.group_by.push(field.to_string());
        Ok(())
    }

    fn aggregate_by_field(
        &mut self,
        aggregation: Aggregation,
        field: &str,
    ) -> Result<(), FilterError> {
        if aggregation.sql_function().is_none() {
            return Err(FilterError::UnsupportedAggregation {
                backend: BACKEND,
                aggregation: aggregation.token().to_string(),
            });
        }

        self.aggregates.push((aggregation, field.to_string()));
        Ok(())
    }

    fn payload(&self) -> Vec<u8> {
        self.payload.clone().into_bytes()
    }

    fn values(&self) -> Vec<Value> {
        let mut values = self.input_values.clone();
        values.extend(self.criterion_values.iter().cloned());
        values
    }

    fn reset(&mut self) {
        self.collection.clear();
        self.fields.clear();
        self.group_by.clear();
        self.aggregates.clear();
        self.criteria.clear();
        self.input_values.clear();
        self.criterion_values.clear();
        self.placeholders = 0;
        self.payload.clear();
    }
}
