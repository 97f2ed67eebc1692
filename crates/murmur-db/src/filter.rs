//! Filter DSL for vector store queries.
//!
//! Filters compile to parameterized WHERE fragments so user-supplied
//! values never reach the SQL text. A [`FilterClause`] targets either
//! plain table columns or keys inside the jsonb metadata column, never
//! both, and may carry join clauses for cross-table predicates.

use murmur_core::{Error, Result};

/// A bind parameter produced by filter compilation.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Text(String),
    Int(i64),
    Float(f64),
}

/// A literal value usable on the right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Int(i64),
    Float(f64),
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        FilterValue::Text(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        FilterValue::Text(v)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        FilterValue::Int(v)
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        FilterValue::Float(v)
    }
}

impl FilterValue {
    fn into_param(self) -> QueryParam {
        match self {
            FilterValue::Text(v) => QueryParam::Text(v),
            FilterValue::Int(v) => QueryParam::Int(v),
            FilterValue::Float(v) => QueryParam::Float(v),
        }
    }
}

/// The six comparison operators the DSL supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    fn sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
        }
    }
}

/// tsquery construction mode for full-text predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextSearchMode {
    #[default]
    Plain,
    Phrase,
    Websearch,
}

impl TextSearchMode {
    fn ts_function(self) -> &'static str {
        match self {
            TextSearchMode::Plain => "plainto_tsquery",
            TextSearchMode::Phrase => "phraseto_tsquery",
            TextSearchMode::Websearch => "websearch_to_tsquery",
        }
    }
}

/// A composable filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `column <op> value`
    Compare {
        column: String,
        op: CompareOp,
        value: FilterValue,
    },
    /// `to_tsvector(config, column) @@ <mode>_tsquery(config, query)`
    TextSearch {
        column: String,
        query: String,
        mode: TextSearchMode,
        /// Text search configuration (language), e.g. `english`.
        config: String,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Filter::Compare {
            column: column.into(),
            op: CompareOp::Eq,
            value: value.into(),
        }
    }

    pub fn compare(
        column: impl Into<String>,
        op: CompareOp,
        value: impl Into<FilterValue>,
    ) -> Self {
        Filter::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn text_search(
        column: impl Into<String>,
        query: impl Into<String>,
        mode: TextSearchMode,
    ) -> Self {
        Filter::TextSearch {
            column: column.into(),
            query: query.into(),
            mode,
            config: "english".to_string(),
        }
    }
}

/// Join type for cross-table predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinKind {
    fn sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL JOIN",
            JoinKind::Cross => "CROSS JOIN",
        }
    }
}

/// One `ON left <op> right` condition of a join clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnCondition {
    pub left: String,
    pub right: String,
    pub op: CompareOp,
}

/// A join clause attached to a filtered query.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    pub on: Vec<OnCondition>,
}

/// A complete filter: a column filter XOR a metadata filter, plus joins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterClause {
    column_filter: Option<Filter>,
    metadata_filter: Option<Filter>,
    joins: Vec<Join>,
}

/// Compiled SQL fragments plus their bind parameters.
#[derive(Debug, Clone)]
pub struct BuiltFilter {
    /// JOIN clauses, empty string when none.
    pub join_sql: String,
    /// WHERE fragment without the `WHERE` keyword, empty when no filter.
    pub where_sql: String,
    pub params: Vec<QueryParam>,
}

impl FilterClause {
    /// Filter over plain table columns.
    pub fn column(filter: Filter) -> Self {
        Self {
            column_filter: Some(filter),
            metadata_filter: None,
            joins: Vec::new(),
        }
    }

    /// Filter over keys of the jsonb metadata column.
    pub fn metadata(filter: Filter) -> Self {
        Self {
            column_filter: None,
            metadata_filter: Some(filter),
            joins: Vec::new(),
        }
    }

    pub fn with_join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// Reject invalid combinations before any SQL is built.
    fn validate(&self) -> Result<()> {
        if self.column_filter.is_some() && self.metadata_filter.is_some() {
            return Err(Error::InvalidInput(
                "filter may target columns or metadata, not both".to_string(),
            ));
        }
        Ok(())
    }

    /// Compile to SQL fragments, numbering bind parameters from
    /// `param_offset + 1`.
    pub fn build(
        &self,
        table: &str,
        metadata_column: &str,
        param_offset: usize,
    ) -> Result<BuiltFilter> {
        self.validate()?;

        let join_sql = self
            .joins
            .iter()
            .map(|join| {
                let on = join
                    .on
                    .iter()
                    .map(|c| format!("{} {} {}", c.left, c.op.sql(), c.right))
                    .collect::<Vec<_>>()
                    .join(" AND ");
                if join.kind == JoinKind::Cross {
                    format!("{} {}", join.kind.sql(), join.table)
                } else {
                    format!("{} {} ON {}", join.kind.sql(), join.table, on)
                }
            })
            .collect::<Vec<_>>()
            .join(" ");

        let mut params = Vec::new();
        let mut next_idx = param_offset;
        let where_sql = match (&self.column_filter, &self.metadata_filter) {
            (Some(f), None) => build_expr(f, table, None, &mut params, &mut next_idx)?,
            (None, Some(f)) => {
                build_expr(f, table, Some(metadata_column), &mut params, &mut next_idx)?
            }
            (None, None) => String::new(),
            (Some(_), Some(_)) => unreachable!("rejected by validate"),
        };

        Ok(BuiltFilter {
            join_sql,
            where_sql,
            params,
        })
    }
}

fn column_ref(table: &str, metadata_column: Option<&str>, column: &str) -> Result<String> {
    validate_identifier(column)?;
    match metadata_column {
        Some(meta) => Ok(format!("{table}.{meta}->>'{column}'")),
        None => Ok(format!("{table}.{column}")),
    }
}

/// Identifiers come from code, not users, but the check keeps a stray
/// quote or space from silently corrupting the statement.
fn validate_identifier(ident: &str) -> Result<()> {
    let valid = !ident.is_empty()
        && ident
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("invalid identifier: {ident}")))
    }
}

fn validate_ts_config(config: &str) -> Result<()> {
    if !config.is_empty() && config.chars().all(|c| c.is_ascii_alphabetic() || c == '_') {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "invalid text search config: {config}"
        )))
    }
}

fn build_expr(
    filter: &Filter,
    table: &str,
    metadata_column: Option<&str>,
    params: &mut Vec<QueryParam>,
    next_idx: &mut usize,
) -> Result<String> {
    match filter {
        Filter::Compare { column, op, value } => {
            let col = column_ref(table, metadata_column, column)?;
            *next_idx += 1;
            params.push(value.clone().into_param());
            // jsonb ->> yields text; cast to compare numerically.
            let lhs = match (metadata_column, value) {
                (Some(_), FilterValue::Int(_)) => format!("({col})::bigint"),
                (Some(_), FilterValue::Float(_)) => format!("({col})::double precision"),
                _ => col,
            };
            Ok(format!("{lhs} {} ${}", op.sql(), next_idx))
        }
        Filter::TextSearch {
            column,
            query,
            mode,
            config,
        } => {
            let col = column_ref(table, metadata_column, column)?;
            validate_ts_config(config)?;
            *next_idx += 1;
            params.push(QueryParam::Text(query.clone()));
            Ok(format!(
                "to_tsvector('{config}', {col}) @@ {}('{config}', ${})",
                mode.ts_function(),
                next_idx
            ))
        }
        Filter::And(children) | Filter::Or(children) => {
            let joiner = if matches!(filter, Filter::And(_)) {
                " AND "
            } else {
                " OR "
            };
            let parts = children
                .iter()
                .map(|c| build_expr(c, table, metadata_column, params, next_idx))
                .collect::<Result<Vec<_>>>()?;
            let non_empty: Vec<_> = parts.into_iter().filter(|p| !p.is_empty()).collect();
            if non_empty.is_empty() {
                Ok(String::new())
            } else {
                Ok(format!("({})", non_empty.join(joiner)))
            }
        }
    }
}
