//! Dialect differences and the parameterized statement type shared by the generators.

use crate::domain::schema::SqlType;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Postgres,
    MySql,
}

impl Dialect {
    /// Accepts the `db_type` spellings used in connection configs.
    pub fn from_db_type(db_type: &str) -> Option<Dialect> {
        match db_type.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Some(Dialect::Postgres),
            "mysql" | "mariadb" => Some(Dialect::MySql),
            _ => None,
        }
    }

    /// Placeholder for the `index`-th (1-based) bound argument.
    ///
    /// Postgres placeholders carry a cast to the target type so JSON-shaped
    /// arguments bind against any column type.
    pub fn placeholder(&self, index: usize, cast: Option<&SqlType>) -> String {
        match self {
            Dialect::Postgres => match cast {
                Some(t) => format!("${}::{}", index, t.pg_cast()),
                None => format!("${}", index),
            },
            Dialect::MySql => "?".to_string(),
        }
    }

    /// Left-hand side and operator of a case-insensitive substring match.
    pub fn fuzzy_lhs(&self, column: &str, sql_type: &SqlType) -> String {
        match self {
            Dialect::Postgres if sql_type.is_textual() => format!("{} ILIKE", column),
            Dialect::Postgres => format!("CAST({} AS TEXT) ILIKE", column),
            Dialect::MySql => format!("{} LIKE", column),
        }
    }

    pub fn now_expr(&self) -> &'static str {
        match self {
            Dialect::Postgres => "now()",
            Dialect::MySql => "NOW()",
        }
    }

    pub fn uuid_expr(&self) -> &'static str {
        match self {
            Dialect::Postgres => "gen_random_uuid()",
            Dialect::MySql => "UUID()",
        }
    }

    pub fn supports_returning(&self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// `MAX(col)+1` lookup used to emulate an auto-increment default.
    pub fn next_value_sql(&self, table: &str, column: &str) -> String {
        let int_type = match self {
            Dialect::Postgres => "BIGINT",
            Dialect::MySql => "SIGNED",
        };
        format!(
            "SELECT CAST(COALESCE(MAX({}), 0) + 1 AS {}) AS next_value FROM {}",
            column, int_type, table
        )
    }
}

/// SQL text plus its bound arguments, in placeholder order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<JsonValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
        }
    }
}

/// Incremental statement writer: `push` appends trusted text, `push_bind`
/// appends a placeholder and records the value.
pub struct StatementBuilder {
    dialect: Dialect,
    sql: String,
    args: Vec<JsonValue>,
}

impl StatementBuilder {
    pub fn new(dialect: Dialect, init: impl Into<String>) -> Self {
        Self {
            dialect,
            sql: init.into(),
            args: Vec::new(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn push(&mut self, sql: impl Display) -> &mut Self {
        self.sql.push_str(&sql.to_string());
        self
    }

    pub fn push_bind(&mut self, value: JsonValue, cast: Option<&SqlType>) -> &mut Self {
        self.args.push(value);
        let placeholder = self.dialect.placeholder(self.args.len(), cast);
        self.sql.push_str(&placeholder);
        self
    }

    /// Appends `(p1, p2, ...)` binding every value with the same cast.
    pub fn push_bind_list(&mut self, values: Vec<JsonValue>, cast: Option<&SqlType>) -> &mut Self {
        self.sql.push('(');
        for (i, v) in values.into_iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.push_bind(v, cast);
        }
        self.sql.push(')');
        self
    }

    pub fn build(self) -> Statement {
        Statement {
            sql: self.sql,
            args: self.args,
        }
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn validate_ident(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A table identifier, optionally schema-qualified (`schema.table`).
pub fn validate_table_ident(ident: &str) -> bool {
    let mut parts = ident.split('.');
    let first = parts.next().map(validate_ident).unwrap_or(false);
    let rest: Vec<&str> = parts.collect();
    first && rest.len() <= 1 && rest.iter().all(|p| validate_ident(p))
}
