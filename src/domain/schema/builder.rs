//! Declarative schema construction.
//!
//! Produces the same `TableSchema` the DDL parser does, for callers that
//! describe a table in code or read it from the live catalog.

use super::column::{Column, SqlType, TableSchema};
use super::parser::resolve_type;
use crate::domain::sql::{validate_ident, validate_table_ident};
use crate::error::{Error, Result};
use std::collections::HashSet;

/// Fluent description of one column.
#[derive(Debug, Clone)]
pub struct ColumnDef(Column);

impl ColumnDef {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self(Column::new(name, sql_type))
    }

    pub fn length(mut self, n: u32) -> Self {
        self.0.length = Some(n);
        self
    }

    pub fn precision(mut self, precision: u32, scale: u32) -> Self {
        self.0.precision = Some(precision);
        self.0.scale = Some(scale);
        self
    }

    pub fn not_null(mut self) -> Self {
        self.0.not_null = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.0.primary_key = true;
        self.0.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.0.unique = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.0.auto_increment = true;
        self
    }

    pub fn default_value(mut self, expr: impl Into<String>) -> Self {
        self.0.default_value = Some(expr.into());
        self
    }

    pub fn comment(mut self, text: impl Into<String>) -> Self {
        self.0.comment = Some(text.into());
        self
    }
}

pub struct SchemaBuilder {
    table_name: String,
    columns: Vec<Column>,
}

impl TableSchema {
    pub fn builder(table_name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            table_name: table_name.into(),
            columns: Vec::new(),
        }
    }
}

impl SchemaBuilder {
    pub fn column(mut self, def: ColumnDef) -> Self {
        self.columns.push(def.0);
        self
    }

    pub fn build(self) -> Result<TableSchema> {
        finish(self.table_name, self.columns)
    }
}

/// Checks identifiers and duplicates; shared with the DDL parser.
pub(crate) fn finish(table_name: String, columns: Vec<Column>) -> Result<TableSchema> {
    if !validate_table_ident(&table_name) {
        return Err(Error::parse(format!("invalid table name '{}'", table_name)));
    }
    if columns.is_empty() {
        return Err(Error::parse(format!("table '{}' has no columns", table_name)));
    }
    let mut seen = HashSet::new();
    for col in &columns {
        if !validate_ident(&col.name) {
            return Err(Error::parse(format!("invalid column name '{}'", col.name)));
        }
        if !seen.insert(col.name.to_lowercase()) {
            return Err(Error::parse(format!("duplicate column '{}'", col.name)));
        }
    }
    Ok(TableSchema {
        table_name,
        columns,
    })
}

/// A column as reported by `information_schema`.
#[derive(Debug, Clone, Default)]
pub struct CatalogColumn {
    pub name: String,
    /// `data_type` (Postgres reports `ARRAY` / `USER-DEFINED` here).
    pub data_type: String,
    /// Postgres `udt_name`, e.g. `_int4` for `integer[]`.
    pub udt_name: Option<String>,
    pub char_max_length: Option<i64>,
    pub numeric_precision: Option<i64>,
    pub numeric_scale: Option<i64>,
    pub is_nullable: bool,
    pub default: Option<String>,
    pub primary_key: bool,
    /// MySQL `extra` column (`auto_increment`).
    pub extra: Option<String>,
    pub comment: Option<String>,
}

impl TableSchema {
    /// Builds a schema from catalog rows. Types the catalog reports but the
    /// parser does not know (enums, domains) are treated as text.
    pub fn from_catalog(table_name: &str, rows: &[CatalogColumn]) -> Result<TableSchema> {
        let mut builder = TableSchema::builder(table_name);
        for row in rows {
            let sql_type = catalog_type(row).unwrap_or_else(|| {
                tracing::warn!(
                    table = table_name,
                    column = %row.name,
                    data_type = %row.data_type,
                    "unknown catalog type, treating as text"
                );
                SqlType::Text
            });
            let mut def = ColumnDef::new(&row.name, sql_type.clone());
            if sql_type.is_textual() {
                if let Some(n) = row.char_max_length.filter(|n| *n > 0) {
                    def = def.length(n as u32);
                }
            }
            if sql_type == SqlType::Numeric {
                if let Some(p) = row.numeric_precision {
                    def = def.precision(p as u32, row.numeric_scale.unwrap_or(0) as u32);
                }
            }
            if !row.is_nullable {
                def = def.not_null();
            }
            if row.primary_key {
                def = def.primary_key();
            }
            let serial_default = row
                .default
                .as_deref()
                .map(|d| d.starts_with("nextval("))
                .unwrap_or(false);
            let mysql_auto = row
                .extra
                .as_deref()
                .map(|e| e.to_lowercase().contains("auto_increment"))
                .unwrap_or(false);
            if serial_default || mysql_auto {
                def = def.auto_increment();
            }
            if let Some(d) = &row.default {
                def = def.default_value(d);
            }
            if let Some(c) = row.comment.as_deref().filter(|c| !c.is_empty()) {
                def = def.comment(c);
            }
            builder = builder.column(def);
        }
        builder.build()
    }
}

fn catalog_type(row: &CatalogColumn) -> Option<SqlType> {
    let data_type = row.data_type.to_lowercase();
    if data_type == "array" {
        let udt = row.udt_name.as_deref()?.trim_start_matches('_');
        let (inner, _) = resolve_type(udt, None).ok()?;
        return Some(SqlType::Array(Box::new(inner)));
    }
    if data_type == "user-defined" {
        return None;
    }
    resolve_type(&data_type, None).ok().map(|(t, _)| t)
}
