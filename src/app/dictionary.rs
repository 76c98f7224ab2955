//! Legal-value lists for enum-like columns.

use crate::domain::config::{DictSource, DictSourceSpec, SortOrder};
use crate::domain::sql::{validate_ident, validate_table_ident, Statement};
use crate::error::{Error, Result};
use crate::infra::database::{Connection, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DictItem {
    #[schema(value_type = Object)]
    pub value: JsonValue,
    pub label: String,
}

/// Resolves `spec` to its ordered item list. `table` and `field` name the
/// searched column, used by [`DictSourceSpec::SelfColumn`].
pub async fn get_values(
    conn: &dyn Connection,
    spec: &DictSourceSpec,
    table: &str,
    field: &str,
) -> Result<Vec<DictItem>> {
    match spec {
        DictSourceSpec::Static { values } => Ok(values
            .iter()
            .map(|v| DictItem {
                value: JsonValue::from(v.as_str()),
                label: v.clone(),
            })
            .collect()),
        DictSourceSpec::SelfColumn => {
            let source = DictSource {
                table: table.to_string(),
                field: field.to_string(),
                label_field: None,
                sort_order: SortOrder::Asc,
                r#where: None,
            };
            query_values(conn, &source).await
        }
        DictSourceSpec::Query(source) => query_values(conn, source).await,
    }
}

/// Builds the `SELECT DISTINCT` for a query-backed dictionary.
pub fn dictionary_statement(source: &DictSource) -> Result<Statement> {
    check_identifiers(source)?;

    let mut sql = format!("SELECT DISTINCT {}", source.field);
    if let Some(label) = source.label_field.as_deref().filter(|l| *l != source.field) {
        sql.push_str(&format!(", {}", label));
    }
    sql.push_str(&format!(
        " FROM {} WHERE {} IS NOT NULL",
        source.table, source.field
    ));
    // the where clause is operator-authored configuration, never request input
    if let Some(clause) = source.r#where.as_deref().map(str::trim).filter(|w| !w.is_empty()) {
        sql.push_str(&format!(" AND ({})", clause));
    }
    sql.push_str(&format!(
        " ORDER BY {} {}",
        source.field,
        source.sort_order.as_sql()
    ));
    Ok(Statement::new(sql))
}

async fn query_values(conn: &dyn Connection, source: &DictSource) -> Result<Vec<DictItem>> {
    let stmt = dictionary_statement(source)?;
    tracing::debug!(table = %source.table, field = %source.field, sql = %stmt.sql, "dictionary query");
    let rows = conn.fetch_rows(&stmt).await?;
    let label_field = source.label_field.as_deref().unwrap_or(&source.field);
    Ok(rows
        .iter()
        .map(|row| item_from_row(row, &source.field, label_field))
        .collect())
}

fn item_from_row(row: &Row, value_field: &str, label_field: &str) -> DictItem {
    let value = row.get(value_field).cloned().unwrap_or(JsonValue::Null);
    let label = match row.get(label_field) {
        Some(JsonValue::String(s)) => s.clone(),
        Some(JsonValue::Null) | None => text_of(&value),
        Some(other) => other.to_string(),
    };
    DictItem { value, label }
}

fn text_of(v: &JsonValue) -> String {
    match v {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn check_identifiers(source: &DictSource) -> Result<()> {
    if !validate_table_ident(&source.table) {
        return Err(Error::dictionary(format!(
            "invalid table name '{}'",
            source.table
        )));
    }
    for ident in std::iter::once(&source.field).chain(source.label_field.as_ref()) {
        if !validate_ident(ident) {
            return Err(Error::dictionary(format!("invalid column name '{}'", ident)));
        }
    }
    Ok(())
}

/// Checks that the source's table and columns exist on `conn`.
pub async fn validate_source(conn: &dyn Connection, source: &DictSource) -> Result<()> {
    check_identifiers(source)?;

    if !conn.table_exists(&source.table).await? {
        return Err(Error::dictionary(format!(
            "table '{}' does not exist",
            source.table
        )));
    }
    for column in std::iter::once(&source.field).chain(source.label_field.as_ref()) {
        if !conn.column_exists(&source.table, column).await? {
            return Err(Error::dictionary(format!(
                "column '{}' does not exist in table '{}'",
                column, source.table
            )));
        }
    }
    Ok(())
}
