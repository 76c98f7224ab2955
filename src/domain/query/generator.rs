//! List/count statement generation.
//!
//! Only identifiers from the schema and configuration reach the SQL text;
//! every request value is bound.

use super::params::{PageLimits, Pagination, QueryParams};
use crate::domain::config::{SearchFieldConfig, SearchType, SortOrder, TableConfig};
use crate::domain::schema::{Column, SqlType, TableSchema};
use crate::domain::sql::{Dialect, Statement, StatementBuilder};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value as JsonValue};

/// Generated list request: a page query plus the matching count query.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub select: Statement,
    pub count: Statement,
    /// `None` when the configuration disables pagination.
    pub pagination: Option<Pagination>,
}

pub fn build_list(
    schema: &TableSchema,
    config: &TableConfig,
    params: &QueryParams,
    limits: &PageLimits,
    dialect: Dialect,
) -> Result<ListQuery> {
    let columns = projection(schema, config, params.fields.as_deref())?;
    let order_by = order_clause(config, schema, params)?;

    let mut select = StatementBuilder::new(
        dialect,
        format!("SELECT {} FROM {}", columns.join(", "), schema.table_name),
    );
    push_filters(&mut select, schema, config, &params.search)?;
    if !order_by.is_empty() {
        select.push(" ORDER BY ").push(order_by.join(", "));
    }

    let pagination = if config.pagination {
        let p = Pagination::clamp(params.page, params.page_size, limits);
        select
            .push(" LIMIT ")
            .push(p.page_size)
            .push(" OFFSET ")
            .push(p.offset());
        Some(p)
    } else {
        None
    };

    let mut count = StatementBuilder::new(
        dialect,
        format!("SELECT COUNT(*) AS total FROM {}", schema.table_name),
    );
    push_filters(&mut count, schema, config, &params.search)?;

    let select = select.build();
    let count = count.build();
    tracing::debug!(
        table = %schema.table_name,
        sql = %select.sql,
        args = select.args.len(),
        "generated list query"
    );
    Ok(ListQuery {
        select,
        count,
        pagination,
    })
}

/// Columns to select, in schema order.
fn projection<'a>(
    schema: &'a TableSchema,
    config: &TableConfig,
    requested: Option<&[String]>,
) -> Result<Vec<&'a str>> {
    let displayed = |name: &str| {
        config.display_fields.is_empty() || config.display_fields.iter().any(|d| d.field == name)
    };

    if let Some(fields) = requested.filter(|f| !f.is_empty()) {
        for f in fields {
            if !schema.has_column(f) || !displayed(f) {
                return Err(Error::UnknownField { field: f.clone() });
            }
        }
        return Ok(schema
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .filter(|name| fields.iter().any(|f| f == name))
            .collect());
    }

    Ok(schema
        .columns
        .iter()
        .map(|c| c.name.as_str())
        .filter(|name| displayed(name))
        .collect())
}

fn order_clause(
    config: &TableConfig,
    schema: &TableSchema,
    params: &QueryParams,
) -> Result<Vec<String>> {
    params
        .sort
        .iter()
        .map(|s| {
            if !schema.has_column(&s.field) {
                return Err(Error::UnknownField {
                    field: s.field.clone(),
                });
            }
            if !config.is_sortable(&s.field) {
                return Err(Error::NotSortable {
                    field: s.field.clone(),
                });
            }
            let order = SortOrder::parse(&s.order)?;
            Ok(format!("{} {}", s.field, order.as_sql()))
        })
        .collect()
}

/// Appends ` WHERE ... AND ...` for every configured search field present in
/// `search`, in configuration order. Unconfigured keys are ignored.
fn push_filters(
    b: &mut StatementBuilder,
    schema: &TableSchema,
    config: &TableConfig,
    search: &Map<String, JsonValue>,
) -> Result<()> {
    let mut first = true;
    for sf in &config.search_fields {
        let Some(raw) = search.get(&sf.field) else {
            continue;
        };
        if is_empty_value(raw) {
            continue;
        }
        let col = schema.column(&sf.field).ok_or_else(|| Error::UnknownField {
            field: sf.field.clone(),
        })?;
        push_predicate(b, col, sf, raw, &mut first)?;
    }
    Ok(())
}

fn push_predicate(
    b: &mut StatementBuilder,
    col: &Column,
    sf: &SearchFieldConfig,
    raw: &JsonValue,
    first: &mut bool,
) -> Result<()> {
    let mut conjunction = |b: &mut StatementBuilder| {
        b.push(if *first { " WHERE " } else { " AND " });
        *first = false;
    };
    let dialect = b.dialect();

    match sf.search_type {
        SearchType::Fuzzy => {
            let text = match raw {
                JsonValue::String(s) => s.clone(),
                JsonValue::Number(_) | JsonValue::Bool(_) => raw.to_string(),
                _ => return Err(Error::malformed(&col.name, "fuzzy search expects a scalar")),
            };
            if text.is_empty() {
                return Ok(());
            }
            conjunction(b);
            b.push(dialect.fuzzy_lhs(&col.name, &col.sql_type))
                .push(" ")
                .push_bind(JsonValue::from(format!("%{}%", text)), Some(&SqlType::Text));
        }
        SearchType::Exact | SearchType::Single => {
            if raw.is_array() || raw.is_object() {
                return Err(Error::malformed(&col.name, "expected a single value"));
            }
            let value = coerce_filter(col, raw)?;
            conjunction(b);
            b.push(&col.name)
                .push(" = ")
                .push_bind(value, Some(&col.sql_type));
        }
        SearchType::Multi | SearchType::MultiSelect => {
            let values = list_value(col, raw)?
                .iter()
                .map(|v| coerce_filter(col, v))
                .collect::<Result<Vec<_>>>()?;
            // an empty selection means "no filter", not "match nothing"
            if values.is_empty() {
                return Ok(());
            }
            conjunction(b);
            b.push(&col.name)
                .push(" IN ")
                .push_bind_list(values, Some(&col.sql_type));
        }
        SearchType::Range | SearchType::DateRange => {
            let (lo_key, hi_key) = if sf.search_type == SearchType::Range {
                ("min", "max")
            } else {
                ("start", "end")
            };
            let (lo, hi) = range_bounds(col, raw, lo_key, hi_key)?;
            let temporal = sf.search_type == SearchType::DateRange;
            if let Some(lo) = lo {
                let lo = bound_value(col, &lo, temporal)?;
                conjunction(b);
                b.push(&col.name)
                    .push(" >= ")
                    .push_bind(lo, Some(&col.sql_type));
            }
            if let Some(hi) = hi {
                let hi = bound_value(col, &hi, temporal)?;
                conjunction(b);
                b.push(&col.name)
                    .push(" <= ")
                    .push_bind(hi, Some(&col.sql_type));
            }
        }
    }
    Ok(())
}

fn is_empty_value(v: &JsonValue) -> bool {
    match v {
        JsonValue::Null => true,
        JsonValue::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn coerce_filter(col: &Column, v: &JsonValue) -> Result<JsonValue> {
    col.sql_type
        .coerce(v)
        .map_err(|reason| Error::malformed(&col.name, reason))
}

/// Accepts an array, a JSON-encoded array string, or a scalar (one-element list).
fn list_value(col: &Column, raw: &JsonValue) -> Result<Vec<JsonValue>> {
    match raw {
        JsonValue::Array(items) => Ok(items.iter().filter(|v| !is_empty_value(v)).cloned().collect()),
        JsonValue::String(s) if s.trim_start().starts_with('[') => {
            let parsed: Vec<JsonValue> = serde_json::from_str(s)
                .map_err(|e| Error::malformed(&col.name, format!("invalid list: {}", e)))?;
            Ok(parsed.into_iter().filter(|v| !is_empty_value(v)).collect())
        }
        JsonValue::Object(_) => Err(Error::malformed(&col.name, "expected a list of values")),
        scalar => Ok(vec![scalar.clone()]),
    }
}

/// Extracts `(low, high)` from `{lo_key, hi_key}`, its JSON string form, or a
/// two-element array. Null or empty bounds are absent.
fn range_bounds(
    col: &Column,
    raw: &JsonValue,
    lo_key: &str,
    hi_key: &str,
) -> Result<(Option<JsonValue>, Option<JsonValue>)> {
    let parsed;
    let value = match raw {
        JsonValue::String(s) => {
            parsed = serde_json::from_str::<JsonValue>(s).map_err(|_| {
                Error::malformed(
                    &col.name,
                    format!("expected {{\"{}\", \"{}\"}} object", lo_key, hi_key),
                )
            })?;
            &parsed
        }
        other => other,
    };
    let present = |v: Option<&JsonValue>| v.filter(|v| !is_empty_value(v)).cloned();
    match value {
        JsonValue::Object(map) => {
            for key in map.keys() {
                if key != lo_key && key != hi_key {
                    return Err(Error::malformed(
                        &col.name,
                        format!("unexpected range key '{}'", key),
                    ));
                }
            }
            Ok((present(map.get(lo_key)), present(map.get(hi_key))))
        }
        JsonValue::Array(items) if items.len() == 2 => {
            Ok((present(items.first()), present(items.get(1))))
        }
        JsonValue::Array(items) => Err(Error::malformed(
            &col.name,
            format!("range expects exactly 2 values, got {}", items.len()),
        )),
        _ => Err(Error::malformed(
            &col.name,
            format!("expected {{\"{}\", \"{}\"}} object", lo_key, hi_key),
        )),
    }
}

/// Coerces a range bound. Date ranges on temporal columns also accept epoch
/// seconds or milliseconds.
fn bound_value(col: &Column, v: &JsonValue, temporal: bool) -> Result<JsonValue> {
    if temporal && col.sql_type.is_temporal() {
        if let Some(n) = v.as_i64() {
            let dt = epoch_to_datetime(n).ok_or_else(|| {
                Error::malformed(&col.name, format!("timestamp {} out of range", n))
            })?;
            let text = if col.sql_type == SqlType::Date {
                dt.format("%Y-%m-%d").to_string()
            } else {
                dt.to_rfc3339()
            };
            return Ok(JsonValue::from(text));
        }
    }
    coerce_filter(col, v)
}

fn epoch_to_datetime(n: i64) -> Option<DateTime<Utc>> {
    // values past year 5138 in seconds are treated as milliseconds
    if n.abs() >= 100_000_000_000 {
        DateTime::from_timestamp_millis(n)
    } else {
        DateTime::from_timestamp(n, 0)
    }
}
