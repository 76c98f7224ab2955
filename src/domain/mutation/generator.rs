//! INSERT / UPDATE / DELETE generation.
//!
//! Input maps are whitelisted against the configuration, validated, and
//! coerced to column types before any SQL is written. Validation failures are
//! returned as `MutationPlan::Invalid`, never as `Err`.

use super::defaults::{apply_defaults, InsertValue};
use crate::domain::config::TableConfig;
use crate::domain::schema::{Column, TableSchema};
use crate::domain::sql::{Dialect, Statement, StatementBuilder};
use crate::domain::validate::{validate, ValidationError};
use crate::error::{Error, Result};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum MutationPlan {
    Ready(Statement),
    Invalid(Vec<ValidationError>),
}

impl MutationPlan {
    pub fn statement(&self) -> Option<&Statement> {
        match self {
            MutationPlan::Ready(s) => Some(s),
            MutationPlan::Invalid(_) => None,
        }
    }

    pub fn errors(&self) -> &[ValidationError] {
        match self {
            MutationPlan::Ready(_) => &[],
            MutationPlan::Invalid(errors) => errors,
        }
    }
}

/// Builds the INSERT for `data`. `sequences` holds values already looked up
/// for the statements returned by `pending_sequences`.
pub fn build_insert(
    schema: &TableSchema,
    config: &TableConfig,
    data: &Map<String, JsonValue>,
    sequences: &HashMap<String, JsonValue>,
    dialect: Dialect,
) -> Result<MutationPlan> {
    let values = apply_defaults(config, data, sequences, dialect)?;

    // server-side expressions are always present and carry no user input
    let bound: Map<String, JsonValue> = values
        .iter()
        .filter_map(|(k, v)| match v {
            InsertValue::Bound(v) => Some((k.clone(), v.clone())),
            InsertValue::Expr(_) => None,
        })
        .collect();
    let rules: Vec<_> = config
        .creatable_fields
        .iter()
        .filter(|f| !matches!(values.get(&f.field), Some(InsertValue::Expr(_))))
        .cloned()
        .collect();

    let mut errors = validate(&bound, &rules);
    let coerced = coerce_all(schema, &bound, &mut errors);
    if !errors.is_empty() {
        return Ok(MutationPlan::Invalid(errors));
    }

    let columns: Vec<&Column> = schema
        .columns
        .iter()
        .filter(|c| values.contains_key(&c.name))
        .collect();
    if columns.is_empty() {
        return Err(Error::NoData);
    }

    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    let mut b = StatementBuilder::new(
        dialect,
        format!(
            "INSERT INTO {} ({}) VALUES (",
            schema.table_name,
            names.join(", ")
        ),
    );
    for (i, col) in columns.iter().enumerate() {
        if i > 0 {
            b.push(", ");
        }
        match values.get(&col.name) {
            Some(InsertValue::Expr(expr)) => {
                b.push(expr);
            }
            _ => {
                let v = coerced.get(&col.name).cloned().unwrap_or(JsonValue::Null);
                b.push_bind(v, Some(&col.sql_type));
            }
        }
    }
    b.push(")");

    let pks = schema.primary_keys();
    if dialect.supports_returning() && !pks.is_empty() {
        let pk_names: Vec<&str> = pks.iter().map(|c| c.name.as_str()).collect();
        b.push(" RETURNING ").push(pk_names.join(", "));
    }

    let stmt = b.build();
    tracing::debug!(table = %schema.table_name, sql = %stmt.sql, args = stmt.args.len(), "generated insert");
    Ok(MutationPlan::Ready(stmt))
}

/// Builds the UPDATE of the row identified by `key`. Key arguments are bound last.
pub fn build_update(
    schema: &TableSchema,
    config: &TableConfig,
    key: &JsonValue,
    data: &Map<String, JsonValue>,
    dialect: Dialect,
) -> Result<MutationPlan> {
    let key_values = resolve_key(schema, key)?;

    let filtered: Map<String, JsonValue> = data
        .iter()
        .filter(|(k, _)| config.updatable(k).is_some())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let mut errors = validate(&filtered, &config.updatable_fields);
    let coerced = coerce_all(schema, &filtered, &mut errors);
    if !errors.is_empty() {
        return Ok(MutationPlan::Invalid(errors));
    }

    let columns: Vec<&Column> = schema
        .columns
        .iter()
        .filter(|c| coerced.contains_key(&c.name))
        .collect();
    if columns.is_empty() {
        return Err(Error::NoData);
    }

    let mut b = StatementBuilder::new(dialect, format!("UPDATE {} SET ", schema.table_name));
    for (i, col) in columns.iter().enumerate() {
        if i > 0 {
            b.push(", ");
        }
        let v = coerced.get(&col.name).cloned().unwrap_or(JsonValue::Null);
        b.push(&col.name).push(" = ").push_bind(v, Some(&col.sql_type));
    }
    push_key_filter(&mut b, key_values);

    let stmt = b.build();
    tracing::debug!(table = %schema.table_name, sql = %stmt.sql, args = stmt.args.len(), "generated update");
    Ok(MutationPlan::Ready(stmt))
}

/// Builds the physical DELETE of the row identified by `key`.
pub fn build_delete(schema: &TableSchema, key: &JsonValue, dialect: Dialect) -> Result<Statement> {
    let key_values = resolve_key(schema, key)?;
    let mut b = StatementBuilder::new(dialect, format!("DELETE FROM {}", schema.table_name));
    push_key_filter(&mut b, key_values);
    Ok(b.build())
}

fn push_key_filter(b: &mut StatementBuilder, key_values: Vec<(&Column, JsonValue)>) {
    for (i, (col, v)) in key_values.into_iter().enumerate() {
        b.push(if i == 0 { " WHERE " } else { " AND " });
        b.push(&col.name).push(" = ").push_bind(v, Some(&col.sql_type));
    }
}

/// Matches `key` to the primary-key columns.
///
/// Single keys accept a scalar; composite keys accept an object keyed by column
/// name or an array in key order.
pub fn resolve_key<'a>(
    schema: &'a TableSchema,
    key: &JsonValue,
) -> Result<Vec<(&'a Column, JsonValue)>> {
    let pks = schema.primary_keys();
    if pks.is_empty() {
        return Err(Error::MissingPrimaryKey {
            table: schema.table_name.clone(),
        });
    }

    let raw: Vec<JsonValue> = match key {
        JsonValue::Object(map) => pks
            .iter()
            .map(|c| {
                map.get(&c.name).cloned().ok_or_else(|| Error::InvalidKey {
                    reason: format!("missing key column '{}'", c.name),
                })
            })
            .collect::<Result<_>>()?,
        JsonValue::Array(items) if items.len() == pks.len() => items.clone(),
        JsonValue::Array(items) => {
            return Err(Error::InvalidKey {
                reason: format!("expected {} key values, got {}", pks.len(), items.len()),
            })
        }
        scalar if pks.len() == 1 => vec![scalar.clone()],
        _ => {
            return Err(Error::InvalidKey {
                reason: format!("table '{}' has a composite primary key", schema.table_name),
            })
        }
    };

    pks.into_iter()
        .zip(raw)
        .map(|(col, v)| {
            if v.is_null() {
                return Err(Error::InvalidKey {
                    reason: format!("key column '{}' is null", col.name),
                });
            }
            let v = col.coerce(&v).map_err(|reason| Error::InvalidKey {
                reason: format!("{}: {}", col.name, reason),
            })?;
            Ok((col, v))
        })
        .collect()
}

/// Coerces every value to its column type, recording `type` errors for
/// fields that have no other error yet.
fn coerce_all(
    schema: &TableSchema,
    values: &Map<String, JsonValue>,
    errors: &mut Vec<ValidationError>,
) -> HashMap<String, JsonValue> {
    let mut out = HashMap::new();
    for (field, value) in values {
        let Some(col) = schema.column(field) else {
            continue;
        };
        // form inputs send "" for an empty non-text field
        let value = match value {
            JsonValue::String(s) if s.is_empty() && !col.sql_type.is_textual() => JsonValue::Null,
            other => other.clone(),
        };
        match col.coerce(&value) {
            Ok(v) => {
                out.insert(field.clone(), v);
            }
            Err(reason) => {
                if !errors.iter().any(|e| e.field == *field) {
                    errors.push(ValidationError::new(
                        field.as_str(),
                        "type",
                        value,
                        format!("Field '{}' {}", field, reason),
                    ));
                }
            }
        }
    }
    out
}

