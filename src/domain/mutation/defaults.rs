//! Default-value policies for creatable fields the caller left blank.
//!
//! `auto_increment` is emulated with `MAX(col)+1`: the lookup and the insert
//! are separate statements, so two concurrent creates can observe the same
//! maximum and produce the same value. Use a native identity column when
//! writers are concurrent.

use crate::domain::config::{DefaultPolicy, TableConfig};
use crate::domain::sql::{Dialect, Statement};
use crate::domain::validate::is_blank;
use crate::error::{Error, Result};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;

/// Value written for one insert column.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertValue {
    /// Bound argument.
    Bound(JsonValue),
    /// Server-side expression such as `now()`.
    Expr(&'static str),
}

/// A `MAX(col)+1` lookup the caller must run before building the insert.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceLookup {
    pub field: String,
    pub statement: Statement,
}

/// Lookups needed for `auto_increment` defaults of blank fields in `data`.
pub fn pending_sequences(
    config: &TableConfig,
    data: &Map<String, JsonValue>,
    dialect: Dialect,
) -> Vec<SequenceLookup> {
    config
        .creatable_fields
        .iter()
        .filter(|f| f.default_type == Some(DefaultPolicy::AutoIncrement))
        .filter(|f| is_blank(data.get(&f.field)))
        .map(|f| SequenceLookup {
            field: f.field.clone(),
            statement: Statement::new(dialect.next_value_sql(&config.table_name, &f.field)),
        })
        .collect()
}

/// Whitelists `data` to the creatable fields and fills blank ones from their
/// default policy. `sequences` holds the resolved `auto_increment` values.
pub(crate) fn apply_defaults(
    config: &TableConfig,
    data: &Map<String, JsonValue>,
    sequences: &HashMap<String, JsonValue>,
    dialect: Dialect,
) -> Result<HashMap<String, InsertValue>> {
    let mut values: HashMap<String, InsertValue> = HashMap::new();

    for field in &config.creatable_fields {
        let supplied = data.get(&field.field);
        if !is_blank(supplied) {
            if let Some(v) = supplied {
                values.insert(field.field.clone(), InsertValue::Bound(v.clone()));
            }
            continue;
        }

        let default = match field.default_type {
            None => None,
            Some(DefaultPolicy::Fixed) => field.default_value.clone().map(InsertValue::Bound),
            Some(DefaultPolicy::AutoIncrement) => {
                let next = sequences.get(&field.field).ok_or_else(|| {
                    Error::config(format!(
                        "auto_increment value for '{}' was not resolved",
                        field.field
                    ))
                })?;
                Some(InsertValue::Bound(next.clone()))
            }
            Some(DefaultPolicy::CurrentTime) => Some(InsertValue::Expr(dialect.now_expr())),
            Some(DefaultPolicy::Uuid) => Some(InsertValue::Expr(dialect.uuid_expr())),
        };

        match default {
            Some(v) => {
                values.insert(field.field.clone(), v);
            }
            // keep explicit nulls / empty strings so required checks see them
            None => {
                if let Some(v) = supplied {
                    values.insert(field.field.clone(), InsertValue::Bound(v.clone()));
                }
            }
        }
    }
    Ok(values)
}
