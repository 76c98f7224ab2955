//! Turns a stored configuration record into a typed `TableConfig`.
//!
//! Each JSON blob is optional. Missing blobs are derived from the schema, then
//! every field reference is checked against it so a bad configuration fails
//! when it is loaded rather than on first use.

use super::model::{
    CreatableField, DefaultPolicy, DictSourceSpec, DisplayField, FieldValidation, RawSearchField,
    SearchFieldConfig, SearchType, TableConfig, TableConfigRecord, UpdatableEntry, UpdatableField,
};
use crate::domain::schema::{Column, SqlType, TableSchema};
use crate::domain::sql::{validate_ident, validate_table_ident};
use crate::error::{Error, Result};
use regex::Regex;
use serde::de::DeserializeOwned;

pub fn load_config(record: &TableConfigRecord, schema: &TableSchema) -> Result<TableConfig> {
    let display_fields = parse_blob::<Vec<DisplayField>>("display_fields", &record.display_fields)?
        .map(|fields| {
            fields
                .into_iter()
                .map(|mut d| {
                    if d.label.is_empty() {
                        d.label = d.field.clone();
                    }
                    d
                })
                .collect()
        })
        .unwrap_or_else(|| derive_display(schema));

    let search_fields = match parse_blob::<Vec<RawSearchField>>("search_fields", &record.search_fields)? {
        Some(raw) => raw
            .into_iter()
            .map(|r| {
                let dict_source = DictSourceSpec::from_value(&r.field, &r.dict_source)?;
                Ok(SearchFieldConfig {
                    field: r.field,
                    search_type: r.search_type,
                    dict_source,
                })
            })
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    let sortable_fields =
        parse_blob::<Vec<String>>("sortable_fields", &record.sortable_fields)?.unwrap_or_default();

    let creatable_fields =
        parse_blob::<Vec<CreatableField>>("creatable_fields", &record.creatable_fields)?
            .unwrap_or_else(|| derive_creatable(schema));

    let updatable_fields: Vec<UpdatableField> =
        parse_blob::<Vec<UpdatableEntry>>("updatable_fields", &record.updatable_fields)?
            .map(|entries| entries.into_iter().map(UpdatableField::from).collect())
            .unwrap_or_else(|| derive_updatable(schema));
    // primary keys identify the row and are never written by an update
    let (updatable_fields, dropped): (Vec<_>, Vec<_>) = updatable_fields
        .into_iter()
        .partition(|u| !schema.column(&u.field).map(|c| c.primary_key).unwrap_or(false));
    for u in dropped {
        tracing::warn!(config = %record.name, field = %u.field, "ignoring primary key in updatable_fields");
    }

    let config = TableConfig {
        name: record.name.clone(),
        connection_id: record.connection_id.clone(),
        table_name: schema.table_name.clone(),
        pagination: record.pagination,
        display_fields,
        search_fields,
        sortable_fields,
        creatable_fields,
        updatable_fields,
    };
    config.validate_against(schema)?;
    Ok(config)
}

fn parse_blob<T: DeserializeOwned>(name: &str, blob: &Option<String>) -> Result<Option<T>> {
    match blob.as_deref().map(str::trim) {
        None | Some("") | Some("null") => Ok(None),
        Some(text) => serde_json::from_str(text)
            .map(Some)
            .map_err(|e| Error::config(format!("invalid {}: {}", name, e))),
    }
}

fn label_for(col: &Column) -> String {
    col.comment.clone().unwrap_or_else(|| col.name.clone())
}

fn derive_display(schema: &TableSchema) -> Vec<DisplayField> {
    schema
        .columns
        .iter()
        .map(|c| DisplayField {
            field: c.name.clone(),
            label: label_for(c),
            width: None,
            sortable: false,
            searchable: false,
        })
        .collect()
}

fn derive_creatable(schema: &TableSchema) -> Vec<CreatableField> {
    schema
        .columns
        .iter()
        .filter(|c| !c.auto_increment)
        .map(|c| CreatableField {
            field: c.name.clone(),
            label: label_for(c),
            required: c.not_null && c.default_value.is_none(),
            default_type: None,
            default_value: None,
            validation: None,
        })
        .collect()
}

fn derive_updatable(schema: &TableSchema) -> Vec<UpdatableField> {
    schema
        .columns
        .iter()
        .filter(|c| !c.primary_key)
        .map(|c| UpdatableField {
            field: c.name.clone(),
            label: label_for(c),
            required: false,
            validation: None,
        })
        .collect()
}

/// Whether a filter of `search_type` makes sense on a column of `sql_type`.
pub fn search_type_supports(search_type: SearchType, sql_type: &SqlType) -> bool {
    let opaque = sql_type.is_document() || sql_type.is_array() || *sql_type == SqlType::Bytea;
    match search_type {
        SearchType::Fuzzy => !opaque,
        SearchType::Exact | SearchType::Single | SearchType::Multi | SearchType::MultiSelect => {
            !sql_type.is_array() && !sql_type.is_document()
        }
        SearchType::Range => !opaque && *sql_type != SqlType::Boolean,
        SearchType::DateRange => sql_type.is_temporal() || sql_type.is_integer(),
    }
}

impl TableConfig {
    /// Static checks against the schema. Dictionary sources pointing at other
    /// tables are checked against the live catalog by the orchestrator.
    pub fn validate_against(&self, schema: &TableSchema) -> Result<()> {
        let column = |kind: &str, field: &str| require_column(schema, kind, field);

        for d in &self.display_fields {
            column("display", &d.field)?;
        }
        for f in &self.sortable_fields {
            column("sortable", f)?;
        }
        for s in &self.search_fields {
            let col = column("search", &s.field)?;
            if !search_type_supports(s.search_type, &col.sql_type) {
                return Err(Error::UnsupportedFilter {
                    field: s.field.clone(),
                    filter: s.search_type.to_string(),
                });
            }
            if let Some(DictSourceSpec::Query(src)) = &s.dict_source {
                if !validate_table_ident(&src.table)
                    || !validate_ident(&src.field)
                    || !src.label_field.as_deref().map(validate_ident).unwrap_or(true)
                {
                    return Err(Error::dictionary(format!(
                        "dict_source of '{}' has an invalid table or column name",
                        s.field
                    )));
                }
            }
        }
        for c in &self.creatable_fields {
            let col = column("creatable", &c.field)?;
            match c.default_type {
                Some(DefaultPolicy::Fixed) if c.default_value.is_none() => {
                    return Err(Error::config(format!(
                        "creatable field '{}' uses a fixed default without default_value",
                        c.field
                    )));
                }
                Some(DefaultPolicy::AutoIncrement) if !col.sql_type.is_integer() => {
                    return Err(Error::config(format!(
                        "creatable field '{}' uses auto_increment on non-integer column",
                        c.field
                    )));
                }
                _ => {}
            }
            check_validation(&c.field, c.validation.as_ref())?;
        }
        for u in &self.updatable_fields {
            column("updatable", &u.field)?;
            check_validation(&u.field, u.validation.as_ref())?;
        }
        Ok(())
    }
}

fn require_column<'a>(schema: &'a TableSchema, kind: &str, field: &str) -> Result<&'a Column> {
    schema.column(field).ok_or_else(|| {
        Error::config(format!(
            "{} field '{}' does not exist in table '{}'",
            kind, field, schema.table_name
        ))
    })
}

fn check_validation(field: &str, rules: Option<&FieldValidation>) -> Result<()> {
    let Some(rules) = rules else {
        return Ok(());
    };
    if let (Some(min), Some(max)) = (rules.min_length, rules.max_length) {
        if min > max {
            return Err(Error::config(format!(
                "field '{}': min_length {} exceeds max_length {}",
                field, min, max
            )));
        }
    }
    if let (Some(min), Some(max)) = (rules.min, rules.max) {
        if min > max {
            return Err(Error::config(format!(
                "field '{}': min {} exceeds max {}",
                field, min, max
            )));
        }
    }
    if let Some(pattern) = rules.pattern.as_deref().filter(|p| !p.is_empty()) {
        Regex::new(pattern)
            .map_err(|e| Error::config(format!("field '{}': invalid pattern: {}", field, e)))?;
    }
    Ok(())
}
