use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// How a column may be filtered in list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    Fuzzy,
    Exact,
    Multi,
    Single,
    Range,
    MultiSelect,
    DateRange,
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Fuzzy => "fuzzy",
            SearchType::Exact => "exact",
            SearchType::Multi => "multi",
            SearchType::Single => "single",
            SearchType::Range => "range",
            SearchType::MultiSelect => "multi_select",
            SearchType::DateRange => "date_range",
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Case-insensitive; an empty string means ascending.
    pub fn parse(raw: &str) -> Result<SortOrder> {
        match raw.trim().to_uppercase().as_str() {
            "" | "ASC" => Ok(SortOrder::Asc),
            "DESC" => Ok(SortOrder::Desc),
            _ => Err(Error::InvalidSortOrder {
                order: raw.to_string(),
            }),
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl TryFrom<String> for SortOrder {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        SortOrder::parse(&value)
    }
}

impl From<SortOrder> for String {
    fn from(value: SortOrder) -> Self {
        value.as_sql().to_string()
    }
}

/// Value substituted for a creatable field the caller did not supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultPolicy {
    Fixed,
    AutoIncrement,
    CurrentTime,
    Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayField {
    pub field: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub searchable: bool,
}

/// Where a dictionary's legal values come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictSource {
    pub table: String,
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_field: Option<String>,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub r#where: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DictSourceSpec {
    /// `SELECT DISTINCT` over a configured table/column.
    Query(DictSource),
    /// Literal option list.
    Static { values: Vec<String> },
    /// Distinct values of the searched column itself.
    SelfColumn,
}

impl DictSourceSpec {
    /// Interprets the stored `dict_source` value.
    ///
    /// Objects (or strings holding one) are queries, multi-line strings are
    /// literal lists, and any other non-empty string points at the column itself.
    pub fn from_value(field: &str, value: &JsonValue) -> Result<Option<DictSourceSpec>> {
        match value {
            JsonValue::Null => Ok(None),
            JsonValue::Object(_) => serde_json::from_value::<DictSource>(value.clone())
                .map(|s| Some(DictSourceSpec::Query(s)))
                .map_err(|e| Error::config(format!("dict_source of '{}': {}", field, e))),
            JsonValue::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Ok(None)
                } else if trimmed.starts_with('{') {
                    serde_json::from_str::<DictSource>(trimmed)
                        .map(|s| Some(DictSourceSpec::Query(s)))
                        .map_err(|e| Error::config(format!("dict_source of '{}': {}", field, e)))
                } else if trimmed.contains('\n') {
                    let values = trimmed
                        .lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .map(str::to_string)
                        .collect();
                    Ok(Some(DictSourceSpec::Static { values }))
                } else {
                    Ok(Some(DictSourceSpec::SelfColumn))
                }
            }
            JsonValue::Array(items) => Ok(Some(DictSourceSpec::Static {
                values: items
                    .iter()
                    .map(|v| match v {
                        JsonValue::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            })),
            _ => Err(Error::config(format!(
                "dict_source of '{}' must be an object or string",
                field
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchFieldConfig {
    pub field: String,
    #[serde(rename = "type")]
    pub search_type: SearchType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dict_source: Option<DictSourceSpec>,
}

/// Serialized shape of a search field entry.
#[derive(Debug, Deserialize)]
pub(crate) struct RawSearchField {
    pub field: String,
    #[serde(rename = "type")]
    pub search_type: SearchType,
    #[serde(default)]
    pub dict_source: JsonValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldValidation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatableField {
    pub field: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_type: Option<DefaultPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<FieldValidation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatableField {
    pub field: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<FieldValidation>,
}

/// `updatable_fields` entries: full objects, or bare column names (legacy form).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum UpdatableEntry {
    Name(String),
    Full(UpdatableField),
}

impl From<UpdatableEntry> for UpdatableField {
    fn from(entry: UpdatableEntry) -> Self {
        match entry {
            UpdatableEntry::Full(f) => f,
            UpdatableEntry::Name(field) => UpdatableField {
                label: field.clone(),
                field,
                required: false,
                validation: None,
            },
        }
    }
}

/// Per-field rule set consumed by the validator.
pub trait FieldRules {
    fn field(&self) -> &str;
    fn required(&self) -> bool;
    fn validation(&self) -> Option<&FieldValidation>;
}

impl FieldRules for CreatableField {
    fn field(&self) -> &str {
        &self.field
    }

    fn required(&self) -> bool {
        self.required
    }

    fn validation(&self) -> Option<&FieldValidation> {
        self.validation.as_ref()
    }
}

impl FieldRules for UpdatableField {
    fn field(&self) -> &str {
        &self.field
    }

    fn required(&self) -> bool {
        self.required
    }

    fn validation(&self) -> Option<&FieldValidation> {
        self.validation.as_ref()
    }
}

/// Configuration record as persisted by the config store.
///
/// Field lists are JSON-encoded strings; any of them may be empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfigRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default = "default_connection_id")]
    pub connection_id: String,
    pub name: String,
    pub table_name: String,
    #[serde(default)]
    pub create_statement: String,
    #[serde(default = "default_true")]
    pub pagination: bool,
    #[serde(default)]
    pub display_fields: Option<String>,
    #[serde(default)]
    pub search_fields: Option<String>,
    #[serde(default)]
    pub sortable_fields: Option<String>,
    #[serde(default)]
    pub creatable_fields: Option<String>,
    #[serde(default)]
    pub updatable_fields: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_version")]
    pub version: i64,
}

pub fn default_connection_id() -> String {
    "default".to_string()
}

fn default_true() -> bool {
    true
}

fn default_version() -> i64 {
    1
}

impl TableConfigRecord {
    pub fn new(
        name: impl Into<String>,
        table_name: impl Into<String>,
        create_statement: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            connection_id: default_connection_id(),
            name: name.into(),
            table_name: table_name.into(),
            create_statement: create_statement.into(),
            pagination: true,
            display_fields: None,
            search_fields: None,
            sortable_fields: None,
            creatable_fields: None,
            updatable_fields: None,
            description: None,
            is_active: true,
            version: 1,
        }
    }
}

/// Typed, schema-checked configuration of one named table mapping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableConfig {
    pub name: String,
    pub connection_id: String,
    pub table_name: String,
    pub pagination: bool,
    pub display_fields: Vec<DisplayField>,
    pub search_fields: Vec<SearchFieldConfig>,
    pub sortable_fields: Vec<String>,
    pub creatable_fields: Vec<CreatableField>,
    pub updatable_fields: Vec<UpdatableField>,
}

impl TableConfig {
    pub fn search_field(&self, field: &str) -> Option<&SearchFieldConfig> {
        self.search_fields.iter().find(|s| s.field == field)
    }

    pub fn is_sortable(&self, field: &str) -> bool {
        self.sortable_fields.iter().any(|f| f == field)
            || self
                .display_fields
                .iter()
                .any(|d| d.sortable && d.field == field)
    }

    pub fn creatable(&self, field: &str) -> Option<&CreatableField> {
        self.creatable_fields.iter().find(|c| c.field == field)
    }

    pub fn updatable(&self, field: &str) -> Option<&UpdatableField> {
        self.updatable_fields.iter().find(|u| u.field == field)
    }
}
