use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use utoipa::ToSchema;

/// One requested ordering. `order` is normalized by the generator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    #[serde(default)]
    pub order: String,
}

impl SortField {
    pub fn new(field: impl Into<String>, order: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: order.into(),
        }
    }
}

/// Runtime list request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryParams {
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub page_size: i64,
    #[serde(default)]
    pub search: Map<String, JsonValue>,
    #[serde(default)]
    pub sort: Vec<SortField>,
    /// Optional projection; defaults to the configured display fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_page_size: i64,
    pub max_page_size: i64,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 1000,
        }
    }
}

/// Server-clamped page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
}

impl Pagination {
    /// `page < 1 -> 1`, `page_size <= 0 -> default`, `page_size > max -> max`.
    pub fn clamp(page: i64, page_size: i64, limits: &PageLimits) -> Self {
        let page = page.max(1);
        let page_size = if page_size <= 0 {
            limits.default_page_size
        } else {
            page_size.min(limits.max_page_size)
        };
        Self { page, page_size }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        if total <= 0 || self.page_size <= 0 {
            return 0;
        }
        (total + self.page_size - 1) / self.page_size
    }
}

/// Page of rows returned by a list call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QueryResult {
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<Map<String, JsonValue>>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}
