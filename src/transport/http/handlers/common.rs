use crate::domain::query::{QueryParams, SortField};
use crate::error::Result;
use crate::transport::http::types::{json_422, ApiResponse};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;

/// Query keys with a fixed meaning; every other key is a search value.
const RESERVED_KEYS: &[&str] = &["page", "page_size", "sort", "order", "fields", "search"];

/// Builds list parameters from a flat query string.
///
/// Unparsable page numbers fall back to the server defaults.
pub fn list_params(query: &HashMap<String, String>) -> Result<QueryParams> {
    let number = |key: &str| {
        query
            .get(key)
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(0)
    };

    let mut search: Map<String, JsonValue> = match query.get("search").map(|s| s.trim()) {
        Some(raw) if !raw.is_empty() => serde_json::from_str(raw)?,
        _ => Map::new(),
    };
    for (k, v) in query {
        if RESERVED_KEYS.contains(&k.as_str()) || v.is_empty() {
            continue;
        }
        search
            .entry(k.clone())
            .or_insert_with(|| JsonValue::String(v.clone()));
    }

    let default_order = query
        .get("order")
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .unwrap_or("asc");
    let sort = split_list(query.get("sort"))
        .into_iter()
        .map(|item| match item.split_once(':') {
            Some((field, order)) => SortField::new(field.trim(), order.trim()),
            None => SortField::new(item, default_order),
        })
        .collect();

    let fields = split_list(query.get("fields"));

    Ok(QueryParams {
        page: number("page"),
        page_size: number("page_size"),
        search,
        sort,
        fields: (!fields.is_empty()).then_some(fields),
    })
}

fn split_list(raw: Option<&String>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Primary key from a path segment. JSON objects and arrays (composite keys)
/// are decoded; anything else stays the raw string and is coerced against the
/// key column's type later, so `007` on a text key keeps its zeros.
pub fn path_key(raw: &str) -> JsonValue {
    if raw.starts_with('{') || raw.starts_with('[') {
        if let Ok(v) = serde_json::from_str::<JsonValue>(raw) {
            return v;
        }
    }
    JsonValue::from(raw)
}

/// Unwraps a JSON object request body.
pub fn body_object(
    body: std::result::Result<Json<JsonValue>, JsonRejection>,
) -> std::result::Result<Map<String, JsonValue>, (StatusCode, Json<ApiResponse>)> {
    match body {
        Ok(Json(JsonValue::Object(map))) => Ok(map),
        Ok(Json(_)) => Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiResponse::failure(
                "INVALID_BODY",
                "Invalid JSON body: expected an object of field values",
                None,
            )),
        )),
        Err(e) => Err(json_422(e, "{\"field\": value, ...}")),
    }
}

pub fn to_data<T: Serialize>(value: &T) -> JsonValue {
    serde_json::to_value(value).unwrap_or(JsonValue::Null)
}
