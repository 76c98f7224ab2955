use crate::app::CrudService;
use crate::error::Error;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Clone)]
pub struct AppState {
    pub crud: Arc<CrudService>,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub data: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine-readable error code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ApiResponse {
    pub fn ok(data: JsonValue) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
        }
    }

    pub fn failure(code: &str, error: impl Into<String>, data: Option<JsonValue>) -> Self {
        Self {
            success: false,
            data,
            error: Some(error.into()),
            code: Some(code.to_string()),
        }
    }
}

/// Field values of a create or update request (documentation only).
#[derive(Deserialize, Debug, ToSchema)]
pub struct RecordBody(#[schema(value_type = Object)] pub Map<String, JsonValue>);

#[derive(Serialize, Debug, ToSchema)]
pub struct RefreshResponse {
    pub name: String,
    pub table_name: String,
    pub version: i64,
    pub columns: usize,
}

pub fn json_422(err: JsonRejection, expected: &str) -> (StatusCode, Json<ApiResponse>) {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ApiResponse::failure(
            "INVALID_BODY",
            format!("Invalid JSON body: {} (expected: {})", err, expected),
            None,
        )),
    )
}

/// Maps a crate error to its HTTP status and envelope.
pub fn error_response(err: Error) -> (StatusCode, Json<ApiResponse>) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::error!(code = err.code(), error = %err, "request failed");
    } else {
        tracing::debug!(code = err.code(), error = %err, "request rejected");
    }
    (
        status,
        Json(ApiResponse::failure(err.code(), err.to_string(), None)),
    )
}
