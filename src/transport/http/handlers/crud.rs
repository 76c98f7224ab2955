use crate::transport::http::handlers::common::{body_object, list_params, path_key, to_data};
use crate::transport::http::types::{error_response, ApiResponse, AppState, RefreshResponse};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

#[utoipa::path(
    get,
    path = "/api/{config}/list",
    params(
        ("config" = String, Path, description = "Configuration name"),
        ("page" = Option<i64>, Query, description = "1-based page (default 1)"),
        ("page_size" = Option<i64>, Query, description = "Rows per page (clamped to 1000)"),
        ("sort" = Option<String>, Query, description = "Comma-separated fields, optionally `field:asc|desc`"),
        ("order" = Option<String>, Query, description = "Default direction for `sort` (default asc)"),
        ("fields" = Option<String>, Query, description = "Comma-separated projection"),
        ("search" = Option<String>, Query, description = "JSON-encoded search object; other keys are search values too")
    ),
    responses(
        (status = 200, description = "One page of rows", body = crate::domain::query::QueryResult),
        (status = 400, description = "Bad filter, sort or field", body = ApiResponse),
        (status = 404, description = "Unknown configuration", body = ApiResponse),
        (status = 500, description = "Internal server error", body = ApiResponse)
    )
)]
pub async fn list_handler(
    State(state): State<AppState>,
    Path(config): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let params = match list_params(&query) {
        Ok(p) => p,
        Err(e) => return error_response(e).into_response(),
    };
    match state.crud.list(&config, &params).await {
        Ok(result) => (StatusCode::OK, Json(ApiResponse::ok(to_data(&result)))).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/{config}/create",
    params(
        ("config" = String, Path, description = "Configuration name")
    ),
    request_body = crate::transport::http::types::RecordBody,
    responses(
        (status = 201, description = "Record created", body = crate::app::CreateResult),
        (status = 400, description = "Validation failed", body = ApiResponse),
        (status = 404, description = "Unknown configuration", body = ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = ApiResponse),
        (status = 500, description = "Internal server error", body = ApiResponse)
    )
)]
pub async fn create_handler(
    State(state): State<AppState>,
    Path(config): Path<String>,
    body: Result<Json<JsonValue>, JsonRejection>,
) -> impl IntoResponse {
    let data = match body_object(body) {
        Ok(d) => d,
        Err(resp) => return resp.into_response(),
    };
    match state.crud.create(&config, &data).await {
        Ok(result) if result.success => {
            (StatusCode::CREATED, Json(ApiResponse::ok(to_data(&result)))).into_response()
        }
        Ok(result) => validation_failed(&result).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/{config}/update/{id}",
    params(
        ("config" = String, Path, description = "Configuration name"),
        ("id" = String, Path, description = "Primary key; JSON object or array for composite keys")
    ),
    request_body = crate::transport::http::types::RecordBody,
    responses(
        (status = 200, description = "Update executed (rows_affected may be 0)", body = crate::app::MutationResult),
        (status = 400, description = "Validation failed or bad key", body = ApiResponse),
        (status = 404, description = "Unknown configuration", body = ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = ApiResponse),
        (status = 500, description = "Internal server error", body = ApiResponse)
    )
)]
pub async fn update_handler(
    State(state): State<AppState>,
    Path((config, id)): Path<(String, String)>,
    body: Result<Json<JsonValue>, JsonRejection>,
) -> impl IntoResponse {
    let data = match body_object(body) {
        Ok(d) => d,
        Err(resp) => return resp.into_response(),
    };
    match state.crud.update(&config, &path_key(&id), &data).await {
        Ok(result) if result.success => {
            (StatusCode::OK, Json(ApiResponse::ok(to_data(&result)))).into_response()
        }
        Ok(result) => validation_failed(&result).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/{config}/delete/{id}",
    params(
        ("config" = String, Path, description = "Configuration name"),
        ("id" = String, Path, description = "Primary key; JSON object or array for composite keys")
    ),
    responses(
        (status = 200, description = "Delete executed (rows_affected may be 0)", body = crate::app::MutationResult),
        (status = 400, description = "Bad key", body = ApiResponse),
        (status = 404, description = "Unknown configuration", body = ApiResponse),
        (status = 500, description = "Internal server error", body = ApiResponse)
    )
)]
pub async fn delete_handler(
    State(state): State<AppState>,
    Path((config, id)): Path<(String, String)>,
) -> impl IntoResponse {
    match state.crud.delete(&config, &path_key(&id)).await {
        Ok(result) => (StatusCode::OK, Json(ApiResponse::ok(to_data(&result)))).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/{config}/dict/{field}",
    params(
        ("config" = String, Path, description = "Configuration name"),
        ("field" = String, Path, description = "Search field with a dictionary source")
    ),
    responses(
        (status = 200, description = "Ordered dictionary items", body = Vec<crate::app::DictItem>),
        (status = 404, description = "Unknown configuration", body = ApiResponse),
        (status = 422, description = "Field has no usable dictionary", body = ApiResponse),
        (status = 500, description = "Internal server error", body = ApiResponse)
    )
)]
pub async fn dict_handler(
    State(state): State<AppState>,
    Path((config, field)): Path<(String, String)>,
) -> impl IntoResponse {
    match state.crud.get_dict(&config, &field).await {
        Ok(items) => (StatusCode::OK, Json(ApiResponse::ok(to_data(&items)))).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/{config}/schema",
    params(
        ("config" = String, Path, description = "Configuration name")
    ),
    responses(
        (status = 200, description = "Parsed schema and resolved configuration", body = ApiResponse),
        (status = 404, description = "Unknown configuration", body = ApiResponse),
        (status = 422, description = "Stored configuration is invalid", body = ApiResponse)
    )
)]
pub async fn schema_handler(
    State(state): State<AppState>,
    Path(config): Path<String>,
) -> impl IntoResponse {
    match state.crud.resolve(&config).await {
        Ok(t) => (
            StatusCode::OK,
            Json(ApiResponse::ok(serde_json::json!({
                "schema": to_data(&t.schema),
                "config": to_data(&t.config),
                "version": t.version,
            }))),
        )
            .into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/{config}/refresh",
    params(
        ("config" = String, Path, description = "Configuration name")
    ),
    responses(
        (status = 200, description = "Configuration reloaded from the store", body = RefreshResponse),
        (status = 404, description = "Unknown configuration", body = ApiResponse),
        (status = 422, description = "Stored configuration is invalid", body = ApiResponse)
    )
)]
pub async fn refresh_handler(
    State(state): State<AppState>,
    Path(config): Path<String>,
) -> impl IntoResponse {
    match state.crud.refresh(&config).await {
        Ok(t) => {
            let body = RefreshResponse {
                name: t.config.name.clone(),
                table_name: t.schema.table_name.clone(),
                version: t.version,
                columns: t.schema.columns.len(),
            };
            (StatusCode::OK, Json(ApiResponse::ok(to_data(&body)))).into_response()
        }
        Err(e) => error_response(e).into_response(),
    }
}

fn validation_failed<T: serde::Serialize>(result: &T) -> (StatusCode, Json<ApiResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::failure(
            "VALIDATION_FAILED",
            "Validation failed",
            Some(to_data(result)),
        )),
    )
}
