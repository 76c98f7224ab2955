use crate::transport::http::types::{ApiResponse, AppState};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy (connections reachable)", body = ApiResponse),
        (status = 503, description = "Service is unhealthy (a connection is unreachable)", body = ApiResponse)
    )
)]
pub async fn healthcheck_handler(State(state): State<AppState>) -> impl IntoResponse {
    let manager = state.crud.connections();
    let mut failures = Vec::new();

    for id in manager.connection_ids().await {
        let ping = match manager.get(&id).await {
            Ok(conn) => conn.ping().await,
            Err(e) => Err(e),
        };
        if let Err(e) = ping {
            tracing::warn!(connection = %id, error = %e, "health check failed");
            failures.push(format!("{}: {}", id, e));
        }
    }

    if failures.is_empty() {
        (
            StatusCode::OK,
            Json(ApiResponse::ok(serde_json::json!({ "status": "ok" }))),
        )
            .into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::failure(
                "UNHEALTHY",
                format!("DB ping failed: {}", failures.join("; ")),
                Some(serde_json::json!({ "status": "unhealthy" })),
            )),
        )
            .into_response()
    }
}
