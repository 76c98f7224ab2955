use crate::app::{CreateResult, DictItem, MutationResult};
use crate::domain::query::QueryResult;
use crate::domain::validate::ValidationError;
use crate::transport::http::handlers::{crud, health};
use crate::transport::http::types::{ApiResponse, AppState, RecordBody, RefreshResponse};
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck_handler,
        crud::list_handler,
        crud::create_handler,
        crud::update_handler,
        crud::delete_handler,
        crud::dict_handler,
        crud::schema_handler,
        crud::refresh_handler
    ),
    components(schemas(
        ApiResponse,
        QueryResult,
        CreateResult,
        MutationResult,
        ValidationError,
        DictItem,
        RecordBody,
        RefreshResponse
    ))
)]
pub struct ApiDoc;

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::healthcheck_handler))
        .route("/api/:config/list", get(crud::list_handler))
        .route("/api/:config/create", post(crud::create_handler))
        .route("/api/:config/update/:id", put(crud::update_handler))
        .route("/api/:config/delete/:id", delete(crud::delete_handler))
        .route("/api/:config/dict/:field", get(crud::dict_handler))
        .route("/api/:config/schema", get(crud::schema_handler))
        .route("/api/:config/refresh", post(crud::refresh_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
