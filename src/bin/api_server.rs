// src/bin/api_server.rs

use crud_generator::infra::config;
use crud_generator::transport;
use crud_generator::{ConfigStore, ConnectionManager, CrudService, CrudSettings, PgConfigStore};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "crud_generator=info,tower_http=info".into());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    // --- Config store ---
    let database_url = config::database_url()?;
    tracing::info!("initializing configuration store");
    let store = Arc::new(PgConfigStore::connect(&database_url).await?);
    match store.list_active().await {
        Ok(records) if records.is_empty() => {
            tracing::info!("no active table configurations; insert rows into table_configurations")
        }
        Ok(records) => {
            let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
            tracing::info!(configs = ?names, "active table configurations")
        }
        Err(e) => tracing::warn!(error = %e, "could not list table configurations"),
    }

    // --- Connections ---
    let configs = config::database_configs()?;
    let mut ids: Vec<&String> = configs.keys().collect();
    ids.sort();
    tracing::info!(connections = ?ids, "database connections configured");
    let connections = Arc::new(ConnectionManager::new(configs));

    let settings = CrudSettings::from_env();
    tracing::info!(
        default_page_size = settings.limits.default_page_size,
        max_page_size = settings.limits.max_page_size,
        "pagination limits"
    );
    let crud = Arc::new(CrudService::new(store, connections, settings));
    let app_state = transport::http::AppState { crud };

    // --- API server ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = transport::http::create_router(app_state)
        .merge(
            SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", transport::http::ApiDoc::openapi()),
        )
        .layer(cors);

    let bind_addr = config::bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "API server listening");
    tracing::info!("Swagger UI available at /swagger-ui");

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    Ok(())
}
