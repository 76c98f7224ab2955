//! Centralized configuration (environment variables + defaults).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Hard ceiling for list page sizes.
pub const MAX_PAGE_SIZE: i64 = 1000;

/// Metadata database holding `table_configurations` (required by the binaries).
pub fn database_url() -> anyhow::Result<String> {
    std::env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))
}

/// Directory containing `db.json`. Defaults to `./configs`.
pub fn config_path() -> PathBuf {
    std::env::var("CONFIG_PATH")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./configs"))
}

pub fn bind_addr() -> String {
    std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string())
}

/// Page size used when a request asks for none. Clamped into `1..=MAX_PAGE_SIZE`.
pub fn default_page_size() -> i64 {
    std::env::var("DEFAULT_PAGE_SIZE")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(20)
        .clamp(1, MAX_PAGE_SIZE)
}

/// One named target connection from `db.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `postgresql` or `mysql`.
    pub db_type: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub database_name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_open_conns: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_idle_conns: Option<u32>,
    /// Seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conn_max_lifetime: Option<u64>,
    /// Full connection URL; takes precedence over the discrete fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl DatabaseConfig {
    pub fn from_url(url: &str) -> Self {
        let db_type = if url.starts_with("mysql:") {
            "mysql"
        } else {
            "postgresql"
        };
        Self {
            db_type: db_type.to_string(),
            host: String::new(),
            port: 0,
            database_name: String::new(),
            username: String::new(),
            password: String::new(),
            ssl_mode: None,
            max_open_conns: None,
            max_idle_conns: None,
            conn_max_lifetime: None,
            url: Some(url.to_string()),
        }
    }
}

pub type DatabaseConfigs = HashMap<String, DatabaseConfig>;

/// Reads `<dir>/db.json`. A missing file yields an empty map.
pub fn load_database_configs(dir: &Path) -> anyhow::Result<DatabaseConfigs> {
    let path = dir.join("db.json");
    let text = match std::fs::read_to_string(&path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(DatabaseConfigs::new()),
        Err(e) => return Err(anyhow::anyhow!("failed to read {}: {}", path.display(), e)),
    };
    serde_json::from_str(&text)
        .map_err(|e| anyhow::anyhow!("failed to parse database config {}: {}", path.display(), e))
}

/// `db.json` plus a `default` connection pointing at `DATABASE_URL` when the
/// file does not define one.
pub fn database_configs() -> anyhow::Result<DatabaseConfigs> {
    let mut configs = load_database_configs(&config_path())?;
    if !configs.contains_key("default") {
        configs.insert("default".to_string(), DatabaseConfig::from_url(&database_url()?));
    }
    Ok(configs)
}
