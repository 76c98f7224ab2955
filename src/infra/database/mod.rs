//! Target database connections.
//!
//! The orchestrator only sees `Arc<dyn Connection>`; tests substitute a fake.

pub mod mysql;
pub mod postgres;

use crate::domain::schema::CatalogColumn;
use crate::domain::sql::{Dialect, Statement, StatementBuilder};
use crate::error::{Error, Result};
use crate::infra::config::{DatabaseConfig, DatabaseConfigs};
use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub use mysql::MySqlConnection;
pub use postgres::PgConnection;

pub type Row = Map<String, JsonValue>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    /// MySQL auto-increment id of the inserted row (0 when none).
    pub last_insert_id: Option<u64>,
}

#[async_trait]
pub trait Connection: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Runs a query and returns each row as a column-name -> value map.
    async fn fetch_rows(&self, stmt: &Statement) -> Result<Vec<Row>>;

    /// Runs a statement that returns no rows.
    async fn execute(&self, stmt: &Statement) -> Result<ExecOutcome>;

    async fn ping(&self) -> Result<()> {
        self.fetch_rows(&Statement::new("SELECT 1 AS ok")).await?;
        Ok(())
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let (schema, name) = split_table(table);
        let mut b = StatementBuilder::new(
            self.dialect(),
            "SELECT COUNT(*) AS n FROM information_schema.tables WHERE table_schema = ",
        );
        push_schema(&mut b, schema);
        b.push(" AND table_name = ")
            .push_bind(JsonValue::from(name), None);
        let rows = self.fetch_rows(&b.build()).await?;
        Ok(first_i64(&rows, "n") > 0)
    }

    async fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        let (schema, name) = split_table(table);
        let mut b = StatementBuilder::new(
            self.dialect(),
            "SELECT COUNT(*) AS n FROM information_schema.columns WHERE table_schema = ",
        );
        push_schema(&mut b, schema);
        b.push(" AND table_name = ")
            .push_bind(JsonValue::from(name), None)
            .push(" AND column_name = ")
            .push_bind(JsonValue::from(column), None);
        let rows = self.fetch_rows(&b.build()).await?;
        Ok(first_i64(&rows, "n") > 0)
    }

    /// Column metadata in ordinal order; empty when the table does not exist.
    async fn describe_table(&self, table: &str) -> Result<Vec<CatalogColumn>> {
        let (schema, name) = split_table(table);
        let dialect_columns = match self.dialect() {
            Dialect::Postgres => "c.udt_name AS udt_name, NULL AS extra, NULL AS column_comment",
            Dialect::MySql => {
                "NULL AS udt_name, c.extra AS extra, c.column_comment AS column_comment"
            }
        };
        let mut b = StatementBuilder::new(
            self.dialect(),
            format!(
                "SELECT c.column_name AS column_name, c.data_type AS data_type, {}, \
                 c.character_maximum_length AS character_maximum_length, \
                 c.numeric_precision AS numeric_precision, c.numeric_scale AS numeric_scale, \
                 c.is_nullable AS is_nullable, c.column_default AS column_default, \
                 EXISTS (SELECT 1 FROM information_schema.table_constraints tc \
                 JOIN information_schema.key_column_usage kcu \
                 ON tc.constraint_name = kcu.constraint_name \
                 AND tc.table_schema = kcu.table_schema \
                 AND tc.table_name = kcu.table_name \
                 WHERE tc.constraint_type = 'PRIMARY KEY' \
                 AND tc.table_schema = c.table_schema \
                 AND tc.table_name = c.table_name \
                 AND kcu.column_name = c.column_name) AS is_primary \
                 FROM information_schema.columns c WHERE c.table_schema = ",
                dialect_columns
            ),
        );
        push_schema(&mut b, schema);
        b.push(" AND c.table_name = ")
            .push_bind(JsonValue::from(name), None)
            .push(" ORDER BY c.ordinal_position");

        let rows = self.fetch_rows(&b.build()).await?;
        Ok(rows.iter().map(catalog_column).collect())
    }
}

fn split_table(table: &str) -> (Option<&str>, &str) {
    match table.split_once('.') {
        Some((schema, name)) => (Some(schema), name),
        None => (None, table),
    }
}

fn push_schema(b: &mut StatementBuilder, schema: Option<&str>) {
    match (schema, b.dialect()) {
        (Some(s), _) => {
            b.push_bind(JsonValue::from(s), None);
        }
        (None, Dialect::Postgres) => {
            b.push("current_schema()");
        }
        (None, Dialect::MySql) => {
            b.push("DATABASE()");
        }
    }
}

fn first_i64(rows: &[Row], key: &str) -> i64 {
    rows.first()
        .and_then(|r| r.get(key))
        .and_then(json_i64)
        .unwrap_or(0)
}

/// Integer value of a JSON number or numeric string.
pub fn json_i64(v: &JsonValue) -> Option<i64> {
    match v {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn json_truthy(v: Option<&JsonValue>) -> bool {
    match v {
        Some(JsonValue::Bool(b)) => *b,
        Some(JsonValue::Number(n)) => n.as_i64().unwrap_or(0) != 0,
        Some(JsonValue::String(s)) => matches!(s.to_uppercase().as_str(), "YES" | "TRUE" | "1"),
        _ => false,
    }
}

fn json_string(v: Option<&JsonValue>) -> Option<String> {
    match v {
        Some(JsonValue::String(s)) => Some(s.clone()),
        Some(JsonValue::Null) | None => None,
        Some(other) => Some(other.to_string()),
    }
}

fn catalog_column(row: &Row) -> CatalogColumn {
    CatalogColumn {
        name: json_string(row.get("column_name")).unwrap_or_default(),
        data_type: json_string(row.get("data_type")).unwrap_or_default(),
        udt_name: json_string(row.get("udt_name")),
        char_max_length: row.get("character_maximum_length").and_then(json_i64),
        numeric_precision: row.get("numeric_precision").and_then(json_i64),
        numeric_scale: row.get("numeric_scale").and_then(json_i64),
        is_nullable: json_truthy(row.get("is_nullable")),
        default: json_string(row.get("column_default")),
        primary_key: json_truthy(row.get("is_primary")),
        extra: json_string(row.get("extra")),
        comment: json_string(row.get("column_comment")),
    }
}

/// Opens a pooled connection for `config`.
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn Connection>> {
    match Dialect::from_db_type(&config.db_type) {
        Some(Dialect::Postgres) => Ok(Arc::new(PgConnection::connect(config).await?)),
        Some(Dialect::MySql) => Ok(Arc::new(MySqlConnection::connect(config).await?)),
        None => Err(Error::config(format!(
            "unsupported database type: {}",
            config.db_type
        ))),
    }
}

/// Named connections, opened lazily on first use and shared afterwards.
pub struct ConnectionManager {
    configs: DatabaseConfigs,
    connections: RwLock<HashMap<String, Arc<dyn Connection>>>,
}

impl ConnectionManager {
    pub fn new(configs: DatabaseConfigs) -> Self {
        Self {
            configs,
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Installs an already-open connection under `id`.
    pub async fn register(&self, id: impl Into<String>, connection: Arc<dyn Connection>) {
        self.connections.write().await.insert(id.into(), connection);
    }

    /// Configured and registered connection ids, sorted.
    pub async fn connection_ids(&self) -> Vec<String> {
        let connections = self.connections.read().await;
        let mut ids: Vec<String> = self
            .configs
            .keys()
            .chain(connections.keys())
            .cloned()
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub async fn get(&self, id: &str) -> Result<Arc<dyn Connection>> {
        {
            let connections = self.connections.read().await;
            if let Some(c) = connections.get(id) {
                return Ok(c.clone());
            }
        }

        let config = self
            .configs
            .get(id)
            .ok_or_else(|| Error::ConnectionNotFound {
                name: id.to_string(),
            })?;

        // connect outside the lock; if another task won the race, keep theirs
        let opened = connect(config).await?;
        tracing::info!(connection = id, db_type = %config.db_type, "opened database connection");
        let mut connections = self.connections.write().await;
        Ok(connections
            .entry(id.to_string())
            .or_insert(opened)
            .clone())
    }
}
