use super::{Connection, ExecOutcome, Row};
use crate::domain::sql::{Dialect, Statement};
use crate::error::Result;
use crate::infra::config::DatabaseConfig;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{Map, Value as JsonValue};
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlPoolOptions, MySqlRow, MySqlSslMode};
use sqlx::query::Query;
use sqlx::{Column, MySql, MySqlPool, Row as _, TypeInfo, ValueRef};
use std::str::FromStr;
use std::time::Duration;

pub struct MySqlConnection {
    pool: MySqlPool,
}

impl MySqlConnection {
    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = match config.url.as_deref() {
            Some(url) => MySqlConnectOptions::from_str(url)?,
            None => {
                let mut options = MySqlConnectOptions::new()
                    .host(&config.host)
                    .username(&config.username)
                    .password(&config.password)
                    .database(&config.database_name);
                if config.port != 0 {
                    options = options.port(config.port);
                }
                if let Some(mode) = config.ssl_mode.as_deref().filter(|m| !m.is_empty()) {
                    match MySqlSslMode::from_str(mode) {
                        Ok(m) => options = options.ssl_mode(m),
                        Err(_) => tracing::warn!(ssl_mode = mode, "ignoring unknown MySQL ssl_mode"),
                    }
                }
                options
            }
        };

        let mut pool =
            MySqlPoolOptions::new().max_connections(config.max_open_conns.unwrap_or(10));
        if let Some(secs) = config.conn_max_lifetime.filter(|s| *s > 0) {
            pool = pool.max_lifetime(Duration::from_secs(secs));
        }
        let pool = pool.connect_with(options).await?;
        Ok(Self { pool })
    }
}

fn bind_json<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &JsonValue,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        JsonValue::Null => query.bind(None::<String>),
        JsonValue::Bool(b) => query.bind(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(u) = n.as_u64() {
                query.bind(u)
            } else {
                query.bind(n.as_f64().unwrap_or_default())
            }
        }
        JsonValue::String(s) => query.bind(s.clone()),
        JsonValue::Array(_) | JsonValue::Object(_) => query.bind(value.to_string()),
    }
}

/// Decodes a row column-by-column according to the reported type.
fn row_to_map(row: &MySqlRow) -> Row {
    let mut map = Map::new();
    for (i, col) in row.columns().iter().enumerate() {
        let name = col.name().to_string();
        let is_null = row.try_get_raw(i).map(|v| v.is_null()).unwrap_or(true);
        let value = if is_null {
            JsonValue::Null
        } else {
            decode_column(row, i, col.type_info().name())
        };
        map.insert(name, value);
    }
    map
}

fn decode_column(row: &MySqlRow, i: usize, type_name: &str) -> JsonValue {
    let decoded = match type_name {
        "BOOLEAN" => row.try_get::<bool, _>(i).map(JsonValue::from),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            row.try_get::<i64, _>(i).map(JsonValue::from)
        }
        t if t.ends_with("UNSIGNED") => row.try_get::<u64, _>(i).map(JsonValue::from),
        "FLOAT" => row.try_get::<f32, _>(i).map(|f| JsonValue::from(f as f64)),
        "DOUBLE" => row.try_get::<f64, _>(i).map(JsonValue::from),
        "DATETIME" => row
            .try_get::<NaiveDateTime, _>(i)
            .map(|d| JsonValue::from(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        "TIMESTAMP" => row
            .try_get::<DateTime<Utc>, _>(i)
            .map(|d| JsonValue::from(d.to_rfc3339())),
        "DATE" => row
            .try_get::<NaiveDate, _>(i)
            .map(|d| JsonValue::from(d.to_string())),
        "TIME" => row
            .try_get::<NaiveTime, _>(i)
            .map(|d| JsonValue::from(d.to_string())),
        "JSON" => row.try_get::<JsonValue, _>(i),
        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => row
            .try_get::<Vec<u8>, _>(i)
            .map(|b| JsonValue::from(String::from_utf8_lossy(&b).into_owned())),
        _ => row.try_get::<String, _>(i).map(JsonValue::from),
    };
    decoded
        .or_else(|_| row.try_get_unchecked::<String, _>(i).map(JsonValue::from))
        .unwrap_or(JsonValue::Null)
}

#[async_trait]
impl Connection for MySqlConnection {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    async fn fetch_rows(&self, stmt: &Statement) -> Result<Vec<Row>> {
        let mut query = sqlx::query(&stmt.sql);
        for arg in &stmt.args {
            query = bind_json(query, arg);
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_map).collect())
    }

    async fn execute(&self, stmt: &Statement) -> Result<ExecOutcome> {
        let mut query = sqlx::query(&stmt.sql);
        for arg in &stmt.args {
            query = bind_json(query, arg);
        }
        let result = query.execute(&self.pool).await?;
        Ok(ExecOutcome {
            rows_affected: result.rows_affected(),
            last_insert_id: Some(result.last_insert_id()).filter(|id| *id != 0),
        })
    }
}
