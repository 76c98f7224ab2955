use super::{Connection, ExecOutcome, Row};
use crate::domain::sql::{Dialect, Statement};
use crate::error::{Error, Result};
use crate::infra::config::DatabaseConfig;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row as _};
use std::str::FromStr;
use std::time::Duration;

pub struct PgConnection {
    pool: PgPool,
}

impl PgConnection {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = match config.url.as_deref() {
            Some(url) => PgConnectOptions::from_str(url)?,
            None => {
                let mut options = PgConnectOptions::new()
                    .host(&config.host)
                    .username(&config.username)
                    .password(&config.password)
                    .database(&config.database_name);
                if config.port != 0 {
                    options = options.port(config.port);
                }
                if let Some(mode) = config.ssl_mode.as_deref().filter(|m| !m.is_empty()) {
                    options = options.ssl_mode(PgSslMode::from_str(mode)?);
                }
                options
            }
        };

        let mut pool = PgPoolOptions::new().max_connections(config.max_open_conns.unwrap_or(10));
        if let Some(secs) = config.conn_max_lifetime.filter(|s| *s > 0) {
            pool = pool.max_lifetime(Duration::from_secs(secs));
        }
        let pool = pool.connect_with(options).await?;
        Ok(Self { pool })
    }
}

/// Binds a JSON argument by its runtime shape. Placeholders already carry the
/// target type cast, so only the wire representation matters here.
fn bind_json<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &JsonValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        JsonValue::Null => query.bind(None::<String>),
        JsonValue::Bool(b) => query.bind(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(f) = n.as_f64().filter(|_| n.is_f64()) {
                query.bind(f)
            } else {
                query.bind(n.to_string())
            }
        }
        JsonValue::String(s) => query.bind(s.clone()),
        JsonValue::Array(items) => query.bind(array_literal(items)),
        JsonValue::Object(_) => query.bind(value.to_string()),
    }
}

/// Postgres array literal, e.g. `{1,2}` or `{"a","b"}`.
fn array_literal(items: &[JsonValue]) -> String {
    let parts: Vec<String> = items
        .iter()
        .map(|v| match v {
            JsonValue::Null => "NULL".to_string(),
            JsonValue::String(s) => {
                format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
            }
            JsonValue::Array(inner) => array_literal(inner),
            other => other.to_string(),
        })
        .collect();
    format!("{{{}}}", parts.join(","))
}

#[async_trait]
impl Connection for PgConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn fetch_rows(&self, stmt: &Statement) -> Result<Vec<Row>> {
        // rows come back as one json document each
        let sql = if stmt.sql.trim_start().to_uppercase().starts_with("SELECT") {
            format!("SELECT row_to_json(q.*) AS record FROM ({}) q", stmt.sql)
        } else {
            format!("WITH q AS ({}) SELECT row_to_json(q.*) AS record FROM q", stmt.sql)
        };

        let mut query = sqlx::query(&sql);
        for arg in &stmt.args {
            query = bind_json(query, arg);
        }
        let rows = query.fetch_all(&self.pool).await?;

        rows.into_iter()
            .map(|row| {
                let record: JsonValue = row.try_get("record")?;
                match record {
                    JsonValue::Object(map) => Ok(map),
                    other => Err(Error::config(format!("unexpected row shape: {}", other))),
                }
            })
            .collect()
    }

    async fn execute(&self, stmt: &Statement) -> Result<ExecOutcome> {
        let mut query = sqlx::query(&stmt.sql);
        for arg in &stmt.args {
            query = bind_json(query, arg);
        }
        let result = query.execute(&self.pool).await?;
        Ok(ExecOutcome {
            rows_affected: result.rows_affected(),
            last_insert_id: None,
        })
    }
}
