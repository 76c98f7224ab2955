//! The CRUD orchestrator.
//!
//! Every call runs the same pipeline: resolve the named configuration, build
//! the statement, and either return validation errors or execute it.
//! Resolved configurations are cached per name. Cache reads take a shared
//! lock; loading happens with no lock held and only the final swap takes the
//! write lock.

use super::dictionary::{self, DictItem};
use crate::domain::config::{load_config, DictSourceSpec, TableConfig, TableConfigRecord};
use crate::domain::mutation::{
    build_delete, build_insert, build_update, pending_sequences, MutationPlan,
};
use crate::domain::query::{build_list, PageLimits, QueryParams, QueryResult};
use crate::domain::schema::{parse_create_table, Column, TableSchema};
use crate::domain::validate::ValidationError;
use crate::error::{Error, Result};
use crate::infra::config;
use crate::infra::database::{json_i64, Connection, ConnectionManager, Row};
use crate::storage::config_store::ConfigStore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrudSettings {
    pub limits: PageLimits,
}

impl CrudSettings {
    /// Page limits from `DEFAULT_PAGE_SIZE`.
    pub fn from_env() -> Self {
        Self {
            limits: PageLimits {
                default_page_size: config::default_page_size(),
                max_page_size: config::MAX_PAGE_SIZE,
            },
        }
    }
}

/// A configuration resolved against its schema and connection.
pub struct ResolvedTable {
    pub schema: TableSchema,
    pub config: TableConfig,
    pub connection: Arc<dyn Connection>,
    /// Store version the entry was built from.
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CreateResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub id: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ValidationError>,
}

/// Outcome of an update or delete. Zero rows affected is still a success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MutationResult {
    pub success: bool,
    pub rows_affected: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ValidationError>,
}

impl MutationResult {
    fn invalid(errors: Vec<ValidationError>) -> Self {
        Self {
            success: false,
            rows_affected: 0,
            errors,
        }
    }
}

pub struct CrudService {
    store: Arc<dyn ConfigStore>,
    connections: Arc<ConnectionManager>,
    settings: CrudSettings,
    cache: RwLock<HashMap<String, Arc<ResolvedTable>>>,
}

impl CrudService {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        connections: Arc<ConnectionManager>,
        settings: CrudSettings,
    ) -> Self {
        Self {
            store,
            connections,
            settings,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &CrudSettings {
        &self.settings
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    /// Cached resolution of `name`, loading it on a miss.
    pub async fn resolve(&self, name: &str) -> Result<Arc<ResolvedTable>> {
        {
            let cache = self.cache.read().await;
            if let Some(t) = cache.get(name) {
                return Ok(t.clone());
            }
        }

        let loaded = Arc::new(self.load(name).await?);
        let mut cache = self.cache.write().await;
        // a concurrent miss may have filled the slot first; keep the newer version
        let entry = cache.entry(name.to_string()).or_insert_with(|| loaded.clone());
        if entry.version < loaded.version {
            *entry = loaded;
        }
        Ok(entry.clone())
    }

    /// Reloads `name` from the store and swaps it into the cache.
    pub async fn refresh(&self, name: &str) -> Result<Arc<ResolvedTable>> {
        match self.load(name).await {
            Ok(loaded) => {
                let loaded = Arc::new(loaded);
                self.cache
                    .write()
                    .await
                    .insert(name.to_string(), loaded.clone());
                tracing::info!(config = name, version = loaded.version, "configuration refreshed");
                Ok(loaded)
            }
            Err(e) => {
                if matches!(e, Error::ConfigNotFound { .. }) {
                    self.cache.write().await.remove(name);
                }
                Err(e)
            }
        }
    }

    /// Drops every cached entry. Returns how many were dropped.
    pub async fn refresh_all(&self) -> usize {
        let mut cache = self.cache.write().await;
        let n = cache.len();
        cache.clear();
        tracing::info!(dropped = n, "configuration cache cleared");
        n
    }

    async fn load(&self, name: &str) -> Result<ResolvedTable> {
        let record = self
            .store
            .fetch(name)
            .await?
            .ok_or_else(|| Error::ConfigNotFound {
                name: name.to_string(),
            })?;
        let connection = self.connections.get(&record.connection_id).await?;
        let schema = schema_for(connection.as_ref(), &record).await?;
        let config = load_config(&record, &schema)?;
        tracing::info!(
            config = name,
            table = %schema.table_name,
            columns = schema.columns.len(),
            version = record.version,
            "configuration loaded"
        );
        Ok(ResolvedTable {
            schema,
            config,
            connection,
            version: record.version,
        })
    }

    pub async fn schema(&self, name: &str) -> Result<TableSchema> {
        Ok(self.resolve(name).await?.schema.clone())
    }

    pub async fn config(&self, name: &str) -> Result<TableConfig> {
        Ok(self.resolve(name).await?.config.clone())
    }

    pub async fn list(&self, name: &str, params: &QueryParams) -> Result<QueryResult> {
        let t = self.resolve(name).await?;
        let conn = t.connection.as_ref();
        let query = build_list(
            &t.schema,
            &t.config,
            params,
            &self.settings.limits,
            conn.dialect(),
        )?;

        let count_rows = conn.fetch_rows(&query.count).await?;
        let total = count_rows
            .first()
            .and_then(|r| r.get("total"))
            .and_then(json_i64)
            .unwrap_or(0);
        let data = conn.fetch_rows(&query.select).await?;

        Ok(match query.pagination {
            Some(p) => QueryResult {
                data,
                total,
                page: p.page,
                page_size: p.page_size,
                total_pages: p.total_pages(total),
            },
            None => QueryResult {
                data,
                total,
                page: 1,
                page_size: total,
                total_pages: 1,
            },
        })
    }

    pub async fn create(&self, name: &str, data: &Map<String, JsonValue>) -> Result<CreateResult> {
        let t = self.resolve(name).await?;
        let conn = t.connection.as_ref();
        let dialect = conn.dialect();

        let mut sequences = HashMap::new();
        for lookup in pending_sequences(&t.config, data, dialect) {
            let rows = conn.fetch_rows(&lookup.statement).await?;
            let next = rows
                .first()
                .and_then(|r| r.get("next_value"))
                .and_then(json_i64)
                .ok_or_else(|| {
                    Error::config(format!("no next value returned for '{}'", lookup.field))
                })?;
            sequences.insert(lookup.field, JsonValue::from(next));
        }

        let stmt = match build_insert(&t.schema, &t.config, data, &sequences, dialect)? {
            MutationPlan::Ready(stmt) => stmt,
            MutationPlan::Invalid(errors) => {
                return Ok(CreateResult {
                    success: false,
                    id: None,
                    errors,
                })
            }
        };

        let pks = t.schema.primary_keys();
        let id = if dialect.supports_returning() && !pks.is_empty() {
            let rows = conn.fetch_rows(&stmt).await?;
            rows.first().and_then(|row| key_from_row(row, &pks))
        } else {
            let outcome = conn.execute(&stmt).await?;
            outcome
                .last_insert_id
                .map(JsonValue::from)
                .or_else(|| supplied_key(data, &pks))
        };

        tracing::info!(config = name, table = %t.schema.table_name, "record created");
        Ok(CreateResult {
            success: true,
            id,
            errors: Vec::new(),
        })
    }

    pub async fn update(
        &self,
        name: &str,
        key: &JsonValue,
        data: &Map<String, JsonValue>,
    ) -> Result<MutationResult> {
        let t = self.resolve(name).await?;
        let conn = t.connection.as_ref();
        let stmt = match build_update(&t.schema, &t.config, key, data, conn.dialect())? {
            MutationPlan::Ready(stmt) => stmt,
            MutationPlan::Invalid(errors) => return Ok(MutationResult::invalid(errors)),
        };
        let outcome = conn.execute(&stmt).await?;
        tracing::info!(config = name, rows_affected = outcome.rows_affected, "record updated");
        Ok(MutationResult {
            success: true,
            rows_affected: outcome.rows_affected,
            errors: Vec::new(),
        })
    }

    pub async fn delete(&self, name: &str, key: &JsonValue) -> Result<MutationResult> {
        let t = self.resolve(name).await?;
        let conn = t.connection.as_ref();
        let stmt = build_delete(&t.schema, key, conn.dialect())?;
        let outcome = conn.execute(&stmt).await?;
        tracing::info!(config = name, rows_affected = outcome.rows_affected, "record deleted");
        Ok(MutationResult {
            success: true,
            rows_affected: outcome.rows_affected,
            errors: Vec::new(),
        })
    }

    /// Dictionary of a search field of `name`.
    pub async fn get_dict(&self, name: &str, field: &str) -> Result<Vec<DictItem>> {
        let t = self.resolve(name).await?;
        let spec = t
            .config
            .search_field(field)
            .and_then(|s| s.dict_source.as_ref())
            .ok_or_else(|| {
                Error::dictionary(format!("field '{}' has no dictionary source", field))
            })?;
        dictionary::get_values(t.connection.as_ref(), spec, &t.schema.table_name, field).await
    }

    /// Full check of a record before it is saved: schema, configuration, and
    /// every dictionary source against the live catalog.
    pub async fn validate_record(&self, record: &TableConfigRecord) -> Result<TableConfig> {
        let connection = self.connections.get(&record.connection_id).await?;
        let conn = connection.as_ref();
        let schema = schema_for(conn, record).await?;
        let config = load_config(record, &schema)?;

        if !conn.table_exists(&schema.table_name).await? {
            return Err(Error::config(format!(
                "table '{}' does not exist on connection '{}'",
                schema.table_name, record.connection_id
            )));
        }
        for s in &config.search_fields {
            if let Some(DictSourceSpec::Query(source)) = &s.dict_source {
                dictionary::validate_source(conn, source).await?;
            }
        }
        Ok(config)
    }
}

/// Schema from the stored DDL, or from the catalog when no DDL is stored.
async fn schema_for(conn: &dyn Connection, record: &TableConfigRecord) -> Result<TableSchema> {
    if record.create_statement.trim().is_empty() {
        let columns = conn.describe_table(&record.table_name).await?;
        if columns.is_empty() {
            return Err(Error::config(format!(
                "table '{}' not found in catalog",
                record.table_name
            )));
        }
        return TableSchema::from_catalog(&record.table_name, &columns);
    }

    let schema = parse_create_table(&record.create_statement)?;
    if !schema.table_name.eq_ignore_ascii_case(&record.table_name) {
        tracing::warn!(
            config = %record.name,
            table_name = %record.table_name,
            parsed = %schema.table_name,
            "create_statement names a different table; using the parsed name"
        );
    }
    Ok(schema)
}

fn key_from_row(row: &Row, pks: &[&Column]) -> Option<JsonValue> {
    match pks {
        [single] => row.get(&single.name).cloned(),
        _ => Some(JsonValue::Object(
            pks.iter()
                .filter_map(|c| row.get(&c.name).map(|v| (c.name.clone(), v.clone())))
                .collect(),
        )),
    }
}

fn supplied_key(data: &Map<String, JsonValue>, pks: &[&Column]) -> Option<JsonValue> {
    match pks {
        [single] => data.get(&single.name).filter(|v| !v.is_null()).cloned(),
        _ => None,
    }
}
