//! `table_configurations` table in the metadata database.
//!
//! One row per `(connection_id, name)`. Saves bump `version`; removal only
//! clears `is_active`.

use super::ConfigStore;
use crate::domain::config::TableConfigRecord;
use crate::error::Result;
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

const SELECT_COLUMNS: &str = "id, connection_id, name, table_name, create_statement, \
     query_pagination, query_display_fields, query_search_fields, query_sortable_fields, \
     create_creatable_fields, update_updatable_fields, description, is_active, version";

pub struct PgConfigStore {
    pool: PgPool,
}

impl PgConfigStore {
    /// Connects and makes sure the table exists.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.ensure_table().await?;
        Ok(store)
    }

    pub async fn from_pool(pool: PgPool) -> anyhow::Result<Self> {
        let store = Self { pool };
        store.ensure_table().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn ensure_table(&self) -> anyhow::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS table_configurations (
                id BIGSERIAL PRIMARY KEY,
                connection_id TEXT NOT NULL DEFAULT 'default',
                name TEXT NOT NULL,
                table_name TEXT NOT NULL,
                create_statement TEXT NOT NULL DEFAULT '',
                query_pagination BOOLEAN NOT NULL DEFAULT TRUE,
                query_display_fields TEXT,
                query_search_fields TEXT,
                query_sortable_fields TEXT,
                create_creatable_fields TEXT,
                update_updatable_fields TEXT,
                description TEXT,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                version BIGINT NOT NULL DEFAULT 1,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                UNIQUE (connection_id, name)
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Inserts `record` or, when `(connection_id, name)` exists, replaces it and
    /// increments its version. Returns the stored record.
    ///
    /// The record is stored as given. Run it through
    /// [`CrudService::validate_record`](crate::CrudService::validate_record) first
    /// when it comes from an untrusted source.
    pub async fn save(&self, record: &TableConfigRecord) -> Result<TableConfigRecord> {
        let sql = format!(
            "INSERT INTO table_configurations (
                connection_id, name, table_name, create_statement, query_pagination,
                query_display_fields, query_search_fields, query_sortable_fields,
                create_creatable_fields, update_updatable_fields, description, is_active
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, TRUE)
            ON CONFLICT (connection_id, name) DO UPDATE SET
                table_name = EXCLUDED.table_name,
                create_statement = EXCLUDED.create_statement,
                query_pagination = EXCLUDED.query_pagination,
                query_display_fields = EXCLUDED.query_display_fields,
                query_search_fields = EXCLUDED.query_search_fields,
                query_sortable_fields = EXCLUDED.query_sortable_fields,
                create_creatable_fields = EXCLUDED.create_creatable_fields,
                update_updatable_fields = EXCLUDED.update_updatable_fields,
                description = EXCLUDED.description,
                is_active = TRUE,
                version = table_configurations.version + 1,
                updated_at = now()
            RETURNING {}",
            SELECT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(&record.connection_id)
            .bind(&record.name)
            .bind(&record.table_name)
            .bind(&record.create_statement)
            .bind(record.pagination)
            .bind(&record.display_fields)
            .bind(&record.search_fields)
            .bind(&record.sortable_fields)
            .bind(&record.creatable_fields)
            .bind(&record.updatable_fields)
            .bind(&record.description)
            .fetch_one(&self.pool)
            .await?;
        Ok(record_from_row(&row)?)
    }

    /// Soft-deletes every active record named `name`. Returns whether one existed.
    pub async fn deactivate(&self, name: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE table_configurations
             SET is_active = FALSE, version = version + 1, updated_at = now()
             WHERE name = $1 AND is_active",
        )
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn record_from_row(row: &PgRow) -> std::result::Result<TableConfigRecord, sqlx::Error> {
    Ok(TableConfigRecord {
        id: Some(row.try_get("id")?),
        connection_id: row.try_get("connection_id")?,
        name: row.try_get("name")?,
        table_name: row.try_get("table_name")?,
        create_statement: row.try_get("create_statement")?,
        pagination: row.try_get("query_pagination")?,
        display_fields: row.try_get("query_display_fields")?,
        search_fields: row.try_get("query_search_fields")?,
        sortable_fields: row.try_get("query_sortable_fields")?,
        creatable_fields: row.try_get("create_creatable_fields")?,
        updatable_fields: row.try_get("update_updatable_fields")?,
        description: row.try_get("description")?,
        is_active: row.try_get("is_active")?,
        version: row.try_get("version")?,
    })
}

#[async_trait]
impl ConfigStore for PgConfigStore {
    async fn fetch(&self, name: &str) -> Result<Option<TableConfigRecord>> {
        // names are unique per connection; the lowest id wins across connections
        let sql = format!(
            "SELECT {} FROM table_configurations WHERE name = $1 AND is_active ORDER BY id LIMIT 1",
            SELECT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(record_from_row).transpose()?)
    }

    async fn list_active(&self) -> Result<Vec<TableConfigRecord>> {
        let sql = format!(
            "SELECT {} FROM table_configurations WHERE is_active ORDER BY name, id",
            SELECT_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .map(record_from_row)
            .collect::<std::result::Result<Vec<_>, _>>()?)
    }
}
