//! Shared fixtures: a scripted in-memory `Connection` and service builders.
#![allow(dead_code)]

use async_trait::async_trait;
use crud_generator::domain::schema::CatalogColumn;
use crud_generator::infra::database::Row;
use crud_generator::{
    Connection, ConnectionManager, CrudService, CrudSettings, Dialect, ExecOutcome,
    MemoryConfigStore, Statement, TableConfigRecord,
};
use serde_json::{json, Map, Value as JsonValue};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Answers `fetch_rows` by SQL prefix (longest match wins) and records every
/// statement it is given.
pub struct FakeConnection {
    dialect: Dialect,
    responses: Mutex<Vec<(String, Vec<Row>)>>,
    rows_affected: Mutex<u64>,
    last_insert_id: Mutex<Option<u64>>,
    tables: Mutex<HashMap<String, Vec<String>>>,
    catalog: Mutex<HashMap<String, Vec<CatalogColumn>>>,
    statements: Mutex<Vec<Statement>>,
}

impl FakeConnection {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            responses: Mutex::new(Vec::new()),
            rows_affected: Mutex::new(1),
            last_insert_id: Mutex::new(None),
            tables: Mutex::new(HashMap::new()),
            catalog: Mutex::new(HashMap::new()),
            statements: Mutex::new(Vec::new()),
        }
    }

    pub fn postgres() -> Self {
        Self::new(Dialect::Postgres)
    }

    pub fn mysql() -> Self {
        Self::new(Dialect::MySql)
    }

    pub fn respond(&self, sql_prefix: &str, rows: Vec<JsonValue>) {
        let rows = rows
            .into_iter()
            .map(|r| match r {
                JsonValue::Object(m) => m,
                other => panic!("fake rows must be objects, got {}", other),
            })
            .collect();
        self.responses
            .lock()
            .unwrap()
            .push((sql_prefix.to_string(), rows));
    }

    pub fn set_rows_affected(&self, n: u64) {
        *self.rows_affected.lock().unwrap() = n;
    }

    pub fn set_last_insert_id(&self, id: Option<u64>) {
        *self.last_insert_id.lock().unwrap() = id;
    }

    /// Declares a table (and its columns) for the existence checks.
    pub fn add_table(&self, table: &str, columns: &[&str]) {
        self.tables.lock().unwrap().insert(
            table.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
        );
    }

    pub fn add_catalog(&self, table: &str, columns: Vec<CatalogColumn>) {
        self.catalog
            .lock()
            .unwrap()
            .insert(table.to_string(), columns);
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.statements.lock().unwrap().clone()
    }

    pub fn statements_starting_with(&self, prefix: &str) -> Vec<Statement> {
        self.statements()
            .into_iter()
            .filter(|s| s.sql.starts_with(prefix))
            .collect()
    }

    pub fn clear_statements(&self) {
        self.statements.lock().unwrap().clear();
    }
}

#[async_trait]
impl Connection for FakeConnection {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn fetch_rows(&self, stmt: &Statement) -> crud_generator::Result<Vec<Row>> {
        self.statements.lock().unwrap().push(stmt.clone());
        let responses = self.responses.lock().unwrap();
        Ok(responses
            .iter()
            .filter(|(prefix, _)| stmt.sql.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    async fn execute(&self, stmt: &Statement) -> crud_generator::Result<ExecOutcome> {
        self.statements.lock().unwrap().push(stmt.clone());
        Ok(ExecOutcome {
            rows_affected: *self.rows_affected.lock().unwrap(),
            last_insert_id: *self.last_insert_id.lock().unwrap(),
        })
    }

    async fn table_exists(&self, table: &str) -> crud_generator::Result<bool> {
        Ok(self.tables.lock().unwrap().contains_key(table))
    }

    async fn column_exists(&self, table: &str, column: &str) -> crud_generator::Result<bool> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .get(table)
            .map(|cols| cols.iter().any(|c| c == column))
            .unwrap_or(false))
    }

    async fn describe_table(&self, table: &str) -> crud_generator::Result<Vec<CatalogColumn>> {
        Ok(self
            .catalog
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default())
    }
}

pub const USERS_DDL: &str = "CREATE TABLE users (
    id SERIAL PRIMARY KEY,
    name VARCHAR(100) NOT NULL,
    email VARCHAR(255) UNIQUE,
    age INT,
    status VARCHAR(20) DEFAULT 'active',
    created_at TIMESTAMP
)";

/// `users` mapping with one search field of every kind the tests need.
pub fn users_record() -> TableConfigRecord {
    let mut record = TableConfigRecord::new("users", "users", USERS_DDL);
    record.display_fields = Some(
        json!([
            {"field": "id", "label": "ID", "sortable": true},
            {"field": "name", "label": "Name", "sortable": true},
            {"field": "email", "label": "Email"},
            {"field": "age", "label": "Age", "sortable": true},
            {"field": "status", "label": "Status"}
        ])
        .to_string(),
    );
    record.search_fields = Some(
        json!([
            {"field": "name", "type": "fuzzy"},
            {"field": "age", "type": "range"},
            {"field": "status", "type": "multi_select", "dict_source": "status"},
            {"field": "created_at", "type": "date_range"}
        ])
        .to_string(),
    );
    record.creatable_fields = Some(
        json!([
            {"field": "name", "label": "Name", "required": true,
             "validation": {"min_length": 2, "max_length": 50}},
            {"field": "email", "label": "Email",
             "validation": {"pattern": "^[^@]+@[^@]+$", "error_message": "invalid email"}},
            {"field": "age", "label": "Age", "validation": {"min": 0, "max": 150}},
            {"field": "status", "label": "Status", "default_type": "fixed", "default_value": "active"},
            {"field": "created_at", "label": "Created", "default_type": "current_time"}
        ])
        .to_string(),
    );
    record.updatable_fields = Some(
        json!([
            {"field": "name", "label": "Name", "required": true},
            {"field": "email", "label": "Email"},
            {"field": "age", "label": "Age", "validation": {"min": 0, "max": 150}},
            {"field": "status", "label": "Status"}
        ])
        .to_string(),
    );
    record
}

pub async fn service_with(
    conn: Arc<FakeConnection>,
    records: Vec<TableConfigRecord>,
) -> (Arc<CrudService>, Arc<MemoryConfigStore>) {
    let store = Arc::new(MemoryConfigStore::with_records(records));
    let connections = Arc::new(ConnectionManager::new(HashMap::new()));
    connections.register("default", conn).await;
    let service = Arc::new(CrudService::new(
        store.clone(),
        connections,
        CrudSettings::default(),
    ));
    (service, store)
}

pub fn object(v: JsonValue) -> Map<String, JsonValue> {
    match v {
        JsonValue::Object(m) => m,
        other => panic!("expected an object, got {}", other),
    }
}
