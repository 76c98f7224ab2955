//! Persistence of table configuration records.

pub mod postgres;

use crate::domain::config::TableConfigRecord;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

pub use postgres::PgConfigStore;

#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Active record registered under `name`.
    async fn fetch(&self, name: &str) -> Result<Option<TableConfigRecord>>;

    /// All active records, ordered by name.
    async fn list_active(&self) -> Result<Vec<TableConfigRecord>>;
}

/// In-process store, keyed by configuration name.
#[derive(Default)]
pub struct MemoryConfigStore {
    records: RwLock<HashMap<String, TableConfigRecord>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = TableConfigRecord>) -> Self {
        Self {
            records: RwLock::new(records.into_iter().map(|r| (r.name.clone(), r)).collect()),
        }
    }

    /// Inserts or replaces `record`, bumping its version on replacement.
    pub async fn save(&self, mut record: TableConfigRecord) -> TableConfigRecord {
        let mut records = self.records.write().await;
        if let Some(existing) = records.get(&record.name) {
            record.version = existing.version + 1;
        }
        records.insert(record.name.clone(), record.clone());
        record
    }

    pub async fn deactivate(&self, name: &str) -> bool {
        let mut records = self.records.write().await;
        match records.get_mut(name) {
            Some(r) if r.is_active => {
                r.is_active = false;
                r.version += 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn fetch(&self, name: &str) -> Result<Option<TableConfigRecord>> {
        let records = self.records.read().await;
        Ok(records.get(name).filter(|r| r.is_active).cloned())
    }

    async fn list_active(&self) -> Result<Vec<TableConfigRecord>> {
        let records = self.records.read().await;
        let mut active: Vec<TableConfigRecord> =
            records.values().filter(|r| r.is_active).cloned().collect();
        active.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(active)
    }
}
