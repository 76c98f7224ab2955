pub mod app;
pub mod domain;
pub mod error;
pub mod infra;
pub mod storage;
pub mod transport;

// Convenience re-exports (keeps call-sites clean)
pub use app::{CreateResult, CrudService, CrudSettings, DictItem, MutationResult};
pub use domain::config::{load_config, TableConfig, TableConfigRecord};
pub use domain::query::{QueryParams, QueryResult, SortField};
pub use domain::schema::{parse_create_table, ColumnDef, SqlType, TableSchema};
pub use domain::sql::{Dialect, Statement};
pub use domain::validate::{validate, ValidationError};
pub use error::{Error, Result};
pub use infra::database::{Connection, ConnectionManager, ExecOutcome};
pub use storage::config_store::{ConfigStore, MemoryConfigStore, PgConfigStore};
