//! Table schema: column metadata derived from DDL, code, or the live catalog.

pub mod builder;
pub mod column;
pub mod parser;

pub use builder::{CatalogColumn, ColumnDef, SchemaBuilder};
pub use column::{Column, SqlType, TableSchema};
pub use parser::parse_create_table;
