//! Pure generation logic: no I/O below this module.

pub mod config;
pub mod mutation;
pub mod query;
pub mod schema;
pub mod sql;
pub mod validate;
