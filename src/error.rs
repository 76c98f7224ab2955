//! Crate-wide error type.
//!
//! Validation failures are not errors: they travel as `Vec<ValidationError>`
//! inside the mutation results so a form can render all of them at once.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    // ---------------------------------------------------------------------
    // Schema
    // ---------------------------------------------------------------------
    #[error("parse error: {message}")]
    Parse { message: String },

    #[error("unsupported SQL type '{type_name}' for column '{column}'")]
    UnsupportedType { column: String, type_name: String },

    // ---------------------------------------------------------------------
    // Configuration
    // ---------------------------------------------------------------------
    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("configuration '{name}' not found")]
    ConfigNotFound { name: String },

    #[error("database connection '{name}' not found")]
    ConnectionNotFound { name: String },

    #[error("dictionary error: {message}")]
    Dictionary { message: String },

    // ---------------------------------------------------------------------
    // Request shape
    // ---------------------------------------------------------------------
    #[error("unknown field '{field}'")]
    UnknownField { field: String },

    #[error("field '{field}' is not sortable")]
    NotSortable { field: String },

    #[error("invalid sort order '{order}' (expected ASC or DESC)")]
    InvalidSortOrder { order: String },

    #[error("unsupported filter '{filter}' for field '{field}'")]
    UnsupportedFilter { field: String, filter: String },

    #[error("malformed filter value for field '{field}': {reason}")]
    MalformedFilter { field: String, reason: String },

    #[error("table '{table}' has no primary key")]
    MissingPrimaryKey { table: String },

    #[error("invalid key: {reason}")]
    InvalidKey { reason: String },

    #[error("no valid fields to write")]
    NoData,

    // ---------------------------------------------------------------------
    // IO / serialization
    // ---------------------------------------------------------------------
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    pub fn dictionary(message: impl Into<String>) -> Self {
        Error::Dictionary {
            message: message.into(),
        }
    }

    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedFilter {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// HTTP status the transport layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::UnknownField { .. }
            | Error::NotSortable { .. }
            | Error::InvalidSortOrder { .. }
            | Error::UnsupportedFilter { .. }
            | Error::MalformedFilter { .. }
            | Error::InvalidKey { .. }
            | Error::NoData
            | Error::Json(_) => 400,

            Error::ConfigNotFound { .. } => 404,

            Error::Parse { .. }
            | Error::UnsupportedType { .. }
            | Error::Config { .. }
            | Error::Dictionary { .. }
            | Error::MissingPrimaryKey { .. } => 422,

            Error::ConnectionNotFound { .. } | Error::Database(_) => 500,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Parse { .. } => "PARSE_ERROR",
            Error::UnsupportedType { .. } => "UNSUPPORTED_TYPE",
            Error::Config { .. } => "CONFIG_ERROR",
            Error::ConfigNotFound { .. } => "CONFIG_NOT_FOUND",
            Error::ConnectionNotFound { .. } => "CONNECTION_NOT_FOUND",
            Error::Dictionary { .. } => "DICTIONARY_ERROR",
            Error::UnknownField { .. } => "UNKNOWN_FIELD",
            Error::NotSortable { .. } => "NOT_SORTABLE",
            Error::InvalidSortOrder { .. } => "INVALID_SORT_ORDER",
            Error::UnsupportedFilter { .. } => "UNSUPPORTED_FILTER",
            Error::MalformedFilter { .. } => "MALFORMED_FILTER",
            Error::MissingPrimaryKey { .. } => "MISSING_PRIMARY_KEY",
            Error::InvalidKey { .. } => "INVALID_KEY",
            Error::NoData => "NO_DATA",
            Error::Database(_) => "DATABASE_ERROR",
            Error::Json(_) => "JSON_ERROR",
        }
    }
}
