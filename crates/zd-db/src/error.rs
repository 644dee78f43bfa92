//! Error types for zd-db

use thiserror::Error;
use zd_core::CoreError;
use zd_jinja::JinjaError;

/// Database operation errors
#[derive(Error, Debug)]
pub enum DbError {
    /// Connection error (D001)
    #[error("[D001] Failed to connect to {backend}: {message}")]
    ConnectionError { backend: String, message: String },

    /// Query execution error (D002)
    #[error("[D002] Query failed: {message}\n  SQL: {sql}")]
    QueryError { sql: String, message: String },

    /// Catalog query error (D003)
    #[error("[D003] Failed to read schema for '{table}': {message}")]
    SchemaError { table: String, message: String },

    /// Table not found (D004)
    #[error("[D004] Table not found: {0}")]
    TableNotFound(String),

    /// Operation on a closed adapter (D005)
    #[error("[D005] {backend} connection is not open; call connect() first")]
    NotConnected { backend: String },

    /// Not implemented (D006)
    #[error("[D006] Feature not implemented for {backend}: {feature}")]
    NotImplemented { backend: String, feature: String },

    /// Template error (D007)
    #[error("[D007] {0}")]
    Template(#[from] JinjaError),

    /// Core error (D008)
    #[error("[D008] {0}")]
    Core(#[from] CoreError),

    /// Non-success HTTP reply from a REST API (D009)
    #[error("[D009] API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    /// Credential or token error (D010)
    #[error("[D010] Authentication failed: {0}")]
    Auth(String),

    /// Target table already exists (D011)
    #[error("[D011] Table already exists: {0}")]
    TableExists(String),
}

/// Result type alias for DbError
pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    pub fn connection(backend: &str, err: impl std::fmt::Display) -> Self {
        DbError::ConnectionError {
            backend: backend.to_string(),
            message: err.to_string(),
        }
    }

    pub fn query(sql: &str, err: impl std::fmt::Display) -> Self {
        DbError::QueryError {
            sql: sql.to_string(),
            message: err.to_string(),
        }
    }

    pub fn schema(table: &str, err: impl std::fmt::Display) -> Self {
        DbError::SchemaError {
            table: table.to_string(),
            message: err.to_string(),
        }
    }

    pub fn not_connected(backend: &str) -> Self {
        DbError::NotConnected {
            backend: backend.to_string(),
        }
    }

    pub fn not_implemented(backend: &str, feature: &str) -> Self {
        DbError::NotImplemented {
            backend: backend.to_string(),
            feature: feature.to_string(),
        }
    }

    /// True for errors raised because the connection itself is unusable.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            DbError::ConnectionError { .. } | DbError::NotConnected { .. } | DbError::Auth(_)
        )
    }
}
