//! zd-db - Backend adapters for Zangetsu Data
//!
//! This crate provides the `Database` trait, its SQL extension
//! `SqlDatabase`, and adapters for PostgreSQL, BigQuery, DuckDB and
//! Google Sheets.

pub mod bigquery;
pub mod dialect;
pub mod duckdb;
pub mod error;
pub mod executor;
pub(crate) mod google_api;
pub mod google_auth;
pub mod introspect;
pub mod postgres;
pub mod sheets;
pub mod traits;

pub use bigquery::BigQueryBackend;
pub use dialect::Dialect;
pub use duckdb::DuckDbBackend;
pub use error::{DbError, DbResult};
pub use google_auth::GoogleAuth;
pub use postgres::PostgresBackend;
pub use sheets::SpreadsheetBackend;
pub use traits::{Database, SqlDatabase};

use zd_core::ConnectionConfig;
use zd_jinja::TemplateResolver;

/// Build the adapter for `config`. The adapter is returned closed; call
/// `connect` before using it.
///
/// Spreadsheets have no templates, so `templates` is dropped for them.
pub fn open(config: &ConnectionConfig, templates: TemplateResolver) -> Box<dyn Database> {
    log::debug!("Opening {} adapter", config.backend_name());
    match config {
        ConnectionConfig::Postgres(c) => Box::new(PostgresBackend::new(c.clone(), templates)),
        ConnectionConfig::BigQuery(c) => Box::new(BigQueryBackend::new(c.clone(), templates)),
        ConnectionConfig::DuckDb(c) => Box::new(DuckDbBackend::new(c.clone(), templates)),
        ConnectionConfig::Spreadsheet(c) => Box::new(SpreadsheetBackend::new(c.clone())),
    }
}
