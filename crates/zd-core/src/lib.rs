//! zd-core - Core library for Zangetsu Data
//!
//! Shared types used by every backend: result frames and cell values, table
//! schema descriptors, validated table names, and connection configuration.

pub mod config;
pub mod error;
pub mod frame;
pub mod schema;
pub mod table_name;

pub use config::{
    BigQueryConfig, Config, ConnectionConfig, DuckDbConfig, PostgresConfig, SpreadsheetConfig,
};
pub use error::{CoreError, CoreResult};
pub use frame::{ColumnInfo, Frame, Row, Value, ValueKind};
pub use schema::{schema_frame, ColumnDef, ColumnDescriptor, WriteMode, SCHEMA_FRAME_COLUMNS};
pub use table_name::{validate_identifier, TableName};
