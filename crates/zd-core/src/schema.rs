//! Table schema descriptors and DDL column definitions.

use crate::frame::{Frame, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata for one column of an existing table, as read from a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    #[serde(default)]
    pub primary_key: bool,
}

/// Column definition for `create_table`.
///
/// `data_type` is inserted verbatim and may carry constraints, e.g.
/// `SERIAL PRIMARY KEY` or `VARCHAR(255) UNIQUE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: String,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// What `write_frame` does when the target table already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Error out (default)
    #[default]
    Fail,
    /// Drop and recreate the table
    Replace,
    /// Insert into the existing table
    Append,
}

/// Column names of frames produced by [`schema_frame`].
pub const SCHEMA_FRAME_COLUMNS: [&str; 6] = [
    "table_name",
    "name",
    "type",
    "nullable",
    "default",
    "primary_key",
];

/// Flatten per-table descriptors into a single frame, one row per column.
pub fn schema_frame(schemas: &BTreeMap<String, Vec<ColumnDescriptor>>) -> Frame {
    let rows = schemas.iter().flat_map(|(table, descriptors)| {
        descriptors.iter().map(move |d| {
            [
                Value::from(table.as_str()),
                Value::from(d.name.as_str()),
                Value::from(d.data_type.as_str()),
                Value::Bool(d.nullable),
                Value::from(d.default.clone()),
                Value::Bool(d.primary_key),
            ]
        })
    });
    Frame::from_arrays(SCHEMA_FRAME_COLUMNS, rows)
}
