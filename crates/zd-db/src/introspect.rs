//! Schema introspection through the backend's metadata catalog.
//!
//! The catalog SQL lives in embedded templates under `sql/` and is rendered
//! per dialect: placeholder syntax, catalog qualifier (`information_schema`
//! or `` `project.dataset`.INFORMATION_SCHEMA ``) and the optional schema
//! filter all come from the render context.

use crate::dialect::Dialect;
use crate::error::{DbError, DbResult};
use crate::traits::Database;
use zd_core::{ColumnDescriptor, Frame, TableName, Value};

const COLUMNS_TEMPLATE: &str = include_str!("../sql/catalog_columns.sql");
const TABLES_TEMPLATE: &str = include_str!("../sql/catalog_tables.sql");

static NULL: Value = Value::Null;

/// Catalog qualifier for Postgres and DuckDB.
pub const INFORMATION_SCHEMA: &str = "information_schema";

/// A rendered catalog query and its bind parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Catalog qualifier for a BigQuery dataset.
pub fn bigquery_catalog(project: &str, dataset: &str) -> String {
    format!("`{project}.{dataset}`.INFORMATION_SCHEMA")
}

fn base_context(dialect: Dialect, catalog: &str) -> serde_json::Map<String, serde_json::Value> {
    let mut ctx = serde_json::Map::new();
    ctx.insert("dialect".into(), dialect.name().into());
    ctx.insert("catalog".into(), catalog.into());
    let text_cast = if dialect == Dialect::Postgres { "::text" } else { "" };
    ctx.insert("text_cast".into(), text_cast.into());
    ctx
}

/// Query listing the columns of `table`, in ordinal order.
///
/// `schema` restricts the match to one schema; without it the current
/// schema is used (BigQuery catalogs are already scoped to one dataset).
/// Names are matched the way the backend resolves unquoted identifiers.
pub fn columns_query(
    dialect: Dialect,
    catalog: &str,
    table: &str,
    schema: Option<&str>,
) -> DbResult<CatalogQuery> {
    let mut ctx = base_context(dialect, catalog);
    let mut params = vec![Value::from(dialect.fold_case(table))];
    ctx.insert("table_param".into(), dialect.placeholder(1).into());
    if let Some(schema) = schema {
        params.push(Value::from(dialect.fold_case(schema)));
        ctx.insert("schema_param".into(), dialect.placeholder(2).into());
    }
    let sql = zd_jinja::render_str(COLUMNS_TEMPLATE, ctx)?;
    Ok(CatalogQuery { sql, params })
}

/// Query listing the tables of the current schema (or dataset).
pub fn tables_query(dialect: Dialect, catalog: &str) -> DbResult<CatalogQuery> {
    let sql = zd_jinja::render_str(TABLES_TEMPLATE, base_context(dialect, catalog))?;
    Ok(CatalogQuery {
        sql,
        params: Vec::new(),
    })
}

/// Map catalog rows to descriptors by position:
/// name, data type, nullable flag, default, primary-key flag.
pub fn descriptors_from_frame(frame: &Frame) -> Vec<ColumnDescriptor> {
    frame
        .rows()
        .iter()
        .filter_map(|row| {
            let cell = |i: usize| row.get(i).unwrap_or(&NULL);
            let name = match cell(0) {
                Value::Null => return None,
                v => v.to_display_string(),
            };
            let default = match cell(3) {
                Value::Null => None,
                Value::String(s) if s == "NULL" => None,
                v => Some(v.to_display_string()),
            };
            Some(ColumnDescriptor {
                name,
                data_type: cell(1).to_display_string(),
                nullable: cell(2).as_flag().unwrap_or(true),
                default,
                primary_key: cell(4).as_flag().unwrap_or(false),
            })
        })
        .collect()
}

/// First column of every row, as text.
pub fn table_names_from_frame(frame: &Frame) -> Vec<String> {
    frame
        .rows()
        .iter()
        .filter_map(|row| row.first())
        .filter(|v| !v.is_null())
        .map(Value::to_display_string)
        .collect()
}

/// Column descriptors of `table` on a SQL backend.
///
/// An unknown table yields an empty list. Connection failures propagate
/// as-is; any other failure of the catalog query becomes a schema error.
pub fn table_schema(
    db: &dyn Database,
    dialect: Dialect,
    catalog: &str,
    table: &str,
) -> DbResult<Vec<ColumnDescriptor>> {
    let name = TableName::try_new(table)?;
    let schema = match dialect {
        Dialect::BigQuery => None,
        Dialect::Postgres | Dialect::DuckDb => name.schema(),
    };
    let query = columns_query(dialect, catalog, name.table(), schema)?;
    let frame = db
        .read(&query.sql, &query.params)
        .map_err(|e| wrap_catalog_error(table, e))?;
    Ok(descriptors_from_frame(&frame))
}

/// Table names of the current schema on a SQL backend.
pub fn list_tables(db: &dyn Database, dialect: Dialect, catalog: &str) -> DbResult<Vec<String>> {
    let query = tables_query(dialect, catalog)?;
    let frame = db
        .read(&query.sql, &query.params)
        .map_err(|e| wrap_catalog_error("*", e))?;
    Ok(table_names_from_frame(&frame))
}

fn wrap_catalog_error(table: &str, err: DbError) -> DbError {
    if err.is_connection_error() {
        err
    } else {
        DbError::schema(table, err)
    }
}

#[cfg(test)]
#[path = "introspect_test.rs"]
mod tests;
