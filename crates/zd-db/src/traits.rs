//! Database trait definitions

use crate::error::DbResult;
use std::collections::BTreeMap;
use zd_core::{schema_frame, ColumnDef, ColumnDescriptor, Frame, Value, WriteMode};
use zd_jinja::{TemplateResolver, TemplateVars};

/// Capability set shared by every backend adapter.
///
/// Adapters start closed. Every operation other than `connect`, `close`,
/// `is_connected`, `db_type` and `describe` fails with
/// [`DbError::NotConnected`] until `connect` succeeds.
pub trait Database {
    /// Backend identifier for logging
    fn db_type(&self) -> &'static str;

    /// Open the underlying client. Does nothing when already connected.
    fn connect(&mut self) -> DbResult<()>;

    /// Release the underlying client.
    fn close(&mut self) -> DbResult<()>;

    fn is_connected(&self) -> bool;

    /// Run a query with positional bind parameters and return its rows
    fn read(&self, query: &str, params: &[Value]) -> DbResult<Frame>;

    /// Names of the tables (or sheets) visible to this connection
    fn list_tables(&self) -> DbResult<Vec<String>>;

    /// Column descriptors of `table` in ordinal order; empty when the table
    /// does not exist
    fn get_table_schema(&self, table: &str) -> DbResult<Vec<ColumnDescriptor>>;

    fn create_table(&self, table: &str, columns: &[ColumnDef]) -> DbResult<()>;

    fn delete_table(&self, table: &str) -> DbResult<()>;

    /// Run a raw statement. Row-returning statements behave like `read`;
    /// anything else returns a status frame.
    fn execute_query(&self, sql: &str) -> DbResult<Frame>;

    /// Write `frame` into `table`, returning the number of rows written
    fn write_frame(&self, table: &str, frame: &Frame, mode: WriteMode) -> DbResult<usize>;

    /// Connection description with secrets masked
    fn describe(&self) -> String;

    /// Access the SQL-specific operations, if this backend speaks SQL.
    fn as_sql(&self) -> Option<&dyn SqlDatabase> {
        None
    }

    /// Descriptors for every table, keyed by table name.
    ///
    /// Tables whose schema comes back empty, or whose catalog query fails,
    /// are left out. Connection errors still propagate.
    fn get_tables_schema(&self) -> DbResult<BTreeMap<String, Vec<ColumnDescriptor>>> {
        let mut schemas = BTreeMap::new();
        for table in self.list_tables()? {
            match self.get_table_schema(&table) {
                Ok(columns) if columns.is_empty() => {
                    log::debug!("Skipping {table}: no columns reported");
                }
                Ok(columns) => {
                    schemas.insert(table, columns);
                }
                Err(e) if e.is_connection_error() => return Err(e),
                Err(e) => log::warn!("Skipping {table}: {e}"),
            }
        }
        Ok(schemas)
    }

    /// Schema of one table, or of every table, flattened into a frame.
    fn export_schema(&self, table: Option<&str>) -> DbResult<Frame> {
        let schemas = match table {
            Some(table) => {
                let mut schemas = BTreeMap::new();
                schemas.insert(table.to_string(), self.get_table_schema(table)?);
                schemas
            }
            None => self.get_tables_schema()?,
        };
        Ok(schema_frame(&schemas))
    }

    /// One-cell frame describing the connection.
    fn database_info(&self) -> Frame {
        Frame::single("database_info", self.describe())
    }
}

/// Operations available on SQL backends: file templates and transactions.
pub trait SqlDatabase: Database {
    fn templates(&self) -> &TemplateResolver;

    /// Run `statements` atomically: commit if all succeed, roll back otherwise.
    ///
    /// Returns one row per statement with its affected-row count.
    fn transaction_query(&self, statements: &[String]) -> DbResult<Frame>;

    /// Render the template `name` to SQL text.
    fn get_query_from_file(&self, name: &str, vars: &TemplateVars) -> DbResult<String> {
        Ok(self.templates().render(name, vars)?)
    }

    /// Render the template `name` and run it.
    fn execute_query_file(
        &self,
        name: &str,
        vars: &TemplateVars,
        params: &[Value],
    ) -> DbResult<Frame> {
        let sql = self.get_query_from_file(name, vars)?;
        self.read(&sql, params)
    }
}
