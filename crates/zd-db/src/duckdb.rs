//! DuckDB backend

use crate::dialect::Dialect;
use crate::error::{DbError, DbResult};
use crate::executor::{self, BoundStatement};
use crate::introspect::{self, INFORMATION_SCHEMA};
use crate::traits::{Database, SqlDatabase};
use duckdb::types::{TimeUnit, Value as DuckValue};
use duckdb::{params_from_iter, Connection};
use zd_core::{
    ColumnDef, ColumnDescriptor, ColumnInfo, DuckDbConfig, Frame, TableName, Value, WriteMode,
};
use zd_jinja::TemplateResolver;

const BACKEND: &str = "duckdb";

/// Days from 0001-01-01 (day 1) to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// DuckDB database backend, file-backed or in memory
pub struct DuckDbBackend {
    config: DuckDbConfig,
    templates: TemplateResolver,
    conn: Option<Connection>,
}

impl DuckDbBackend {
    pub fn new(config: DuckDbConfig, templates: TemplateResolver) -> Self {
        Self {
            config,
            templates,
            conn: None,
        }
    }

    /// In-memory database; nothing survives `close`.
    pub fn in_memory(templates: TemplateResolver) -> Self {
        Self::new(DuckDbConfig::in_memory(), templates)
    }

    fn conn(&self) -> DbResult<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| DbError::not_connected(BACKEND))
    }

    /// Run `f` between BEGIN and COMMIT, rolling back if it fails.
    fn transaction<T>(&self, f: impl FnOnce(&Connection) -> DbResult<T>) -> DbResult<T> {
        let conn = self.conn()?;
        conn.execute_batch("BEGIN TRANSACTION")
            .map_err(|e| DbError::query("BEGIN TRANSACTION", e))?;
        match f(conn) {
            Ok(value) => {
                conn.execute_batch("COMMIT")
                    .map_err(|e| DbError::query("COMMIT", e))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                    log::warn!("DuckDB rollback failed: {rollback}");
                }
                Err(err)
            }
        }
    }
}

fn to_duck_value(value: &Value) -> DuckValue {
    match value {
        Value::Null => DuckValue::Null,
        Value::Bool(b) => DuckValue::Boolean(*b),
        Value::Int(i) => DuckValue::BigInt(*i),
        Value::Float(f) => DuckValue::Double(*f),
        Value::String(s) => DuckValue::Text(s.clone()),
        Value::Bytes(b) => DuckValue::Blob(b.clone()),
    }
}

fn from_duck_value(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(b) => Value::Bool(b),
        DuckValue::TinyInt(i) => Value::Int(i.into()),
        DuckValue::SmallInt(i) => Value::Int(i.into()),
        DuckValue::Int(i) => Value::Int(i.into()),
        DuckValue::BigInt(i) => Value::Int(i),
        DuckValue::HugeInt(i) => i64::try_from(i)
            .map(Value::Int)
            .unwrap_or_else(|_| Value::String(i.to_string())),
        DuckValue::UTinyInt(i) => Value::Int(i.into()),
        DuckValue::USmallInt(i) => Value::Int(i.into()),
        DuckValue::UInt(i) => Value::Int(i.into()),
        DuckValue::UBigInt(i) => i64::try_from(i)
            .map(Value::Int)
            .unwrap_or_else(|_| Value::String(i.to_string())),
        DuckValue::Float(f) => Value::Float(f.into()),
        DuckValue::Double(f) => Value::Float(f),
        DuckValue::Decimal(d) => {
            let text = d.to_string();
            text.parse::<f64>()
                .map(Value::Float)
                .unwrap_or(Value::String(text))
        }
        DuckValue::Text(s) => Value::String(s),
        DuckValue::Enum(s) => Value::String(s),
        DuckValue::Blob(b) => Value::Bytes(b),
        DuckValue::Date32(days) => days
            .checked_add(UNIX_EPOCH_DAYS_FROM_CE)
            .and_then(chrono::NaiveDate::from_num_days_from_ce_opt)
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Int(days.into())),
        DuckValue::Timestamp(unit, t) => chrono::DateTime::from_timestamp_micros(to_micros(unit, t))
            .map(|ts| Value::String(ts.naive_utc().format("%Y-%m-%d %H:%M:%S%.f").to_string()))
            .unwrap_or(Value::Int(t)),
        DuckValue::Time64(unit, t) => {
            let micros = to_micros(unit, t);
            u32::try_from(micros / 1_000_000)
                .ok()
                .and_then(|secs| {
                    let nanos = u32::try_from((micros % 1_000_000) * 1_000).ok()?;
                    chrono::NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
                })
                .map(|time| Value::String(time.format("%H:%M:%S%.f").to_string()))
                .unwrap_or(Value::Int(t))
        }
        other => Value::String(format!("{other:?}")),
    }
}

fn to_micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

/// Run a query and collect every row into a frame.
///
/// DuckDB panics on `stmt.column_count()` before execution, so the rows are
/// collected via `query_map` first and column metadata is read afterwards.
fn query_frame(conn: &Connection, sql: &str, params: &[Value]) -> DbResult<Frame> {
    let mut stmt = conn.prepare(sql).map_err(|e| DbError::query(sql, e))?;
    let bound: Vec<DuckValue> = params.iter().map(to_duck_value).collect();

    let rows: Vec<Vec<Value>> = stmt
        .query_map(params_from_iter(bound), |row| {
            let col_count = row.as_ref().column_count();
            (0..col_count)
                .map(|i| row.get::<_, DuckValue>(i).map(from_duck_value))
                .collect()
        })
        .map_err(|e| DbError::query(sql, e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| DbError::query(sql, e))?;

    let columns: Vec<ColumnInfo> = (0..stmt.column_count())
        .map(|i| {
            let name = stmt
                .column_name(i)
                .map_or("?".to_string(), |v| v.to_string());
            ColumnInfo::new(name, stmt.column_type(i).to_string())
        })
        .collect();

    Ok(Frame::from_rows(columns, rows)?)
}

fn execute_statement(conn: &Connection, sql: &str, params: &[Value]) -> DbResult<usize> {
    let bound: Vec<DuckValue> = params.iter().map(to_duck_value).collect();
    conn.execute(sql, params_from_iter(bound))
        .map_err(|e| DbError::query(sql, e))
}

impl Database for DuckDbBackend {
    fn db_type(&self) -> &'static str {
        BACKEND
    }

    fn connect(&mut self) -> DbResult<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        let conn = if self.config.is_memory() {
            Connection::open_in_memory()
        } else {
            Connection::open(&self.config.path)
        }
        .map_err(|e| DbError::connection(BACKEND, e))?;
        log::debug!("Connected to DuckDB at {}", self.config.path);
        self.conn = Some(conn);
        Ok(())
    }

    fn close(&mut self) -> DbResult<()> {
        if let Some(conn) = self.conn.take() {
            conn.close()
                .map_err(|(_, e)| DbError::connection(BACKEND, e))?;
            log::debug!("Closed DuckDB connection to {}", self.config.path);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn read(&self, query: &str, params: &[Value]) -> DbResult<Frame> {
        query_frame(self.conn()?, query, params)
    }

    fn list_tables(&self) -> DbResult<Vec<String>> {
        introspect::list_tables(self, Dialect::DuckDb, INFORMATION_SCHEMA)
    }

    fn get_table_schema(&self, table: &str) -> DbResult<Vec<ColumnDescriptor>> {
        introspect::table_schema(self, Dialect::DuckDb, INFORMATION_SCHEMA, table)
    }

    fn create_table(&self, table: &str, columns: &[ColumnDef]) -> DbResult<()> {
        let name = TableName::try_new(table)?;
        let sql = executor::create_table_sql(&name, columns)?;
        execute_statement(self.conn()?, &sql, &[])?;
        log::debug!("Created table {name}");
        Ok(())
    }

    fn delete_table(&self, table: &str) -> DbResult<()> {
        let name = TableName::try_new(table)?;
        if self.get_table_schema(table)?.is_empty() {
            return Err(DbError::TableNotFound(table.to_string()));
        }
        execute_statement(self.conn()?, &executor::drop_table_sql(&name), &[])?;
        log::debug!("Dropped table {name}");
        Ok(())
    }

    fn execute_query(&self, sql: &str) -> DbResult<Frame> {
        let conn = self.conn()?;
        if executor::returns_rows(sql, Dialect::DuckDb) {
            return query_frame(conn, sql, &[]);
        }
        if executor::split_statements(sql).len() > 1 {
            conn.execute_batch(sql).map_err(|e| DbError::query(sql, e))?;
            return Ok(executor::status_frame(None));
        }
        let affected = execute_statement(conn, sql, &[])?;
        Ok(executor::status_frame(Some(affected as u64)))
    }

    fn write_frame(&self, table: &str, frame: &Frame, mode: WriteMode) -> DbResult<usize> {
        let name = TableName::try_new(table)?;
        let exists = !self.get_table_schema(table)?.is_empty();
        let plan = executor::plan_frame_write(&name, frame, mode, exists, Dialect::DuckDb)?;
        self.transaction(|conn| {
            for BoundStatement { sql, params } in &plan {
                execute_statement(conn, sql, params)?;
            }
            Ok(())
        })?;
        Ok(frame.num_rows())
    }

    fn describe(&self) -> String {
        format!("DuckDB Database Connection: {}", self.config.path)
    }

    fn as_sql(&self) -> Option<&dyn SqlDatabase> {
        Some(self)
    }
}

impl SqlDatabase for DuckDbBackend {
    fn templates(&self) -> &TemplateResolver {
        &self.templates
    }

    fn transaction_query(&self, statements: &[String]) -> DbResult<Frame> {
        let reports = self.transaction(|conn| {
            let mut reports = Vec::with_capacity(statements.len());
            for sql in statements {
                let affected = if executor::returns_rows(sql, Dialect::DuckDb) {
                    query_frame(conn, sql, &[])?.num_rows()
                } else {
                    execute_statement(conn, sql, &[])?
                };
                reports.push((sql.clone(), Some(affected as u64)));
            }
            Ok(reports)
        })?;
        Ok(executor::transaction_frame(reports))
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
