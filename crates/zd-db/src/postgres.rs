//! PostgreSQL backend.
//!
//! Uses an `sqlx` pool of one connection driven by a private current-thread
//! runtime, so every call blocks until the database answers.

use crate::dialect::Dialect;
use crate::error::{DbError, DbResult};
use crate::executor::{self, BoundStatement};
use crate::introspect::{self, INFORMATION_SCHEMA};
use crate::traits::{Database, SqlDatabase};
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column as _, Executor, Postgres, Row as _, Statement as _, TypeInfo, ValueRef};
use std::time::Duration;
use tokio::runtime::Runtime;
use zd_core::{
    ColumnDef, ColumnDescriptor, ColumnInfo, Frame, PostgresConfig, TableName, Value, WriteMode,
};
use zd_jinja::TemplateResolver;

const BACKEND: &str = "postgres";

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

struct PgHandle {
    runtime: Runtime,
    pool: PgPool,
}

/// PostgreSQL database backend
pub struct PostgresBackend {
    config: PostgresConfig,
    templates: TemplateResolver,
    handle: Option<PgHandle>,
}

impl PostgresBackend {
    pub fn new(config: PostgresConfig, templates: TemplateResolver) -> Self {
        Self {
            config,
            templates,
            handle: None,
        }
    }

    fn handle(&self) -> DbResult<&PgHandle> {
        self.handle
            .as_ref()
            .ok_or_else(|| DbError::not_connected(BACKEND))
    }

    fn fetch(&self, sql: &str, params: &[Value]) -> DbResult<Frame> {
        let PgHandle { runtime, pool } = self.handle()?;
        runtime.block_on(async {
            let rows = bind_all(sqlx::query(sql), params)
                .fetch_all(pool)
                .await
                .map_err(|e| DbError::query(sql, format_query_error(e)))?;

            let columns = match rows.first() {
                Some(first) => column_info(first),
                None => {
                    let statement = pool
                        .prepare(sql)
                        .await
                        .map_err(|e| DbError::query(sql, format_query_error(e)))?;
                    statement
                        .columns()
                        .iter()
                        .map(|c| ColumnInfo::new(c.name(), c.type_info().name()))
                        .collect()
                }
            };
            Ok::<_, DbError>(Frame::from_rows(columns, rows.iter().map(convert_row).collect())?)
        })
    }

    fn execute(&self, sql: &str, params: &[Value]) -> DbResult<u64> {
        let PgHandle { runtime, pool } = self.handle()?;
        runtime.block_on(async {
            bind_all(sqlx::query(sql), params)
                .execute(pool)
                .await
                .map(|r| r.rows_affected())
                .map_err(|e| DbError::query(sql, format_query_error(e)))
        })
    }

    /// Run `statements` in one transaction, returning per-statement counts.
    fn run_transaction(&self, statements: &[BoundStatement]) -> DbResult<Vec<(String, Option<u64>)>> {
        let PgHandle { runtime, pool } = self.handle()?;
        runtime.block_on(async {
            let mut tx = pool
                .begin()
                .await
                .map_err(|e| DbError::query("BEGIN", format_query_error(e)))?;

            let mut reports = Vec::with_capacity(statements.len());
            for BoundStatement { sql, params } in statements {
                let result = if executor::returns_rows(sql, Dialect::Postgres) {
                    bind_all(sqlx::query(sql), params)
                        .fetch_all(&mut *tx)
                        .await
                        .map(|rows| rows.len() as u64)
                } else {
                    bind_all(sqlx::query(sql), params)
                        .execute(&mut *tx)
                        .await
                        .map(|r| r.rows_affected())
                };
                match result {
                    Ok(affected) => reports.push((sql.clone(), Some(affected))),
                    Err(e) => {
                        if let Err(rollback) = tx.rollback().await {
                            log::warn!("PostgreSQL rollback failed: {rollback}");
                        }
                        return Err(DbError::query(sql, format_query_error(e)));
                    }
                }
            }

            tx.commit()
                .await
                .map_err(|e| DbError::query("COMMIT", format_query_error(e)))?;
            Ok::<_, DbError>(reports)
        })
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [Value],
) -> Query<'q, Postgres, PgArguments> {
    for value in params {
        query = match value {
            Value::Null => query.bind(Option::<String>::None),
            Value::Bool(b) => query.bind(*b),
            Value::Int(i) => query.bind(*i),
            Value::Float(f) => query.bind(*f),
            Value::String(s) => query.bind(s.as_str()),
            Value::Bytes(b) => query.bind(b.as_slice()),
        };
    }
    query
}

fn column_info(row: &PgRow) -> Vec<ColumnInfo> {
    row.columns()
        .iter()
        .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
        .collect()
}

fn convert_row(row: &PgRow) -> Vec<Value> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Decode one column by its Postgres type name. Values of types without a
/// cell representation, or that fail to decode, become NULL.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(index).ok().flatten().into(),
        "INT2" => row
            .try_get::<Option<i16>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v.into()))
            .unwrap_or(Value::Null),
        "INT4" => row.try_get::<Option<i32>, _>(index).ok().flatten().into(),
        "INT8" => row.try_get::<Option<i64>, _>(index).ok().flatten().into(),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Float(v.into()))
            .unwrap_or(Value::Null),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index).ok().flatten().into(),
        "NUMERIC" => raw_bytes(row, index)
            .and_then(numeric_to_f64)
            .map(Value::Float)
            .unwrap_or(Value::Null),
        "BYTEA" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(index)
            .ok()
            .flatten()
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null),
        "TIME" => row
            .try_get::<Option<chrono::NaiveTime>, _>(index)
            .ok()
            .flatten()
            .map(|t| Value::String(t.format("%H:%M:%S%.f").to_string()))
            .unwrap_or(Value::Null),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)
            .ok()
            .flatten()
            .map(|ts| Value::String(ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()))
            .unwrap_or(Value::Null),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)
            .ok()
            .flatten()
            .map(|ts| Value::String(ts.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)))
            .unwrap_or(Value::Null),
        "JSON" | "JSONB" => row
            .try_get::<Option<serde_json::Value>, _>(index)
            .ok()
            .flatten()
            .map(|j| Value::String(j.to_string()))
            .unwrap_or(Value::Null),
        "UUID" => raw_bytes(row, index)
            .and_then(format_uuid)
            .map(Value::String)
            .unwrap_or(Value::Null),
        _ => match row.try_get::<Option<String>, _>(index) {
            Ok(v) => v.into(),
            Err(e) => {
                log::debug!("Cannot decode column {index} of type {type_name}: {e}");
                Value::Null
            }
        },
    }
}

fn raw_bytes(row: &PgRow, index: usize) -> Option<&[u8]> {
    let raw = row.try_get_raw(index).ok()?;
    if raw.is_null() {
        return None;
    }
    raw.as_bytes().ok()
}

/// Binary NUMERIC: digit count, weight, sign and display scale as 16-bit
/// big-endian words, then base-10000 digits.
pub(crate) fn numeric_to_f64(bytes: &[u8]) -> Option<f64> {
    let word = |i: usize| -> Option<u16> {
        let b = bytes.get(i * 2..i * 2 + 2)?;
        Some(u16::from_be_bytes([b[0], b[1]]))
    };
    let ndigits = word(0)? as usize;
    let weight = word(1)? as i16;
    let sign = word(2)?;
    if sign == 0xC000 {
        return Some(f64::NAN);
    }
    let mut value = 0.0;
    for i in 0..ndigits {
        let digit = f64::from(word(4 + i)?);
        let exponent = i32::from(weight) - i as i32;
        value += digit * 10_000f64.powi(exponent);
    }
    Some(if sign == 0x4000 { -value } else { value })
}

fn format_uuid(bytes: &[u8]) -> Option<String> {
    if bytes.len() != 16 {
        return None;
    }
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    Some(format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    ))
}

/// Error text with the server's detail, hint and the object it concerns.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };
    let mut message = db_error.message().to_string();
    if let Some(pg) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        let fields = [
            ("DETAIL", pg.detail()),
            ("HINT", pg.hint()),
            ("TABLE", pg.table()),
            ("COLUMN", pg.column()),
            ("CONSTRAINT", pg.constraint()),
        ];
        for (label, value) in fields {
            if let Some(value) = value {
                message.push_str(&format!("\n  {label}: {value}"));
            }
        }
    }
    message
}

impl Database for PostgresBackend {
    fn db_type(&self) -> &'static str {
        BACKEND
    }

    fn connect(&mut self) -> DbResult<()> {
        if self.handle.is_some() {
            return Ok(());
        }
        let url = self.config.connection_string()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DbError::connection(BACKEND, e))?;
        let pool = runtime
            .block_on(
                PgPoolOptions::new()
                    .max_connections(1)
                    .acquire_timeout(ACQUIRE_TIMEOUT)
                    .connect(&url),
            )
            .map_err(|e| DbError::connection(BACKEND, e))?;
        log::debug!("Connected to PostgreSQL at {}", self.config.display_string());
        self.handle = Some(PgHandle { runtime, pool });
        Ok(())
    }

    fn close(&mut self) -> DbResult<()> {
        if let Some(PgHandle { runtime, pool }) = self.handle.take() {
            runtime.block_on(pool.close());
            log::debug!("Closed PostgreSQL connection to {}", self.config.display_string());
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    fn read(&self, query: &str, params: &[Value]) -> DbResult<Frame> {
        self.fetch(query, params)
    }

    fn list_tables(&self) -> DbResult<Vec<String>> {
        introspect::list_tables(self, Dialect::Postgres, INFORMATION_SCHEMA)
    }

    fn get_table_schema(&self, table: &str) -> DbResult<Vec<ColumnDescriptor>> {
        introspect::table_schema(self, Dialect::Postgres, INFORMATION_SCHEMA, table)
    }

    fn create_table(&self, table: &str, columns: &[ColumnDef]) -> DbResult<()> {
        let name = TableName::try_new(table)?;
        let sql = executor::create_table_sql(&name, columns)?;
        self.execute(&sql, &[])?;
        log::debug!("Created table {name}");
        Ok(())
    }

    fn delete_table(&self, table: &str) -> DbResult<()> {
        let name = TableName::try_new(table)?;
        if self.get_table_schema(table)?.is_empty() {
            return Err(DbError::TableNotFound(table.to_string()));
        }
        self.execute(&executor::drop_table_sql(&name), &[])?;
        log::debug!("Dropped table {name}");
        Ok(())
    }

    fn execute_query(&self, sql: &str) -> DbResult<Frame> {
        if executor::returns_rows(sql, Dialect::Postgres) {
            return self.fetch(sql, &[]);
        }
        if executor::split_statements(sql).len() > 1 {
            let PgHandle { runtime, pool } = self.handle()?;
            let affected = runtime.block_on(async {
                sqlx::raw_sql(sql)
                    .execute(pool)
                    .await
                    .map(|r| r.rows_affected())
                    .map_err(|e| DbError::query(sql, format_query_error(e)))
            })?;
            return Ok(executor::status_frame(Some(affected)));
        }
        let affected = self.execute(sql, &[])?;
        Ok(executor::status_frame(Some(affected)))
    }

    fn write_frame(&self, table: &str, frame: &Frame, mode: WriteMode) -> DbResult<usize> {
        let name = TableName::try_new(table)?;
        let exists = !self.get_table_schema(table)?.is_empty();
        let plan = executor::plan_frame_write(&name, frame, mode, exists, Dialect::Postgres)?;
        self.run_transaction(&plan)?;
        Ok(frame.num_rows())
    }

    fn describe(&self) -> String {
        format!(
            "PostgreSQL Database Connection: {}",
            self.config.display_string()
        )
    }

    fn as_sql(&self) -> Option<&dyn SqlDatabase> {
        Some(self)
    }
}

impl SqlDatabase for PostgresBackend {
    fn templates(&self) -> &TemplateResolver {
        &self.templates
    }

    fn transaction_query(&self, statements: &[String]) -> DbResult<Frame> {
        let bound: Vec<BoundStatement> = statements.iter().map(BoundStatement::new).collect();
        let reports = self.run_transaction(&bound)?;
        Ok(executor::transaction_frame(reports))
    }
}

#[cfg(test)]
#[path = "postgres_test.rs"]
mod tests;
