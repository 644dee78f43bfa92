//! BigQuery backend over the v2 REST API.
//!
//! Queries go through `jobs.query`. When the job does not finish within the
//! request timeout, `jobs.getQueryResults` is long-polled until it does, and
//! then paged until no `pageToken` is left. Cells arrive as strings and are
//! decoded by the result schema's field types.

use crate::dialect::Dialect;
use crate::error::{DbError, DbResult};
use crate::executor::{self, BoundStatement};
use crate::google_api::{self, ApiClient};
use crate::google_auth::{GoogleAuth, BIGQUERY_SCOPE};
use crate::introspect;
use crate::traits::{Database, SqlDatabase};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use zd_core::{
    BigQueryConfig, ColumnDef, ColumnDescriptor, ColumnInfo, Frame, TableName, Value, WriteMode,
};
use zd_jinja::TemplateResolver;

const BACKEND: &str = "bigquery";

const API_ROOT: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// Server-side wait per request before a job is reported incomplete.
const QUERY_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueryResponse {
    #[serde(default)]
    pub job_complete: bool,
    pub job_reference: Option<JobReference>,
    pub schema: Option<TableSchema>,
    #[serde(default)]
    pub rows: Vec<TableRow>,
    pub page_token: Option<String>,
    pub num_dml_affected_rows: Option<String>,
    #[serde(default)]
    pub errors: Vec<ErrorProto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobReference {
    pub job_id: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct TableSchema {
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

impl FieldSchema {
    fn is_repeated(&self) -> bool {
        self.mode.as_deref() == Some("REPEATED")
    }

    fn is_record(&self) -> bool {
        matches!(self.field_type.as_str(), "RECORD" | "STRUCT")
    }

    fn column_type(&self) -> String {
        if self.is_repeated() {
            format!("ARRAY<{}>", self.field_type)
        } else {
            self.field_type.clone()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TableRow {
    #[serde(default)]
    pub f: Vec<TableCell>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TableCell {
    #[serde(default)]
    pub v: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorProto {
    #[serde(default)]
    pub message: String,
}

/// Rows of a finished job plus its DML row count, if any.
#[derive(Debug)]
pub(crate) struct QueryOutcome {
    pub frame: Frame,
    pub dml_affected: Option<u64>,
}

/// BigQuery dataset backend
pub struct BigQueryBackend {
    config: BigQueryConfig,
    templates: TemplateResolver,
    api_root: String,
    client: Option<ApiClient>,
}

impl BigQueryBackend {
    pub fn new(config: BigQueryConfig, templates: TemplateResolver) -> Self {
        Self {
            config,
            templates,
            api_root: API_ROOT.to_string(),
            client: None,
        }
    }

    /// Point the backend at another endpoint, e.g. a local emulator.
    pub fn with_api_root(mut self, root: impl Into<String>) -> Self {
        self.api_root = root.into();
        self
    }

    pub fn project_id(&self) -> &str {
        &self.config.project_id
    }

    pub fn dataset_id(&self) -> &str {
        &self.config.dataset_id
    }

    fn client(&self) -> DbResult<&ApiClient> {
        self.client
            .as_ref()
            .ok_or_else(|| DbError::not_connected(BACKEND))
    }

    /// Run `sql` to completion and collect every result page.
    fn run_query(&self, sql: &str, params: &[Value]) -> DbResult<QueryOutcome> {
        let client = self.client()?;
        let body = query_request(&self.config, sql, params);
        let url = google_api::api_url(&self.api_root, &["projects", self.project_id(), "queries"])?;
        log::debug!("Submitting BigQuery job: {sql}");

        let mut response: QueryResponse = client
            .send_json(Method::POST, url, &body)
            .map_err(|e| query_error(sql, e))?;

        while !response.job_complete {
            let job = job_reference(&response, sql)?;
            log::debug!("Waiting for BigQuery job {}", job.job_id);
            response = self.query_results(client, &job, None, sql)?;
        }
        for err in &response.errors {
            log::warn!("BigQuery reported: {}", err.message);
        }

        let schema = response.schema.take().unwrap_or_default();
        let dml_affected = response
            .num_dml_affected_rows
            .as_deref()
            .and_then(|n| n.parse::<u64>().ok());
        let mut rows = std::mem::take(&mut response.rows);

        let mut page_token = response.page_token.take();
        if page_token.is_some() {
            let job = job_reference(&response, sql)?;
            while let Some(token) = page_token {
                let page = self.query_results(client, &job, Some(&token), sql)?;
                rows.extend(page.rows);
                page_token = page.page_token;
            }
        }

        Ok(QueryOutcome {
            frame: frame_from_rows(&schema, &rows)?,
            dml_affected,
        })
    }

    fn query_results(
        &self,
        client: &ApiClient,
        job: &JobReference,
        page_token: Option<&str>,
        sql: &str,
    ) -> DbResult<QueryResponse> {
        let mut url = google_api::api_url(
            &self.api_root,
            &["projects", self.project_id(), "queries", job.job_id.as_str()],
        )?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(location) = job.location.as_deref().or(self.config.location.as_deref()) {
                query.append_pair("location", location);
            }
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
            query.append_pair("timeoutMs", &QUERY_TIMEOUT_MS.to_string());
            query.append_pair("formatOptions.useInt64Timestamp", "true");
        }
        client.get(url).map_err(|e| query_error(sql, e))
    }

    /// Catalog of the dataset a table name points at.
    fn catalog_for(&self, name: &TableName) -> String {
        match name.schema() {
            Some(qualifier) if qualifier.contains('.') => {
                format!("`{qualifier}`.INFORMATION_SCHEMA")
            }
            Some(dataset) => introspect::bigquery_catalog(self.project_id(), dataset),
            None => introspect::bigquery_catalog(self.project_id(), self.dataset_id()),
        }
    }
}

fn job_reference(response: &QueryResponse, sql: &str) -> DbResult<JobReference> {
    response
        .job_reference
        .clone()
        .ok_or_else(|| DbError::query(sql, "response carries no jobReference"))
}

/// A rejected query comes back as HTTP 400; report it against its SQL.
fn query_error(sql: &str, err: DbError) -> DbError {
    match err {
        DbError::Api {
            status: 400,
            message,
        } => DbError::query(sql, message),
        other => other,
    }
}

/// Request body for `jobs.query`.
pub(crate) fn query_request(
    config: &BigQueryConfig,
    sql: &str,
    params: &[Value],
) -> serde_json::Value {
    let mut body = json!({
        "query": sql,
        "useLegacySql": false,
        "defaultDataset": {
            "projectId": config.project_id,
            "datasetId": config.dataset_id,
        },
        "timeoutMs": QUERY_TIMEOUT_MS,
        "formatOptions": { "useInt64Timestamp": true },
    });
    if let Some(location) = &config.location {
        body["location"] = json!(location);
    }
    if !params.is_empty() {
        body["parameterMode"] = json!("POSITIONAL");
        body["queryParameters"] = params.iter().map(query_parameter).collect();
    }
    body
}

/// One positional query parameter. NULL is sent as a typed parameter
/// without a value.
pub(crate) fn query_parameter(value: &Value) -> serde_json::Value {
    let (param_type, param_value) = match value {
        Value::Null => ("STRING", None),
        Value::Bool(b) => ("BOOL", Some(b.to_string())),
        Value::Int(i) => ("INT64", Some(i.to_string())),
        Value::Float(f) => ("FLOAT64", Some(f.to_string())),
        Value::String(s) => ("STRING", Some(s.clone())),
        Value::Bytes(b) => ("BYTES", Some(BASE64.encode(b))),
    };
    let parameter_value = match param_value {
        Some(v) => json!({ "value": v }),
        None => json!({}),
    };
    json!({
        "parameterType": { "type": param_type },
        "parameterValue": parameter_value,
    })
}

/// Build a frame from the result schema and the collected rows.
pub(crate) fn frame_from_rows(schema: &TableSchema, rows: &[TableRow]) -> DbResult<Frame> {
    let columns: Vec<ColumnInfo> = schema
        .fields
        .iter()
        .map(|f| ColumnInfo::new(f.name.clone(), f.column_type()))
        .collect();
    let mut frame = Frame::new(columns);
    for row in rows {
        let cells = schema
            .fields
            .iter()
            .enumerate()
            .map(|(i, field)| row.f.get(i).map_or(Value::Null, |cell| decode_cell(&cell.v, field)))
            .collect();
        frame.push_row(cells)?;
    }
    Ok(frame)
}

/// Decode one cell by its field's type.
///
/// Arrays and records have no cell representation and are returned as
/// JSON text with their nested values decoded.
pub(crate) fn decode_cell(raw: &serde_json::Value, field: &FieldSchema) -> Value {
    if raw.is_null() {
        return Value::Null;
    }
    if field.is_repeated() || field.is_record() {
        return Value::String(nested_json(raw, field, field.is_repeated()).to_string());
    }
    match raw.as_str() {
        Some(text) => decode_scalar(text, &field.field_type),
        None => Value::from_json(raw),
    }
}

fn decode_scalar(text: &str, field_type: &str) -> Value {
    let as_string = || Value::String(text.to_string());
    match field_type {
        "INTEGER" | "INT64" => text.parse().map(Value::Int).unwrap_or_else(|_| as_string()),
        "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" => {
            text.parse().map(Value::Float).unwrap_or_else(|_| as_string())
        }
        "BOOLEAN" | "BOOL" => match text {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => as_string(),
        },
        "TIMESTAMP" => decode_timestamp(text).unwrap_or_else(as_string),
        "BYTES" => BASE64
            .decode(text)
            .map(Value::Bytes)
            .unwrap_or_else(|_| as_string()),
        _ => as_string(),
    }
}

/// TIMESTAMP cells are microseconds since the epoch when
/// `useInt64Timestamp` is honoured, or float seconds otherwise.
fn decode_timestamp(text: &str) -> Option<Value> {
    let micros = match text.parse::<i64>() {
        Ok(micros) => micros,
        Err(_) => {
            let seconds = text.parse::<f64>().ok()?;
            (seconds * 1_000_000.0).round() as i64
        }
    };
    let ts = chrono::DateTime::from_timestamp_micros(micros)?;
    Some(Value::String(
        ts.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true),
    ))
}

fn nested_json(raw: &serde_json::Value, field: &FieldSchema, repeated: bool) -> serde_json::Value {
    if raw.is_null() {
        return serde_json::Value::Null;
    }
    if repeated {
        let items = raw.as_array().map(Vec::as_slice).unwrap_or_default();
        return items
            .iter()
            .map(|item| nested_json(item.get("v").unwrap_or(item), field, false))
            .collect();
    }
    if field.is_record() {
        let cells = raw
            .get("f")
            .and_then(serde_json::Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let object: serde_json::Map<String, serde_json::Value> = field
            .fields
            .iter()
            .enumerate()
            .map(|(i, sub)| {
                let value = cells
                    .get(i)
                    .and_then(|cell| cell.get("v"))
                    .map_or(serde_json::Value::Null, |v| {
                        nested_json(v, sub, sub.is_repeated())
                    });
                (sub.name.clone(), value)
            })
            .collect();
        return serde_json::Value::Object(object);
    }
    match raw.as_str() {
        Some(text) => decode_scalar(text, &field.field_type).to_json(),
        None => raw.clone(),
    }
}

/// Multi-statement script that commits `statements` together or rolls all
/// of them back and re-raises the error.
pub(crate) fn transaction_script(statements: &[String]) -> String {
    let mut script = String::from("BEGIN\n  BEGIN TRANSACTION;\n");
    for sql in statements {
        script.push_str("  ");
        script.push_str(sql.trim().trim_end_matches(';').trim_end());
        script.push_str(";\n");
    }
    script.push_str(
        "  COMMIT TRANSACTION;\n\
         EXCEPTION WHEN ERROR THEN\n  \
         ROLLBACK TRANSACTION;\n  \
         RAISE USING MESSAGE = @@error.message;\n\
         END;",
    );
    script
}

impl Database for BigQueryBackend {
    fn db_type(&self) -> &'static str {
        BACKEND
    }

    fn connect(&mut self) -> DbResult<()> {
        if self.client.is_some() {
            return Ok(());
        }
        let auth = GoogleAuth::resolve(
            self.config.credentials_path.as_deref(),
            self.config.access_token.as_deref(),
            BIGQUERY_SCOPE,
        )?;
        let client = ApiClient::new(BACKEND, auth)?;
        client.authorize()?;
        log::debug!(
            "Connected to BigQuery {} as {}",
            self.config.connection_string(),
            client.client_email().unwrap_or("access token")
        );
        self.client = Some(client);
        Ok(())
    }

    fn close(&mut self) -> DbResult<()> {
        if self.client.take().is_some() {
            log::debug!("Closed BigQuery client for {}", self.config.connection_string());
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    fn read(&self, query: &str, params: &[Value]) -> DbResult<Frame> {
        Ok(self.run_query(query, params)?.frame)
    }

    fn list_tables(&self) -> DbResult<Vec<String>> {
        let catalog = introspect::bigquery_catalog(self.project_id(), self.dataset_id());
        introspect::list_tables(self, Dialect::BigQuery, &catalog)
    }

    fn get_table_schema(&self, table: &str) -> DbResult<Vec<ColumnDescriptor>> {
        let name = TableName::try_new(table)?;
        let catalog = self.catalog_for(&name);
        introspect::table_schema(self, Dialect::BigQuery, &catalog, table)
    }

    fn create_table(&self, table: &str, columns: &[ColumnDef]) -> DbResult<()> {
        let name = TableName::try_new(table)?;
        let sql = executor::create_table_sql(&name, columns)?;
        self.run_query(&sql, &[])?;
        log::debug!("Created table {name}");
        Ok(())
    }

    fn delete_table(&self, table: &str) -> DbResult<()> {
        let name = TableName::try_new(table)?;
        if self.get_table_schema(table)?.is_empty() {
            return Err(DbError::TableNotFound(table.to_string()));
        }
        self.run_query(&executor::drop_table_sql(&name), &[])?;
        log::debug!("Dropped table {name}");
        Ok(())
    }

    fn execute_query(&self, sql: &str) -> DbResult<Frame> {
        let outcome = self.run_query(sql, &[])?;
        if executor::returns_rows(sql, Dialect::BigQuery) {
            return Ok(outcome.frame);
        }
        Ok(executor::status_frame(outcome.dml_affected))
    }

    /// BigQuery cannot run DDL inside a transaction, so the planned
    /// statements run one after another.
    fn write_frame(&self, table: &str, frame: &Frame, mode: WriteMode) -> DbResult<usize> {
        let name = TableName::try_new(table)?;
        let exists = !self.get_table_schema(table)?.is_empty();
        let plan = executor::plan_frame_write(&name, frame, mode, exists, Dialect::BigQuery)?;
        for BoundStatement { sql, params } in &plan {
            self.run_query(sql, params)?;
        }
        Ok(frame.num_rows())
    }

    fn describe(&self) -> String {
        format!(
            "BigQuery Database Connection: {}",
            self.config.connection_string()
        )
    }

    fn as_sql(&self) -> Option<&dyn SqlDatabase> {
        Some(self)
    }
}

impl SqlDatabase for BigQueryBackend {
    fn templates(&self) -> &TemplateResolver {
        &self.templates
    }

    /// Runs as one script job. Per-statement row counts are not reported
    /// by the script, so `rows_affected` is NULL.
    fn transaction_query(&self, statements: &[String]) -> DbResult<Frame> {
        if statements.is_empty() {
            return Ok(executor::transaction_frame(Vec::new()));
        }
        self.run_query(&transaction_script(statements), &[])?;
        Ok(executor::transaction_frame(
            statements.iter().map(|sql| (sql.clone(), None)).collect(),
        ))
    }
}

#[cfg(test)]
#[path = "bigquery_test.rs"]
mod tests;
