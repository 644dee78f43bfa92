//! Google Sheets backend over the Sheets v4 REST API.
//!
//! Each sheet of the spreadsheet acts as a table whose first row is the
//! header. Reads take an A1 range (`Sheet1` or `Sheet1!A1:D10`); there is no
//! SQL, so `execute_query` is not supported.

use crate::error::{DbError, DbResult};
use crate::google_api::{self, ApiClient};
use crate::google_auth::{GoogleAuth, SHEETS_SCOPE};
use crate::traits::Database;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use url::Url;
use zd_core::{ColumnDef, ColumnDescriptor, ColumnInfo, Frame, SpreadsheetConfig, Value, WriteMode};

const BACKEND: &str = "spreadsheet";

const API_ROOT: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Values are parsed as if typed into the UI, so numbers and dates stay
/// numbers and dates.
const VALUE_INPUT_OPTION: &str = "USER_ENTERED";

const DEFAULT_SHEET: &str = "Sheet1";

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ValueRange {
    #[serde(default)]
    pub values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateValuesResponse {
    #[serde(default)]
    pub updated_rows: u64,
    #[serde(default)]
    pub updated_cells: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AppendValuesResponse {
    #[serde(default)]
    pub updates: UpdateValuesResponse,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Spreadsheet {
    #[serde(default)]
    pub spreadsheet_id: Option<String>,
    #[serde(default)]
    pub sheets: Vec<Sheet>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Sheet {
    pub properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SheetProperties {
    pub title: String,
    #[serde(default)]
    pub sheet_id: i64,
}

impl Spreadsheet {
    fn titles(&self) -> Vec<String> {
        self.sheets
            .iter()
            .map(|s| s.properties.title.clone())
            .collect()
    }

    fn sheet_id(&self, title: &str) -> Option<i64> {
        self.sheets
            .iter()
            .find(|s| s.properties.title == title)
            .map(|s| s.properties.sheet_id)
    }
}

/// Google Sheets backend
pub struct SpreadsheetBackend {
    config: SpreadsheetConfig,
    api_root: String,
    client: Option<ApiClient>,
}

impl SpreadsheetBackend {
    pub fn new(config: SpreadsheetConfig) -> Self {
        Self {
            config,
            api_root: API_ROOT.to_string(),
            client: None,
        }
    }

    /// Point the backend at another endpoint, e.g. a local emulator.
    pub fn with_api_root(mut self, root: impl Into<String>) -> Self {
        self.api_root = root.into();
        self
    }

    /// Switch the spreadsheet subsequent calls operate on.
    pub fn set_spreadsheet_id(&mut self, spreadsheet_id: impl Into<String>) {
        let id = spreadsheet_id.into();
        log::debug!("Using spreadsheet {id}");
        self.config.spreadsheet_id = Some(id);
    }

    pub fn spreadsheet_id(&self) -> Option<&str> {
        self.config.spreadsheet_id.as_deref()
    }

    fn client(&self) -> DbResult<&ApiClient> {
        self.client
            .as_ref()
            .ok_or_else(|| DbError::not_connected(BACKEND))
    }

    fn require_id(&self) -> DbResult<&str> {
        self.spreadsheet_id().ok_or_else(|| {
            DbError::connection(
                BACKEND,
                "spreadsheet id is not set; call set_spreadsheet_id first",
            )
        })
    }

    /// Read `sheet_name`, or only `range` of it, with the first row as header.
    pub fn read_sheet(&self, sheet_name: &str, range: Option<&str>) -> DbResult<Frame> {
        self.read_range(&a1_range(sheet_name, range))
    }

    fn read_range(&self, range: &str) -> DbResult<Frame> {
        let client = self.client()?;
        let url = values_url(&self.api_root, self.require_id()?, range, None)?;
        let body: ValueRange = client.get(url)?;
        if body.values.is_empty() {
            log::warn!("No data found in range '{range}'");
        }
        frame_from_values(&body.values)
    }

    /// Write `frame` starting at `range_start` (e.g. `A1`). Returns the
    /// number of updated cells.
    pub fn write_sheet(
        &self,
        frame: &Frame,
        sheet_name: &str,
        range_start: &str,
        include_header: bool,
    ) -> DbResult<u64> {
        let client = self.client()?;
        let range = a1_range(sheet_name, Some(range_start));
        let mut url = values_url(&self.api_root, self.require_id()?, &range, None)?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", VALUE_INPUT_OPTION);
        let body = json!({
            "majorDimension": "ROWS",
            "values": values_from_frame(frame, include_header),
        });
        let response: UpdateValuesResponse = client.send_json(Method::PUT, url, &body)?;
        log::debug!("Updated {} cells in {range}", response.updated_cells);
        Ok(response.updated_cells)
    }

    /// Append the rows of `frame` after the last row of `sheet_name`.
    /// Returns the number of appended cells.
    pub fn append_sheet(
        &self,
        frame: &Frame,
        sheet_name: &str,
        include_header: bool,
    ) -> DbResult<u64> {
        let client = self.client()?;
        let mut url = values_url(&self.api_root, self.require_id()?, sheet_name, Some("append"))?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", VALUE_INPUT_OPTION)
            .append_pair("insertDataOption", "INSERT_ROWS");
        let body = json!({
            "majorDimension": "ROWS",
            "values": values_from_frame(frame, include_header),
        });
        let response: AppendValuesResponse = client.send_json(Method::POST, url, &body)?;
        log::debug!(
            "Appended {} rows to {sheet_name}",
            response.updates.updated_rows
        );
        Ok(response.updates.updated_cells)
    }

    /// Clear the values of `sheet_name`, or only `range` of it. Formatting
    /// is kept.
    pub fn clear_sheet(&self, sheet_name: &str, range: Option<&str>) -> DbResult<()> {
        let client = self.client()?;
        let range = a1_range(sheet_name, range);
        let url = values_url(&self.api_root, self.require_id()?, &range, Some("clear"))?;
        let _: serde_json::Value = client.send_json(Method::POST, url, &json!({}))?;
        log::debug!("Cleared {range}");
        Ok(())
    }

    fn metadata(&self) -> DbResult<Spreadsheet> {
        let client = self.client()?;
        let mut url = google_api::api_url(&self.api_root, &[self.require_id()?])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties(sheetId,title)");
        client.get(url)
    }

    /// Titles of every sheet, in tab order.
    pub fn get_sheet_names(&self) -> DbResult<Vec<String>> {
        Ok(self.metadata()?.titles())
    }

    pub fn create_sheet(&self, sheet_name: &str) -> DbResult<()> {
        let request = json!({ "addSheet": { "properties": { "title": sheet_name } } });
        self.batch_update(vec![request]).map_err(|e| match e {
            DbError::Api { status: 400, message } if message.contains("already exists") => {
                DbError::TableExists(sheet_name.to_string())
            }
            other => other,
        })?;
        log::debug!("Created sheet '{sheet_name}'");
        Ok(())
    }

    pub fn delete_sheet(&self, sheet_name: &str) -> DbResult<()> {
        let sheet_id = self
            .metadata()?
            .sheet_id(sheet_name)
            .ok_or_else(|| DbError::TableNotFound(sheet_name.to_string()))?;
        self.batch_update(vec![json!({ "deleteSheet": { "sheetId": sheet_id } })])?;
        log::debug!("Deleted sheet '{sheet_name}'");
        Ok(())
    }

    fn batch_update(&self, requests: Vec<serde_json::Value>) -> DbResult<()> {
        let client = self.client()?;
        let target = format!("{}:batchUpdate", self.require_id()?);
        let url = google_api::api_url(&self.api_root, &[target.as_str()])?;
        let _: serde_json::Value =
            client.send_json(Method::POST, url, &json!({ "requests": requests }))?;
        Ok(())
    }

    /// Create a new spreadsheet with the given sheets and return its id.
    ///
    /// The current spreadsheet id is left unchanged.
    pub fn create_spreadsheet(&self, title: &str, sheet_names: &[&str]) -> DbResult<String> {
        let client = self.client()?;
        let url = google_api::api_url(&self.api_root, &[])?;
        let body = create_spreadsheet_body(title, sheet_names);
        let created: Spreadsheet = client.send_json(Method::POST, url, &body)?;
        let id = created.spreadsheet_id.ok_or_else(|| DbError::Api {
            status: 200,
            message: "create response carries no spreadsheetId".to_string(),
        })?;
        log::debug!("Created spreadsheet '{title}' ({id})");
        Ok(id)
    }
}

/// A1 notation for a whole sheet or a range within it.
///
/// Sheet names that are not plain identifiers are single-quoted when a
/// range is attached.
pub(crate) fn a1_range(sheet_name: &str, range: Option<&str>) -> String {
    match range {
        None => sheet_name.to_string(),
        Some(range) => {
            let plain = sheet_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
            if plain {
                format!("{sheet_name}!{range}")
            } else {
                format!("'{}'!{range}", sheet_name.replace('\'', "''"))
            }
        }
    }
}

/// `values` endpoint for `range`, optionally with a `:action` suffix.
pub(crate) fn values_url(
    root: &str,
    spreadsheet_id: &str,
    range: &str,
    action: Option<&str>,
) -> DbResult<Url> {
    let target = match action {
        Some(action) => format!("{range}:{action}"),
        None => range.to_string(),
    };
    google_api::api_url(root, &[spreadsheet_id, "values", target.as_str()])
}

pub(crate) fn create_spreadsheet_body(title: &str, sheet_names: &[&str]) -> serde_json::Value {
    let names: Vec<&str> = if sheet_names.is_empty() {
        vec![DEFAULT_SHEET]
    } else {
        sheet_names.to_vec()
    };
    let sheets: Vec<serde_json::Value> = names
        .iter()
        .map(|name| json!({ "properties": { "title": name } }))
        .collect();
    json!({
        "properties": { "title": title },
        "sheets": sheets,
    })
}

/// Frame from a grid of cells: row 0 is the header, shorter rows are padded
/// with NULL and cells beyond the header are dropped.
pub(crate) fn frame_from_values(values: &[Vec<serde_json::Value>]) -> DbResult<Frame> {
    let Some((header, data)) = values.split_first() else {
        return Ok(Frame::default());
    };
    let columns: Vec<ColumnInfo> = header
        .iter()
        .map(|cell| ColumnInfo::new(Value::from_json(cell).to_display_string(), String::new()))
        .collect();
    let width = columns.len();
    let mut frame = Frame::new(columns);
    for row in data {
        let mut cells: Vec<Value> = row.iter().take(width).map(Value::from_json).collect();
        cells.resize(width, Value::Null);
        frame.push_row(cells)?;
    }
    Ok(frame)
}

/// Grid of cells for a values request, optionally led by the header row.
pub(crate) fn values_from_frame(frame: &Frame, include_header: bool) -> Vec<Vec<serde_json::Value>> {
    let mut values = Vec::with_capacity(frame.num_rows() + 1);
    if include_header {
        values.push(frame.column_names().into_iter().map(serde_json::Value::from).collect());
    }
    for row in frame.rows() {
        values.push(row.iter().map(cell_json).collect());
    }
    values
}

fn cell_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::from(""),
        Value::Bytes(b) => serde_json::Value::from(BASE64.encode(b)),
        other => other.to_json(),
    }
}

impl Database for SpreadsheetBackend {
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
            SHEETS_SCOPE,
        )?;
        let client = ApiClient::new(BACKEND, auth)?;
        client.authorize()?;
        log::debug!(
            "Connected to Google Sheets as {}",
            client.client_email().unwrap_or("access token")
        );
        self.client = Some(client);
        Ok(())
    }

    fn close(&mut self) -> DbResult<()> {
        if self.client.take().is_some() {
            log::debug!("Closed Google Sheets client");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    fn read(&self, query: &str, params: &[Value]) -> DbResult<Frame> {
        if !params.is_empty() {
            return Err(DbError::not_implemented(BACKEND, "bind parameters"));
        }
        self.read_range(query)
    }

    fn list_tables(&self) -> DbResult<Vec<String>> {
        self.get_sheet_names()
    }

    /// Header cells of the sheet, all reported as nullable strings.
    fn get_table_schema(&self, table: &str) -> DbResult<Vec<ColumnDescriptor>> {
        if !self.get_sheet_names()?.iter().any(|name| name == table) {
            return Ok(Vec::new());
        }
        let header = self.read_sheet(table, Some("1:1"))?;
        Ok(header
            .column_names()
            .into_iter()
            .map(|name| ColumnDescriptor {
                name: name.to_string(),
                data_type: "STRING".to_string(),
                nullable: true,
                default: None,
                primary_key: false,
            })
            .collect())
    }

    /// Adds a sheet whose first row holds the column names.
    fn create_table(&self, table: &str, columns: &[ColumnDef]) -> DbResult<()> {
        if columns.is_empty() {
            return Err(DbError::schema(table, "at least one column is required"));
        }
        self.create_sheet(table)?;
        let header = Frame::with_names(columns.iter().map(|c| c.name.clone()));
        self.write_sheet(&header, table, "A1", true)?;
        Ok(())
    }

    fn delete_table(&self, table: &str) -> DbResult<()> {
        self.delete_sheet(table)
    }

    fn execute_query(&self, _sql: &str) -> DbResult<Frame> {
        Err(DbError::not_implemented(BACKEND, "execute_query"))
    }

    fn write_frame(&self, table: &str, frame: &Frame, mode: WriteMode) -> DbResult<usize> {
        let exists = self.get_sheet_names()?.iter().any(|name| name == table);
        match (exists, mode) {
            (true, WriteMode::Fail) => return Err(DbError::TableExists(table.to_string())),
            (true, WriteMode::Replace) => {
                self.clear_sheet(table, None)?;
                self.write_sheet(frame, table, "A1", true)?;
            }
            (true, WriteMode::Append) => {
                self.append_sheet(frame, table, false)?;
            }
            (false, _) => {
                self.create_sheet(table)?;
                self.write_sheet(frame, table, "A1", true)?;
            }
        }
        Ok(frame.num_rows())
    }

    fn describe(&self) -> String {
        format!(
            "GoogleSpreadsheet(spreadsheet_id='{}')",
            self.spreadsheet_id().unwrap_or("None")
        )
    }
}

#[cfg(test)]
#[path = "sheets_test.rs"]
mod tests;
