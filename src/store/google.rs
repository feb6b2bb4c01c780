//! Google Sheets v4 后端
//!
//! 使用 ureq 同步客户端，请求在 spawn_blocking 中执行。
//! 单元格一律以 RAW 写入，数字也按文本保存。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use ureq::Agent;

use super::auth::{ServiceAccountKey, TokenProvider};
use super::backend::TabularBackend;
use super::column_letter;
use crate::errors::{ClickRelayError, Result};

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// 表名在 A1 记法中需要时加单引号，内部单引号双写
pub fn quote_sheet_name(name: &str) -> String {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

/// `<sheet>!<range>`
pub fn a1_range(sheet: &str, range: &str) -> String {
    format!("{}!{}", quote_sheet_name(sheet), range)
}

/// 单行区域，例如 `A2:O2`
pub fn row_range(row: usize, width: usize) -> String {
    format!("A{row}:{}{row}", column_letter(width.max(1)))
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    #[serde(default)]
    updates: Option<AppendUpdates>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    #[serde(default)]
    updated_range: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

/// RAW 读取时单元格可能是字符串、数字或布尔
fn cell_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// 同步客户端，所有方法都会阻塞
struct SheetsClient {
    agent: Agent,
    auth: TokenProvider,
    spreadsheet_id: String,
    sheet_name: String,
    /// 数字 sheetId，首次插入行时解析一次
    sheet_id: Mutex<Option<i64>>,
}

impl SheetsClient {
    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/{}/values/{}",
            SHEETS_API_BASE,
            self.spreadsheet_id,
            urlencoding::encode(&a1_range(&self.sheet_name, range))
        )
    }

    fn send<T: DeserializeOwned>(
        &self,
        what: &str,
        result: std::result::Result<ureq::http::Response<ureq::Body>, ureq::Error>,
    ) -> Result<T> {
        let mut resp = result?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.body_mut().read_to_string().unwrap_or_default();
            return Err(ClickRelayError::transient_backend(format!(
                "Sheets {} failed with {}: {}",
                what, status, body
            )));
        }
        Ok(resp.body_mut().read_json()?)
    }

    fn bearer(&self) -> Result<String> {
        Ok(format!("Bearer {}", self.auth.token(&self.agent)?))
    }

    fn get_json<T: DeserializeOwned>(&self, what: &str, url: &str) -> Result<T> {
        let bearer = self.bearer()?;
        self.send(what, self.agent.get(url).header("Authorization", &bearer).call())
    }

    fn post_json<T: DeserializeOwned>(&self, what: &str, url: &str, body: &Value) -> Result<T> {
        let bearer = self.bearer()?;
        self.send(
            what,
            self.agent
                .post(url)
                .header("Authorization", &bearer)
                .send_json(body),
        )
    }

    fn put_json<T: DeserializeOwned>(&self, what: &str, url: &str, body: &Value) -> Result<T> {
        let bearer = self.bearer()?;
        self.send(
            what,
            self.agent
                .put(url)
                .header("Authorization", &bearer)
                .send_json(body),
        )
    }

    fn append_row(&self, row: Vec<String>) -> Result<String> {
        let url = format!(
            "{}:append?valueInputOption=RAW&insertDataOption=INSERT_ROWS",
            self.values_url("A1")
        );
        let resp: AppendResponse = self.post_json("append", &url, &json!({ "values": [row] }))?;
        Ok(resp.updates.map(|u| u.updated_range).unwrap_or_default())
    }

    fn write_row(&self, row_number: usize, row: Vec<String>) -> Result<String> {
        let range = row_range(row_number, row.len());
        let url = format!("{}?valueInputOption=RAW", self.values_url(&range));
        let _: Value = self.put_json(
            "values update",
            &url,
            &json!({ "majorDimension": "ROWS", "values": [row] }),
        )?;
        Ok(a1_range(&self.sheet_name, &range))
    }

    fn resolve_sheet_id(&self) -> Result<i64> {
        let mut cached = self.sheet_id.lock();
        if let Some(id) = *cached {
            return Ok(id);
        }

        let url = format!(
            "{}/{}?fields=sheets.properties",
            SHEETS_API_BASE, self.spreadsheet_id
        );
        let meta: SpreadsheetMeta = self.get_json("metadata", &url)?;
        let id = meta
            .sheets
            .into_iter()
            .find(|s| s.properties.title == self.sheet_name)
            .map(|s| s.properties.sheet_id)
            .ok_or_else(|| {
                ClickRelayError::configuration(format!(
                    "Sheet '{}' not found in spreadsheet",
                    self.sheet_name
                ))
            })?;

        debug!("Resolved sheet '{}' to id {}", self.sheet_name, id);
        *cached = Some(id);
        Ok(id)
    }

    fn insert_row_below_header(&self, row: Vec<String>) -> Result<String> {
        let sheet_id = self.resolve_sheet_id()?;
        let url = format!("{}/{}:batchUpdate", SHEETS_API_BASE, self.spreadsheet_id);
        let body = json!({
            "requests": [{
                "insertDimension": {
                    "range": {
                        "sheetId": sheet_id,
                        "dimension": "ROWS",
                        "startIndex": 1,
                        "endIndex": 2
                    },
                    "inheritFromBefore": false
                }
            }]
        });
        let _: Value = self.post_json("batchUpdate", &url, &body)?;
        self.write_row(2, row)
    }

    fn read_column(&self, column: usize) -> Result<Vec<String>> {
        let letter = column_letter(column);
        let url = format!(
            "{}?majorDimension=COLUMNS",
            self.values_url(&format!("{letter}:{letter}"))
        );
        let range: ValueRange = self.get_json("column read", &url)?;
        Ok(range
            .values
            .into_iter()
            .next()
            .map(|cells| cells.iter().map(cell_to_string).collect())
            .unwrap_or_default())
    }

    fn read_row(&self, row: usize, width: usize) -> Result<Vec<String>> {
        let url = format!(
            "{}?majorDimension=ROWS",
            self.values_url(&row_range(row, width))
        );
        let range: ValueRange = self.get_json("row read", &url)?;
        let mut values: Vec<String> = range
            .values
            .into_iter()
            .next()
            .map(|cells| cells.iter().map(cell_to_string).collect())
            .unwrap_or_default();
        values.resize(width, String::new());
        Ok(values)
    }

    fn update_cell(&self, row: usize, column: usize, value: &str) -> Result<()> {
        let cell = format!("{}{}", column_letter(column), row);
        let url = format!("{}?valueInputOption=RAW", self.values_url(&cell));
        let _: Value = self.put_json(
            "cell update",
            &url,
            &json!({ "majorDimension": "ROWS", "values": [[value]] }),
        )?;
        Ok(())
    }
}

/// Google Sheets 表格后端
pub struct GoogleSheetsBackend {
    client: Arc<SheetsClient>,
}

impl GoogleSheetsBackend {
    pub fn new(
        service_account_file: &str,
        spreadsheet_id: impl Into<String>,
        sheet_name: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let key = ServiceAccountKey::from_file(service_account_file)?;
        let auth = TokenProvider::new(key)?;
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        let client = SheetsClient {
            agent,
            auth,
            spreadsheet_id: spreadsheet_id.into(),
            sheet_name: sheet_name.into(),
            sheet_id: Mutex::new(None),
        };
        info!(
            "Google Sheets backend ready: sheet '{}' as {}",
            client.sheet_name,
            client.auth.client_email()
        );
        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// 在阻塞线程池中执行同步请求
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&SheetsClient) -> Result<T> + Send + 'static,
    {
        let client = Arc::clone(&self.client);
        tokio::task::spawn_blocking(move || f(&client))
            .await
            .unwrap_or_else(|e| {
                warn!("Sheets spawn_blocking failed: {}", e);
                Err(ClickRelayError::transient_backend(format!(
                    "sheets worker failed: {}",
                    e
                )))
            })
    }
}

#[async_trait]
impl TabularBackend for GoogleSheetsBackend {
    async fn append_row(&self, row: Vec<String>) -> Result<String> {
        self.blocking(move |c| c.append_row(row)).await
    }

    async fn insert_row_below_header(&self, row: Vec<String>) -> Result<String> {
        self.blocking(move |c| c.insert_row_below_header(row)).await
    }

    async fn read_column(&self, column: usize) -> Result<Vec<String>> {
        self.blocking(move |c| c.read_column(column)).await
    }

    async fn read_row(&self, row: usize, width: usize) -> Result<Vec<String>> {
        self.blocking(move |c| c.read_row(row, width)).await
    }

    async fn update_cell(&self, row: usize, column: usize, value: &str) -> Result<()> {
        let value = value.to_string();
        self.blocking(move |c| c.update_cell(row, column, &value))
            .await
    }

    fn name(&self) -> &'static str {
        "google_sheets"
    }
}
