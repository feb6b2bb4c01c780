//! Record store adapter
//!
//! Appends enriched event rows to an external tabular store, and later
//! locates a row by click id to stamp the messenger column.
//!
//! Lookup is a linear scan of the id column from the top. It doesn't care
//! which insert policy wrote the rows.

mod auth;
mod backend;
mod google;
mod memory;

pub use backend::TabularBackend;
pub use google::GoogleSheetsBackend;
pub use memory::MemorySheet;

pub use crate::config::InsertPolicy;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::events::EventRecord;
use crate::errors::{ClickRelayError, Result};

/// 1 -> A, 26 -> Z, 27 -> AA ...
pub fn column_letter(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// 截断或补齐到恰好 `total` 个单元格
pub fn pad_row(mut values: Vec<String>, total: usize) -> Vec<String> {
    values.resize(total, String::new());
    values
}

/// Opaque result of an append: the range the backend reports as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendHandle(pub String);

pub struct RecordStore {
    backend: Arc<dyn TabularBackend>,
    policy: InsertPolicy,
    total_columns: usize,
    messenger_column: usize,
}

impl RecordStore {
    pub fn new(
        backend: Arc<dyn TabularBackend>,
        policy: InsertPolicy,
        total_columns: usize,
        messenger_column: usize,
    ) -> Self {
        info!(
            "Record store: {} backend, {} policy, {} columns",
            backend.name(),
            policy.as_ref(),
            total_columns
        );
        Self {
            backend,
            policy,
            total_columns,
            messenger_column,
        }
    }

    /// 默认 15 列布局
    pub fn with_defaults(backend: Arc<dyn TabularBackend>, policy: InsertPolicy) -> Self {
        Self::new(
            backend,
            policy,
            EventRecord::COLUMN_COUNT,
            EventRecord::MESSENGER_COLUMN,
        )
    }

    pub fn total_columns(&self) -> usize {
        self.total_columns
    }

    pub fn messenger_column(&self) -> usize {
        self.messenger_column
    }

    pub async fn append(&self, record: &EventRecord) -> Result<AppendHandle> {
        self.append_cells(record.to_row()).await
    }

    /// 写入任意单元格列表（先补齐到固定列数）
    pub async fn append_cells(&self, cells: Vec<String>) -> Result<AppendHandle> {
        let row = pad_row(cells, self.total_columns);
        let range = match self.policy {
            InsertPolicy::Append => self.backend.append_row(row).await?,
            InsertPolicy::InsertTop => self.backend.insert_row_below_header(row).await?,
        };
        debug!("Row written to {}", range);
        Ok(AppendHandle(range))
    }

    /// 返回最上面匹配的行号（1-based），没有则 None
    pub async fn find_by_identifier(&self, id: &str) -> Result<Option<usize>> {
        let column = self.backend.read_column(EventRecord::ID_COLUMN).await?;
        Ok(column
            .iter()
            .position(|cell| cell == id)
            .map(|index| index + 1))
    }

    pub async fn update_field(&self, row: usize, column: usize, value: &str) -> Result<()> {
        if row == 0 || column == 0 {
            return Err(ClickRelayError::malformed_input(format!(
                "cell address must be 1-based, got {}{}",
                column_letter(column),
                row
            )));
        }
        self.backend.update_cell(row, column, value).await
    }

    /// 读取一行，宽度固定为配置列数
    pub async fn read_row(&self, row: usize) -> Result<Vec<String>> {
        let values = self.backend.read_row(row, self.total_columns).await?;
        Ok(pad_row(values, self.total_columns))
    }

    /// 找到 id 所在行并写入 messenger 列
    ///
    /// id 不存在时返回 `NotFound`，后端错误返回 `TransientBackend`。
    pub async fn update_messenger_by_identifier(&self, id: &str, channel: &str) -> Result<usize> {
        let Some(row) = self.find_by_identifier(id).await? else {
            warn!(click_id = %id, "update_messenger_by_identifier: ID not found");
            return Err(ClickRelayError::not_found("ID not found"));
        };
        self.update_field(row, self.messenger_column, channel)
            .await?;
        Ok(row)
    }
}
