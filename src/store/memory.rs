//! 内存表格
//!
//! 与 Google Sheets 后端语义一致的进程内实现，用于测试和本地运行。

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::backend::TabularBackend;
use super::column_letter;
use crate::errors::{ClickRelayError, Result};

pub struct MemorySheet {
    rows: RwLock<Vec<Vec<String>>>,
    header_rows: usize,
    failing: AtomicBool,
}

impl MemorySheet {
    /// 空表，无表头
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            header_rows: 0,
            failing: AtomicBool::new(false),
        }
    }

    /// 第 1 行为表头
    pub fn with_header(header: Vec<String>) -> Self {
        Self {
            rows: RwLock::new(vec![header]),
            header_rows: 1,
            failing: AtomicBool::new(false),
        }
    }

    /// 模拟后端故障：之后的所有调用返回 TransientBackend
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// 当前全部行（含表头）
    pub fn snapshot(&self) -> Vec<Vec<String>> {
        self.rows.read().clone()
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(ClickRelayError::transient_backend(
                "memory sheet marked as failing",
            ))
        } else {
            Ok(())
        }
    }

    fn range_of(row: usize, width: usize) -> String {
        format!("A{row}:{}{row}", column_letter(width.max(1)))
    }
}

impl Default for MemorySheet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TabularBackend for MemorySheet {
    async fn append_row(&self, row: Vec<String>) -> Result<String> {
        self.check()?;
        let mut rows = self.rows.write();
        let width = row.len();
        rows.push(row);
        Ok(Self::range_of(rows.len(), width))
    }

    async fn insert_row_below_header(&self, row: Vec<String>) -> Result<String> {
        self.check()?;
        let mut rows = self.rows.write();
        let index = self.header_rows.min(rows.len());
        let width = row.len();
        rows.insert(index, row);
        Ok(Self::range_of(index + 1, width))
    }

    async fn read_column(&self, column: usize) -> Result<Vec<String>> {
        self.check()?;
        let rows = self.rows.read();
        Ok(rows
            .iter()
            .map(|r| r.get(column.saturating_sub(1)).cloned().unwrap_or_default())
            .collect())
    }

    async fn read_row(&self, row: usize, width: usize) -> Result<Vec<String>> {
        self.check()?;
        let rows = self.rows.read();
        let mut values: Vec<String> = row
            .checked_sub(1)
            .and_then(|i| rows.get(i))
            .map(|r| r.iter().take(width).cloned().collect())
            .unwrap_or_default();
        values.resize(width, String::new());
        Ok(values)
    }

    async fn update_cell(&self, row: usize, column: usize, value: &str) -> Result<()> {
        self.check()?;
        if row == 0 || column == 0 {
            return Err(ClickRelayError::malformed_input(format!(
                "cell address must be 1-based, got row {} column {}",
                row, column
            )));
        }
        let mut rows = self.rows.write();
        if rows.len() < row {
            rows.resize_with(row, Vec::new);
        }
        let target = &mut rows[row - 1];
        if target.len() < column {
            target.resize(column, String::new());
        }
        target[column - 1] = value.to_string();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_insert_below_header_keeps_newest_on_top() {
        let sheet = MemorySheet::with_header(row(&["id", "ts"]));
        sheet.insert_row_below_header(row(&["1000", "a"])).await.unwrap();
        let range = sheet
            .insert_row_below_header(row(&["1001", "b"]))
            .await
            .unwrap();
        assert_eq!(range, "A2:B2");

        let column = sheet.read_column(1).await.unwrap();
        assert_eq!(column, vec!["id", "1001", "1000"]);
    }

    #[tokio::test]
    async fn test_update_cell_beyond_row_width() {
        let sheet = MemorySheet::new();
        sheet.append_row(row(&["1000"])).await.unwrap();
        sheet.update_cell(1, 3, "x").await.unwrap();
        assert_eq!(sheet.read_row(1, 4).await.unwrap(), row(&["1000", "", "x", ""]));
    }

    #[tokio::test]
    async fn test_zero_based_address_rejected() {
        let sheet = MemorySheet::new();
        assert!(sheet.update_cell(0, 1, "x").await.is_err());
    }

    #[tokio::test]
    async fn test_failing_sheet() {
        let sheet = MemorySheet::new();
        sheet.set_failing(true);
        let err = sheet.read_column(1).await.unwrap_err();
        assert!(err.is_transient());
    }
}
