use async_trait::async_trait;

use crate::errors::Result;

/// 表格存储的底层操作
///
/// 行列号均为 1-based，与表格 A1 地址一致。
#[async_trait]
pub trait TabularBackend: Send + Sync {
    /// 在数据区末尾追加一行，返回写入的区域
    async fn append_row(&self, row: Vec<String>) -> Result<String>;

    /// 在表头下方插入一行并写入，返回写入的区域
    async fn insert_row_below_header(&self, row: Vec<String>) -> Result<String>;

    /// 读取整列，从第 1 行开始；空单元格为空串
    async fn read_column(&self, column: usize) -> Result<Vec<String>>;

    /// 读取一行的前 `width` 列
    async fn read_row(&self, row: usize, width: usize) -> Result<Vec<String>>;

    /// 写入单个单元格，其它单元格不变
    async fn update_cell(&self, row: usize, column: usize, value: &str) -> Result<()>;

    /// 获取后端名称（用于日志）
    fn name(&self) -> &'static str;
}
