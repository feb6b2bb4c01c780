//! 计数器后端抽象
//!
//! 分配器只依赖两个原子原语：set-if-absent（播种）和 increment-and-read。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::errors::{ClickRelayError, Result};

/// 点击 ID 计数器后端
#[async_trait]
pub trait CounterBackend: Send + Sync {
    /// SETNX 语义：仅当 key 不存在时写入 `seed`，返回是否写入
    async fn seed_if_absent(&self, key: &str, seed: i64) -> Result<bool>;

    /// 原子自增并返回新值
    async fn increment(&self, key: &str) -> Result<i64>;

    /// 获取后端名称（用于日志）
    fn name(&self) -> &'static str;
}

/// 进程内计数器
///
/// 用于测试和本地运行；`set_available(false)` 模拟后端故障。
pub struct MemoryCounter {
    values: Mutex<HashMap<String, i64>>,
    available: AtomicBool,
}

impl MemoryCounter {
    pub fn new() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// 读取当前值（不自增）
    pub fn current(&self, key: &str) -> Option<i64> {
        self.values.lock().get(key).copied()
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ClickRelayError::transient_backend(
                "memory counter marked unavailable",
            ))
        }
    }
}

impl Default for MemoryCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterBackend for MemoryCounter {
    async fn seed_if_absent(&self, key: &str, seed: i64) -> Result<bool> {
        self.check_available()?;
        let mut values = self.values.lock();
        if values.contains_key(key) {
            return Ok(false);
        }
        values.insert(key.to_string(), seed);
        Ok(true)
    }

    async fn increment(&self, key: &str) -> Result<i64> {
        self.check_available()?;
        let mut values = self.values.lock();
        // 与 Redis INCR 一致：不存在的 key 视为 0
        let value = values.entry(key.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let counter = MemoryCounter::new();
        assert!(counter.seed_if_absent("k", 999).await.unwrap());
        assert_eq!(counter.increment("k").await.unwrap(), 1000);

        // 第二次播种不能重置已经前进的计数器
        assert!(!counter.seed_if_absent("k", 999).await.unwrap());
        assert_eq!(counter.increment("k").await.unwrap(), 1001);
    }

    #[tokio::test]
    async fn test_increment_unseeded_key_starts_at_one() {
        let counter = MemoryCounter::new();
        assert_eq!(counter.increment("fresh").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_counter_errors() {
        let counter = MemoryCounter::new();
        counter.set_available(false);
        let err = counter.increment("k").await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(counter.current("k"), None);
    }
}
