//! Click ID allocation
//!
//! Every ingested event gets a [`ClickId`]. The healthy path is an atomic
//! `INCR` on a shared counter seeded at 999, so ids read `1000, 1001, ...`.
//! When the counter backend cannot be reached the allocator degrades to a
//! 12-character random hex id instead of failing the request.
//!
//! Fallback ids are not ordered relative to counter ids and do not match
//! the digit pattern used to pull ids back out of free text.

mod backend;
mod redis_counter;

pub use backend::{CounterBackend, MemoryCounter};
pub use redis_counter::RedisCounter;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::{ClickRelayError, Result};

/// 降级 ID 长度（十六进制字符数）
pub const FALLBACK_ID_LEN: usize = 12;

/// Opaque token naming one event occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClickId(String);

impl ClickId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ClickId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ClickId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 分配结果：计数器签发或降级签发
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Allocation {
    Counter(ClickId),
    Degraded(ClickId),
}

impl Allocation {
    pub fn id(&self) -> &ClickId {
        match self {
            Allocation::Counter(id) | Allocation::Degraded(id) => id,
        }
    }

    pub fn into_id(self) -> ClickId {
        match self {
            Allocation::Counter(id) | Allocation::Degraded(id) => id,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Allocation::Degraded(_))
    }
}

/// 点击 ID 分配器
///
/// 持有一个注入的计数器后端句柄；没有后端时所有分配都走降级路径。
pub struct ClickIdAllocator {
    backend: Option<Arc<dyn CounterBackend>>,
    key: String,
    seed: i64,
    /// 启动时播种失败的话，后端恢复后的第一次分配会补播种
    seeded: AtomicBool,
}

impl ClickIdAllocator {
    pub fn new(backend: Arc<dyn CounterBackend>, key: impl Into<String>, seed: i64) -> Self {
        Self {
            backend: Some(backend),
            key: key.into(),
            seed,
            seeded: AtomicBool::new(false),
        }
    }

    /// 无后端：永久降级
    pub fn without_backend() -> Self {
        Self {
            backend: None,
            key: String::new(),
            seed: 0,
            seeded: AtomicBool::new(false),
        }
    }

    /// 播种计数器（SETNX，幂等）
    ///
    /// 启动时调用一次；失败只记录日志，分配器仍可用（降级）。
    pub async fn initialize(&self) -> Result<()> {
        let Some(backend) = &self.backend else {
            return Err(ClickRelayError::configuration(
                "click id allocator has no counter backend",
            ));
        };

        let created = backend.seed_if_absent(&self.key, self.seed).await?;
        self.seeded.store(true, Ordering::Release);
        if created {
            info!(
                "Counter '{}' seeded at {} on {} backend",
                self.key,
                self.seed,
                backend.name()
            );
        } else {
            debug!("Counter '{}' already present, seed skipped", self.key);
        }
        Ok(())
    }

    /// 通过计数器分配；任何后端错误原样返回
    async fn allocate_from_counter(&self) -> Result<ClickId> {
        let Some(backend) = &self.backend else {
            return Err(ClickRelayError::transient_backend(
                "counter backend is not configured",
            ));
        };

        if !self.seeded.load(Ordering::Acquire) {
            backend.seed_if_absent(&self.key, self.seed).await?;
            self.seeded.store(true, Ordering::Release);
        }

        let next = backend.increment(&self.key).await?;
        Ok(ClickId(next.to_string()))
    }

    /// Allocate an id, tagged with how it was issued. Never fails.
    pub async fn allocate_tagged(&self) -> Allocation {
        match self.allocate_from_counter().await {
            Ok(id) => Allocation::Counter(id),
            Err(e) => {
                let id = Self::fallback_id();
                warn!(
                    click_id = %id,
                    error = %e,
                    "Counter unavailable, issued fallback click id"
                );
                Allocation::Degraded(id)
            }
        }
    }

    /// Allocate an id. Never fails; callers can't tell counter ids from fallback ids.
    pub async fn allocate(&self) -> ClickId {
        self.allocate_tagged().await.into_id()
    }

    /// Allocate from the counter or fail, for callers that need ordering.
    pub async fn allocate_strict(&self) -> Result<ClickId> {
        self.allocate_from_counter().await
    }

    /// 12 位小写十六进制随机 ID（UUID v4 截断）
    pub fn fallback_id() -> ClickId {
        let mut hex = uuid::Uuid::new_v4().simple().to_string();
        hex.truncate(FALLBACK_ID_LEN);
        ClickId(hex)
    }
}
