use async_trait::async_trait;
use redis::{AsyncCommands, aio::MultiplexedConnection};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, error};

use super::backend::CounterBackend;
use crate::errors::{ClickRelayError, Result};

/// Redis 计数器（INCR / SETNX）
///
/// 连接懒加载，出错时重置，下次调用重新建立连接。
pub struct RedisCounter {
    client: redis::Client,
    /// 持久化连接，使用 RwLock 保护
    connection: Arc<RwLock<Option<MultiplexedConnection>>>,
    op_timeout: Duration,
}

impl RedisCounter {
    /// 创建客户端（不建立连接）
    pub fn new(url: &str, op_timeout: Duration) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| {
            ClickRelayError::configuration(format!("Invalid redis url '{}': {}", url, e))
        })?;

        Ok(Self {
            client,
            connection: Arc::new(RwLock::new(None)),
            op_timeout,
        })
    }

    /// 获取或建立持久连接
    async fn get_connection(&self) -> Result<MultiplexedConnection> {
        {
            let conn_guard = self.connection.read().await;
            if let Some(ref conn) = *conn_guard {
                return Ok(conn.clone());
            }
        }

        let mut conn_guard = self.connection.write().await;

        // 双重检查，避免竞态条件
        if let Some(ref conn) = *conn_guard {
            return Ok(conn.clone());
        }

        let new_conn = timeout(
            self.op_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await??;
        *conn_guard = Some(new_conn.clone());
        debug!("Redis counter connection established");

        Ok(new_conn)
    }

    /// 重置连接（在连接错误时调用）
    async fn reset_connection(&self) {
        let mut conn_guard = self.connection.write().await;
        *conn_guard = None;
        debug!("Redis counter connection reset due to error");
    }

    /// 在超时内执行一条命令，失败时重置连接
    async fn run<T, F, Fut>(&self, op_name: &str, op: F) -> Result<T>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: std::future::Future<Output = redis::RedisResult<T>>,
    {
        let conn = match self.get_connection().await {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to get Redis connection for {}: {}", op_name, e);
                self.reset_connection().await;
                return Err(e);
            }
        };

        match timeout(self.op_timeout, op(conn)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!("Redis {} failed: {}", op_name, e);
                self.reset_connection().await;
                Err(e.into())
            }
            Err(elapsed) => {
                error!(
                    "Redis {} timed out after {:?}",
                    op_name, self.op_timeout
                );
                self.reset_connection().await;
                Err(elapsed.into())
            }
        }
    }

    /// PING 探测
    pub async fn ping(&self) -> Result<()> {
        self.run("PING", |mut conn| async move {
            redis::cmd("PING").query_async::<String>(&mut conn).await
        })
        .await
        .map(|_| ())
    }
}

#[async_trait]
impl CounterBackend for RedisCounter {
    async fn seed_if_absent(&self, key: &str, seed: i64) -> Result<bool> {
        let key = key.to_string();
        self.run("SETNX", |mut conn| async move {
            conn.set_nx::<_, _, bool>(key, seed).await
        })
        .await
    }

    async fn increment(&self, key: &str) -> Result<i64> {
        let key = key.to_string();
        self.run("INCR", |mut conn| async move {
            conn.incr::<_, _, i64>(key, 1).await
        })
        .await
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
