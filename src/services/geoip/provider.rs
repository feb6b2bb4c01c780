//! GeoIP Provider 抽象层
//!
//! 配置了可读的 maxminddb_path 时使用 MaxMindProvider，否则不做城市解析。
//! 查询失败一律返回空城市，不会影响事件写入。

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::maxmind::MaxMindProvider;
use crate::config::GeoIpConfig;
use crate::utils::ip::is_private_or_local;

/// IP -> 城市名
#[async_trait]
pub trait GeoIpLookup: Send + Sync {
    async fn city(&self, ip: IpAddr) -> Option<String>;

    /// provider 名称（用于日志）
    fn name(&self) -> &'static str;
}

/// 未配置数据库时使用
pub struct DisabledProvider;

#[async_trait]
impl GeoIpLookup for DisabledProvider {
    async fn city(&self, _ip: IpAddr) -> Option<String> {
        None
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Shared handle used by the event handlers.
#[derive(Clone)]
pub struct GeoIpProvider {
    inner: Arc<dyn GeoIpLookup>,
}

impl GeoIpProvider {
    pub fn new(config: &GeoIpConfig) -> Self {
        let inner: Arc<dyn GeoIpLookup> = match config.maxminddb_path.as_deref() {
            Some(path) if !path.is_empty() => match MaxMindProvider::open(path) {
                Ok(provider) => {
                    info!("GeoIP: Using MaxMind database at {}", path);
                    Arc::new(provider)
                }
                Err(e) => {
                    warn!(
                        "GeoIP: Failed to load MaxMind database at {}: {}, city lookup disabled",
                        path, e
                    );
                    Arc::new(DisabledProvider)
                }
            },
            _ => {
                debug!("GeoIP: No MaxMind database configured, city lookup disabled");
                Arc::new(DisabledProvider)
            }
        };

        info!("GeoIP: Initialized with {} provider", inner.name());
        Self { inner }
    }

    pub fn with_lookup(inner: Arc<dyn GeoIpLookup>) -> Self {
        Self { inner }
    }

    pub fn disabled() -> Self {
        Self::with_lookup(Arc::new(DisabledProvider))
    }

    /// 城市名，私有地址、解析失败或未知时为空串
    pub async fn city_of(&self, ip: &str) -> String {
        match ip.parse::<IpAddr>() {
            Ok(addr) if !is_private_or_local(&addr) => {
                self.inner.city(addr).await.unwrap_or_default()
            }
            _ => String::new(),
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.inner.name()
    }
}
