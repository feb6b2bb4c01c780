//! IP 城市解析
//!
//! 仅支持 MaxMind GeoLite2 本地数据库；未配置时城市列留空。

mod maxmind;
mod provider;

pub use provider::{DisabledProvider, GeoIpLookup, GeoIpProvider};
