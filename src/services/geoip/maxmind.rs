//! MaxMind GeoLite2-City 本地数据库

use std::net::IpAddr;

use async_trait::async_trait;
use maxminddb::Reader;
use maxminddb::geoip2::City;
use tracing::trace;

use super::provider::GeoIpLookup;

/// 整个 mmdb 文件读入内存，查询不再访问磁盘
pub struct MaxMindProvider {
    reader: Reader<Vec<u8>>,
}

impl MaxMindProvider {
    pub fn open(path: &str) -> Result<Self, maxminddb::MaxMindDbError> {
        Ok(Self {
            reader: Reader::open_readfile(path)?,
        })
    }
}

#[async_trait]
impl GeoIpLookup for MaxMindProvider {
    async fn city(&self, ip: IpAddr) -> Option<String> {
        let record: City = self.reader.lookup(ip).ok()?.decode().ok()??;
        let name = record.city.names.english.map(str::to_string);
        trace!(%ip, city = ?name, "MaxMind lookup");
        name
    }

    fn name(&self) -> &'static str {
        "maxmind"
    }
}
