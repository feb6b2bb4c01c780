//! 客户端 IP / User-Agent 提取
//!
//! 连接来自私有地址或 localhost 时视为经过反向代理，改用
//! X-Forwarded-For（第一个）或 X-Real-IP；公网直连只信任连接地址。

use std::net::{IpAddr, SocketAddr};

use actix_web::HttpRequest;
use actix_web::http::header::{HeaderMap, USER_AGENT};
use tracing::debug;

/// 检查 IP 是否为私有地址或 localhost
pub fn is_private_or_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback(),
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || (v6.segments()[0] & 0xfe00) == 0xfc00 // fc00::/7
                || (v6.segments()[0] & 0xffc0) == 0xfe80 // fe80::/10
        }
    }
}

/// 解析 `ip` 或 `ip:port`
pub fn parse_ip(value: &str) -> Option<IpAddr> {
    value
        .parse::<SocketAddr>()
        .map(|s| s.ip())
        .or_else(|_| value.parse::<IpAddr>())
        .ok()
}

/// 决定客户端 IP；没有连接地址时返回空串
pub fn resolve_client_ip<F>(peer: Option<&str>, get_forwarded_ip: F) -> String
where
    F: FnOnce() -> Option<String>,
{
    let Some(peer) = peer else {
        return get_forwarded_ip().unwrap_or_default();
    };

    if let Some(peer_ip) = parse_ip(peer)
        && is_private_or_local(&peer_ip)
    {
        if let Some(real_ip) = get_forwarded_ip() {
            debug!("Proxied request from {}: client {}", peer, real_ip);
            return real_ip;
        }
        return peer_ip.to_string();
    }

    parse_ip(peer)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| peer.to_string())
}

/// 从 HeaderMap 提取转发的 IP
pub fn extract_forwarded_ip_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

pub fn extract_client_ip(req: &HttpRequest) -> String {
    let peer = req.peer_addr().map(|addr| addr.ip().to_string());
    resolve_client_ip(peer.as_deref(), || {
        extract_forwarded_ip_from_headers(req.headers())
    })
}

pub fn extract_user_agent(req: &HttpRequest) -> String {
    req.headers()
        .get(USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_is_private_or_local() {
        assert!(is_private_or_local(&"10.0.0.1".parse().unwrap()));
        assert!(is_private_or_local(&"192.168.1.1".parse().unwrap()));
        assert!(is_private_or_local(&"127.0.0.1".parse().unwrap()));
        assert!(is_private_or_local(&"::1".parse().unwrap()));
        assert!(is_private_or_local(&"fd00::1".parse().unwrap()));
        assert!(is_private_or_local(&"fe80::1".parse().unwrap()));
        assert!(!is_private_or_local(&"8.8.8.8".parse().unwrap()));
        assert!(!is_private_or_local(
            &"2001:4860:4860::8888".parse().unwrap()
        ));
    }

    #[test]
    fn test_public_peer_ignores_forwarded_header() {
        let ip = resolve_client_ip(Some("203.0.113.9"), || Some("1.2.3.4".into()));
        assert_eq!(ip, "203.0.113.9");
    }

    #[test]
    fn test_private_peer_uses_forwarded_header() {
        let ip = resolve_client_ip(Some("127.0.0.1:4711"), || Some("198.51.100.2".into()));
        assert_eq!(ip, "198.51.100.2");
        let ip = resolve_client_ip(Some("10.1.1.1"), || None);
        assert_eq!(ip, "10.1.1.1");
    }

    #[test]
    fn test_forwarded_headers() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", "198.51.100.2, 10.0.0.1"))
            .insert_header(("X-Real-IP", "192.0.2.1"))
            .to_http_request();
        assert_eq!(
            extract_forwarded_ip_from_headers(req.headers()).as_deref(),
            Some("198.51.100.2")
        );

        let req = TestRequest::default()
            .insert_header(("X-Real-IP", "192.0.2.1"))
            .to_http_request();
        assert_eq!(
            extract_forwarded_ip_from_headers(req.headers()).as_deref(),
            Some("192.0.2.1")
        );
    }

    #[test]
    fn test_request_without_peer_or_ua() {
        let req = TestRequest::default().to_http_request();
        assert_eq!(extract_client_ip(&req), "");
        assert_eq!(extract_user_agent(&req), "");
    }

    #[test]
    fn test_user_agent() {
        let req = TestRequest::default()
            .insert_header((USER_AGENT, "Mozilla/5.0"))
            .to_http_request();
        assert_eq!(extract_user_agent(&req), "Mozilla/5.0");
    }
}
