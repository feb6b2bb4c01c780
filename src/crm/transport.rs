use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;
use ureq::Agent;

use crate::errors::{ClickRelayError, Result};

/// Sends one JSON POST and reports the HTTP status.
///
/// Transport errors (DNS, connect, read timeout) are `Err`; any HTTP
/// response, including 4xx/5xx, is `Ok(status)`.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn post_json(&self, url: &str, body: &Value) -> Result<u16>;
}

/// ureq 实现（阻塞请求放在 spawn_blocking 中）
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self { agent }
    }
}

#[async_trait]
impl WebhookTransport for UreqTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<u16> {
        let agent = self.agent.clone();
        let url = url.to_string();
        let body = body.clone();

        tokio::task::spawn_blocking(move || -> Result<u16> {
            let resp = agent
                .post(&url)
                .header("Content-Type", "application/json")
                .send_json(&body)?;
            Ok(resp.status().as_u16())
        })
        .await
        .unwrap_or_else(|e| {
            warn!("Webhook spawn_blocking failed: {}", e);
            Err(ClickRelayError::transient_backend(format!(
                "webhook worker failed: {}",
                e
            )))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpResponse, HttpServer, web};
    use serde_json::json;

    /// 本地 webhook：/ok 返回 200，/busy 返回 503，/invalid 返回 422
    fn start_webhook() -> (String, actix_web::dev::ServerHandle) {
        let server = HttpServer::new(|| {
            App::new()
                .route("/ok", web::post().to(|| async { HttpResponse::Ok().finish() }))
                .route(
                    "/busy",
                    web::post().to(|| async { HttpResponse::ServiceUnavailable().finish() }),
                )
                .route(
                    "/invalid",
                    web::post().to(|| async { HttpResponse::UnprocessableEntity().finish() }),
                )
        })
        .workers(1)
        .disable_signals()
        .bind(("127.0.0.1", 0))
        .unwrap();
        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_rt::spawn(server);
        (format!("http://{}", addr), handle)
    }

    #[actix_rt::test]
    async fn test_error_statuses_are_reported_not_raised() {
        let (base, handle) = start_webhook();
        let transport = UreqTransport::new(Duration::from_secs(5));
        let body = json!({"name": "Ann", "phone": "+79990001122", "page_city": "Kazan"});

        assert_eq!(transport.post_json(&format!("{base}/ok"), &body).await.unwrap(), 200);
        assert_eq!(transport.post_json(&format!("{base}/busy"), &body).await.unwrap(), 503);
        assert_eq!(transport.post_json(&format!("{base}/invalid"), &body).await.unwrap(), 422);

        handle.stop(false).await;
    }

    #[actix_rt::test]
    async fn test_connection_failure_is_transient_error() {
        // 绑定后立即释放端口，连接会被拒绝
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let transport = UreqTransport::new(Duration::from_secs(2));

        let err = transport
            .post_json(&format!("http://{addr}/hook"), &json!({}))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
