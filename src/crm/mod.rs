//! CRM webhook forwarding
//!
//! Form submissions are forwarded as `{name, phone, page_city}` with a
//! bounded number of attempts and exponential backoff between them.
//! `forward` never fails: the final outcome is logged and returned for
//! inspection only.

mod transport;

pub use transport::{UreqTransport, WebhookTransport};

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::CrmConfig;
use crate::errors::{ClickRelayError, Result};
use crate::events::FormData;

/// Webhook 请求体
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CrmPayload {
    pub name: String,
    pub phone: String,
    pub page_city: String,
}

impl CrmPayload {
    pub fn from_form(form: &FormData, page_city: &str) -> Self {
        Self {
            name: form.name.clone(),
            phone: form.phone.clone(),
            page_city: page_city.to_string(),
        }
    }
}

/// 转发结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// 未配置 webhook
    Skipped,
    Delivered { status: u16, attempts: u32 },
    Failed { attempts: u32, error: String },
}

/// 第 `attempt` 次失败后的等待时间：`base * 2^(attempt-1)`，无抖动
pub fn backoff_delay(attempt: u32, base: Duration) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
}

/// 秒数转 Duration，负数、NaN、无穷和溢出都是配置错误
fn config_duration(name: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).map_err(|e| {
        ClickRelayError::configuration(format!(
            "{} = {} is not a valid duration: {}",
            name, secs, e
        ))
    })
}

pub struct CrmForwarder {
    url: Option<String>,
    transport: Arc<dyn WebhookTransport>,
    retries: u32,
    backoff_base: Duration,
    timeout: Duration,
}

impl CrmForwarder {
    pub fn new(
        url: Option<String>,
        transport: Arc<dyn WebhookTransport>,
        retries: u32,
        backoff_base: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            url: url.filter(|u| !u.trim().is_empty()),
            transport,
            retries: retries.max(1),
            backoff_base,
            timeout,
        }
    }

    pub fn from_config(config: &CrmConfig) -> Result<Self> {
        let timeout = config_duration("crm.timeout_secs", config.timeout_secs)?;
        let backoff_base = config_duration("crm.backoff_base_secs", config.backoff_base_secs)?;
        Ok(Self::new(
            config.webhook_url.clone(),
            Arc::new(UreqTransport::new(timeout)),
            config.retries,
            backoff_base,
            timeout,
        ))
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    async fn attempt(&self, url: &str, body: &serde_json::Value) -> Result<u16> {
        let status = tokio::time::timeout(self.timeout, self.transport.post_json(url, body))
            .await??;
        if status < 400 {
            Ok(status)
        } else {
            Err(ClickRelayError::transient_backend(format!(
                "CRM webhook returned {}",
                status
            )))
        }
    }

    /// Deliver `payload`, retrying on transport errors and 4xx/5xx statuses.
    pub async fn forward(&self, payload: &CrmPayload) -> ForwardOutcome {
        let Some(url) = &self.url else {
            info!("CRM webhook url not set, skipping forward");
            return ForwardOutcome::Skipped;
        };

        let body = match serde_json::to_value(payload) {
            Ok(body) => body,
            Err(e) => {
                error!("CRM payload serialization failed: {}", e);
                return ForwardOutcome::Failed {
                    attempts: 0,
                    error: e.to_string(),
                };
            }
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt(url, &body).await {
                Ok(status) => {
                    info!(status, attempts = attempt, payload = %body, "CRM webhook OK");
                    return ForwardOutcome::Delivered {
                        status,
                        attempts: attempt,
                    };
                }
                Err(e) if attempt >= self.retries => {
                    error!(
                        attempts = attempt,
                        error = %e,
                        payload = %body,
                        "CRM webhook failed, giving up"
                    );
                    return ForwardOutcome::Failed {
                        attempts: attempt,
                        error: e.to_string(),
                    };
                }
                Err(e) => {
                    let delay = backoff_delay(attempt, self.backoff_base);
                    warn!(
                        attempt,
                        backoff_ms = delay.as_millis() as u64,
                        error = %e,
                        "CRM webhook error, retrying"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::Value;
    use tokio::time::Instant;

    /// 按顺序返回预设状态码，并记录调用时刻
    struct ScriptedTransport {
        statuses: Mutex<Vec<Result<u16>>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedTransport {
        fn new(statuses: Vec<Result<u16>>) -> Arc<Self> {
            Arc::new(Self {
                statuses: Mutex::new(statuses),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl WebhookTransport for ScriptedTransport {
        async fn post_json(&self, _url: &str, _body: &Value) -> Result<u16> {
            self.calls.lock().push(Instant::now());
            let mut statuses = self.statuses.lock();
            if statuses.is_empty() {
                Ok(500)
            } else {
                statuses.remove(0)
            }
        }
    }

    fn payload() -> CrmPayload {
        CrmPayload {
            name: "Ann".into(),
            phone: "+79990001122".into(),
            page_city: "Moscow".into(),
        }
    }

    fn forwarder(transport: Arc<ScriptedTransport>) -> CrmForwarder {
        CrmForwarder::new(
            Some("https://crm.example/webhook".into()),
            transport,
            3,
            Duration::from_millis(800),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_backoff_delay() {
        let base = Duration::from_millis(800);
        assert_eq!(backoff_delay(1, base), Duration::from_millis(800));
        assert_eq!(backoff_delay(2, base), Duration::from_millis(1600));
        assert_eq!(backoff_delay(3, base), Duration::from_millis(3200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_destination() {
        let transport = ScriptedTransport::new(vec![]);
        let outcome = forwarder(transport.clone()).forward(&payload()).await;

        assert!(matches!(outcome, ForwardOutcome::Failed { attempts: 3, .. }));
        let calls = transport.calls.lock();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1] - calls[0], Duration::from_millis(800));
        assert_eq!(calls[2] - calls[1], Duration::from_millis(1600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transport_error() {
        let transport = ScriptedTransport::new(vec![
            Err(ClickRelayError::transient_backend("connection refused")),
            Ok(201),
        ]);
        let outcome = forwarder(transport.clone()).forward(&payload()).await;
        assert_eq!(
            outcome,
            ForwardOutcome::Delivered {
                status: 201,
                attempts: 2
            }
        );
    }

    #[tokio::test]
    async fn test_skipped_without_url() {
        let transport = ScriptedTransport::new(vec![]);
        let forwarder = CrmForwarder::new(
            Some("  ".into()),
            transport.clone(),
            3,
            Duration::ZERO,
            Duration::from_secs(1),
        );
        assert!(!forwarder.is_enabled());
        assert_eq!(forwarder.forward(&payload()).await, ForwardOutcome::Skipped);
        assert!(transport.calls.lock().is_empty());
    }

    #[test]
    fn test_payload_from_form() {
        let form = FormData {
            name: "Ann".into(),
            phone: "+7".into(),
        };
        let json = serde_json::to_value(CrmPayload::from_form(&form, "Kazan")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "Ann", "phone": "+7", "page_city": "Kazan"})
        );
    }

    #[test]
    fn test_from_config_rejects_unusable_durations() {
        let config = CrmConfig {
            timeout_secs: f64::INFINITY,
            ..CrmConfig::default()
        };
        let err = CrmForwarder::from_config(&config).err().unwrap();
        assert!(matches!(err, ClickRelayError::Configuration(_)));
        assert!(err.message().contains("crm.timeout_secs"));

        let config = CrmConfig {
            backoff_base_secs: -0.5,
            ..CrmConfig::default()
        };
        assert!(CrmForwarder::from_config(&config).is_err());

        assert!(CrmForwarder::from_config(&CrmConfig::default()).is_ok());
    }
}
