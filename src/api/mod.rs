//! HTTP surface
//!
//! - `POST /events/{telegram_click,whatsapp_click,form_submit}`
//! - `POST /bot/{telegram,whatsapp}`
//! - `GET /health`

pub mod context;
pub mod error;
pub mod middleware;
pub mod services;

pub use context::AppContext;
pub use error::ApiError;

use actix_web::web;
use tracing::debug;

use crate::errors::ClickRelayError;
use services::{bot_routes, event_routes, health_routes};

/// 无法解析的 JSON 请求体统一返回 `{ok: false, error}` 和 400
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        debug!("Rejected request body: {}", err);
        ApiError(ClickRelayError::malformed_input(err.to_string())).into()
    })
}

/// 注册全部路由（服务器和集成测试共用）
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(health_routes())
        .service(event_routes())
        .service(bot_routes());
}
