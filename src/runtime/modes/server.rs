//! Server mode
//!
//! Builds the shared context, starts the actix-web server and drains
//! background jobs on shutdown.

use std::time::Duration;

use actix_cors::Cors;
use actix_web::{
    App, HttpServer,
    middleware::{Compress, DefaultHeaders},
    web,
};
use anyhow::Result;
use tracing::{error, warn};

use crate::api::{self, middleware::RequestIdMiddleware};
use crate::config::{ServerConfig, StaticConfig};
use crate::runtime::lifetime;

/// CORS：来源来自配置，方法和请求头不限，允许携带凭据
///
/// 未配置来源时使用同源策略。`*` 不与凭据同时启用。
fn build_cors_middleware(origins: &[String]) -> Cors {
    if origins.is_empty() {
        return Cors::default();
    }

    let cors = Cors::default().allow_any_method().allow_any_header();
    if origins.iter().any(|o| o == "*") {
        return cors.allow_any_origin();
    }

    origins
        .iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
        .supports_credentials()
}

/// 链接带一次性 click id，响应不能被缓存
fn no_store_headers() -> DefaultHeaders {
    DefaultHeaders::new().add(("Cache-Control", "no-store"))
}

fn validate_cors_config(server: &ServerConfig) {
    if server.cors_origins.iter().any(|o| o == "*") {
        warn!("CORS allows any origin; credentials are not supported in this mode");
    }
}

/// Run the HTTP server
///
/// **Note**: Logging system must be initialized before calling this function
pub async fn run_server(config: &StaticConfig) -> Result<()> {
    let context = lifetime::startup::prepare_server_startup(config)
        .await
        .inspect_err(|e| error!("Server startup failed: {:#}", e))?;

    let context = web::Data::new(context);
    let dispatcher = context.dispatcher.clone();

    let cors_origins = config.server.cors_origins.clone();
    validate_cors_config(&config.server);

    let cpu_count = config.server.cpu_count.clamp(1, 32);
    warn!("Using {} CPU cores for the server", cpu_count);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Compress::default())
            .wrap(RequestIdMiddleware)
            .wrap(build_cors_middleware(&cors_origins))
            .wrap(no_store_headers())
            .app_data(context.clone())
            .app_data(web::PayloadConfig::new(64 * 1024))
            .configure(api::configure)
    })
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_millis(5000))
    .workers(cpu_count)
    .disable_signals();

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    warn!("Starting server at http://{}", bind_address);
    let server = server.bind(&bind_address)?.run();
    let handle = server.handle();

    tokio::select! {
        res = server => {
            res?;
        }
        _ = lifetime::shutdown::listen_for_shutdown() => {
            handle.stop(true).await;
        }
    }

    lifetime::shutdown::perform_shutdown_tasks(
        &dispatcher,
        Duration::from_secs(config.dispatcher.shutdown_timeout_secs),
    )
    .await;
    warn!("Graceful shutdown complete");
    Ok(())
}
