use std::time::Duration;

use tokio::signal;
use tracing::{error, info, warn};

use crate::dispatch::Dispatcher;

/// 等待 Ctrl+C
pub async fn listen_for_shutdown() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, waiting for background jobs..."),
        Err(e) => warn!(
            "Failed to listen for Ctrl+C: {}. Proceeding with shutdown anyway.",
            e
        ),
    }
}

/// 等待后台写表格 / CRM 转发任务完成
pub async fn perform_shutdown_tasks(dispatcher: &Dispatcher, timeout: Duration) {
    if dispatcher.drain(timeout).await {
        info!("All background jobs completed");
    } else {
        error!(
            "Background jobs did not finish within {} seconds, abandoning {}",
            timeout.as_secs(),
            dispatcher.in_flight()
        );
    }
}
