use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::allocator::{ClickIdAllocator, RedisCounter};
use crate::api::AppContext;
use crate::config::{SheetsBackendKind, StaticConfig};
use crate::crm::CrmForwarder;
use crate::dispatch::Dispatcher;
use crate::events::{EventEnricher, MessengerLinks};
use crate::services::geoip::GeoIpProvider;
use crate::store::{GoogleSheetsBackend, MemorySheet, RecordStore, TabularBackend};

/// 构造计数器并播种；Redis 不可达时仍然返回分配器（降级运行）
async fn prepare_allocator(config: &StaticConfig) -> Result<Arc<ClickIdAllocator>> {
    let counter = Arc::new(
        RedisCounter::new(
            &config.counter.redis_url,
            Duration::from_millis(config.counter.timeout_ms),
        )
        .context("Failed to create redis counter")?,
    );

    if let Err(e) = counter.ping().await {
        warn!("Redis counter is not reachable at startup: {}", e);
    }

    let allocator = ClickIdAllocator::new(
        counter,
        config.counter.key.clone(),
        config.counter.seed,
    );
    if let Err(e) = allocator.initialize().await {
        warn!(
            "Counter seeding failed ({}), click ids will use fallback format until redis recovers",
            e
        );
    }
    Ok(Arc::new(allocator))
}

fn prepare_store(config: &StaticConfig) -> Result<Arc<RecordStore>> {
    let sheets = &config.sheets;
    let backend: Arc<dyn TabularBackend> = match sheets.backend {
        SheetsBackendKind::Google => Arc::new(
            GoogleSheetsBackend::new(
                sheets.service_account_file.as_deref().unwrap_or_default(),
                sheets.spreadsheet_id.clone().unwrap_or_default(),
                sheets.sheet_name.clone().unwrap_or_default(),
                Duration::from_secs(sheets.timeout_secs),
            )
            .context("Failed to initialize Google Sheets backend")?,
        ),
        SheetsBackendKind::Memory => {
            warn!("Using in-memory sheet backend, events are lost on restart");
            Arc::new(MemorySheet::new())
        }
    };

    Ok(Arc::new(RecordStore::new(
        backend,
        sheets.insert_policy,
        sheets.total_columns,
        sheets.messenger_column,
    )))
}

/// 准备服务器启动所需的全部组件
pub async fn prepare_server_startup(config: &StaticConfig) -> Result<AppContext> {
    let start_time = std::time::Instant::now();
    debug!("Starting pre-startup processing...");

    let allocator = prepare_allocator(config).await?;
    let store = prepare_store(config)?;

    let forwarder = Arc::new(
        CrmForwarder::from_config(&config.crm).context("Failed to configure CRM forwarder")?,
    );
    if !forwarder.is_enabled() {
        info!("CRM webhook url not set, form submissions will not be forwarded");
    }

    let enricher = EventEnricher::from_offset_hours(
        config.events.utc_offset_hours,
        config.events.timestamp_format.clone(),
    );
    let links = MessengerLinks::from_config(&config.messengers);

    let context = AppContext::new(
        allocator,
        store,
        forwarder,
        Dispatcher::new(config.dispatcher.max_concurrency),
        enricher,
    )
    .with_geoip(GeoIpProvider::new(&config.geoip))
    .with_links(links)
    .with_strict_ids(config.counter.strict);

    if config.counter.strict {
        info!("Strict click id mode: counter failures answer 500");
    }
    info!(
        "Pre-startup processing completed in {} ms",
        start_time.elapsed().as_millis()
    );
    Ok(context)
}
