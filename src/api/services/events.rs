//! Event ingestion endpoints
//!
//! 响应只等待 id 分配和 GeoIP 查询；写表格和 CRM 转发交给后台任务。

use actix_web::{HttpRequest, HttpResponse, web};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::allocator::{Allocation, ClickId};
use crate::api::{ApiError, AppContext};
use crate::crm::CrmPayload;
use crate::errors::ClickRelayError;
use crate::events::{EventKind, EventPayload, RequestContext};
use crate::utils::ip::{extract_client_ip, extract_user_agent};

#[derive(Debug, Serialize)]
pub struct LinkResponse {
    pub ok: bool,
    pub link: String,
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub ok: bool,
}

pub struct EventService;

impl EventService {
    /// 分配 id、补全记录并提交后台写入
    async fn ingest(
        req: &HttpRequest,
        ctx: &AppContext,
        kind: EventKind,
        payload: &EventPayload,
    ) -> Result<Allocation, ApiError> {
        let allocation = if ctx.strict_ids {
            Allocation::Counter(ctx.allocator.allocate_strict().await.inspect_err(|e| {
                error!(event = %kind, error = %e, "Strict click id allocation failed");
            })?)
        } else {
            ctx.allocator.allocate_tagged().await
        };
        let click_id = allocation.id();

        let ip = extract_client_ip(req);
        let request = RequestContext {
            geo_city: ctx.geoip.city_of(&ip).await,
            user_agent: extract_user_agent(req),
            ip,
        };
        info!(
            click_id = %click_id,
            event = %kind,
            page_city = %payload.page_city,
            ip = %request.ip,
            "Event received"
        );

        let record = ctx.enricher.enrich(click_id, kind, payload, &request);
        ctx.dispatcher.submit_persist(ctx.store.clone(), record);
        Ok(allocation)
    }

    pub async fn telegram_click(
        req: HttpRequest,
        ctx: web::Data<AppContext>,
        payload: web::Json<EventPayload>,
    ) -> Result<HttpResponse, ApiError> {
        let allocation = Self::ingest(&req, &ctx, EventKind::TelegramClick, &payload).await?;
        let click_id = allocation.id();

        let link = ctx.links.telegram(click_id).inspect_err(|e| {
            error!(click_id = %click_id, "{}", e);
        })?;
        info!(click_id = %click_id, link = %link, "Telegram link built");
        Ok(HttpResponse::Ok().json(LinkResponse { ok: true, link }))
    }

    pub async fn whatsapp_click(
        req: HttpRequest,
        ctx: web::Data<AppContext>,
        payload: web::Json<EventPayload>,
    ) -> Result<HttpResponse, ApiError> {
        let allocation = Self::ingest(&req, &ctx, EventKind::WhatsappClick, &payload).await?;
        let click_id = allocation.id();

        let link = ctx.links.whatsapp(click_id).inspect_err(|e| {
            error!(click_id = %click_id, "{}", e);
        })?;
        if allocation.is_degraded() {
            warn!(
                click_id = %click_id,
                "WhatsApp link carries a fallback id, free-text confirmation will not find it"
            );
        }
        info!(click_id = %click_id, link = %link, "WhatsApp link built");
        Ok(HttpResponse::Ok().json(LinkResponse { ok: true, link }))
    }

    pub async fn form_submit(
        req: HttpRequest,
        ctx: web::Data<AppContext>,
        payload: web::Json<EventPayload>,
    ) -> Result<HttpResponse, ApiError> {
        let payload = payload.into_inner();
        let Some(form) = payload.form.as_ref() else {
            warn!("form_submit without form block");
            return Err(ClickRelayError::malformed_input(
                "form block with name and phone is required",
            )
            .into());
        };

        let allocation = Self::ingest(&req, &ctx, EventKind::FormSubmit, &payload).await?;
        let click_id: &ClickId = allocation.id();

        ctx.dispatcher.submit_forward(
            ctx.forwarder.clone(),
            CrmPayload::from_form(form, &payload.page_city),
        );
        info!(click_id = %click_id, form_name = %form.name, "CRM forward enqueued");

        Ok(HttpResponse::Ok().json(AckResponse { ok: true }))
    }
}

pub fn event_routes() -> actix_web::Scope {
    web::scope("/events")
        .route("/telegram_click", web::post().to(EventService::telegram_click))
        .route("/whatsapp_click", web::post().to(EventService::whatsapp_click))
        .route("/form_submit", web::post().to(EventService::form_submit))
}
