//! Bot confirmation endpoints
//!
//! The bot integration branches on the status code: 400 unparsable text,
//! 404 unknown id, 500 store failure.

use actix_web::{HttpResponse, web};
use serde::Serialize;

use crate::api::{ApiError, AppContext};
use crate::events::BotContact;

#[derive(Debug, Serialize)]
pub struct DetailResponse {
    pub ok: bool,
    pub detail: &'static str,
}

pub struct BotService;

impl BotService {
    pub async fn telegram(
        ctx: web::Data<AppContext>,
        body: web::Json<BotContact>,
    ) -> Result<HttpResponse, ApiError> {
        ctx.reconciler.confirm_telegram(&body.msg).await?;
        Ok(Self::updated())
    }

    pub async fn whatsapp(
        ctx: web::Data<AppContext>,
        body: web::Json<BotContact>,
    ) -> Result<HttpResponse, ApiError> {
        ctx.reconciler.confirm_whatsapp(&body.msg).await?;
        Ok(Self::updated())
    }

    fn updated() -> HttpResponse {
        HttpResponse::Ok().json(DetailResponse {
            ok: true,
            detail: "updated",
        })
    }
}

pub fn bot_routes() -> actix_web::Scope {
    web::scope("/bot")
        .route("/telegram", web::post().to(BotService::telegram))
        .route("/whatsapp", web::post().to(BotService::whatsapp))
}
