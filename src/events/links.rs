//! Messenger deep links carrying the click id

use crate::allocator::ClickId;
use crate::config::MessengerConfig;
use crate::errors::{ClickRelayError, Result};

#[derive(Debug, Clone, Default)]
pub struct MessengerLinks {
    telegram_bot_username: Option<String>,
    whatsapp_number: Option<String>,
    whatsapp_prefill_text: String,
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl MessengerLinks {
    pub fn new(
        telegram_bot_username: Option<String>,
        whatsapp_number: Option<String>,
        whatsapp_prefill_text: impl Into<String>,
    ) -> Self {
        Self {
            telegram_bot_username: non_empty(telegram_bot_username.as_ref()),
            whatsapp_number: non_empty(whatsapp_number.as_ref()),
            whatsapp_prefill_text: whatsapp_prefill_text.into(),
        }
    }

    pub fn from_config(config: &MessengerConfig) -> Self {
        Self::new(
            config.telegram_bot_username.clone(),
            config.whatsapp_number.clone(),
            config.whatsapp_prefill_text.clone(),
        )
    }

    /// `https://t.me/<bot>?start=<id>`
    pub fn telegram(&self, click_id: &ClickId) -> Result<String> {
        let bot = self
            .telegram_bot_username
            .as_deref()
            .ok_or_else(|| ClickRelayError::configuration("TELEGRAM_BOT_USERNAME not set"))?;
        Ok(format!("https://t.me/{}?start={}", bot, click_id))
    }

    /// `https://wa.me/<number>?text=<prefill><id>`，prefill 百分号编码，id 原样追加
    pub fn whatsapp(&self, click_id: &ClickId) -> Result<String> {
        let number = self
            .whatsapp_number
            .as_deref()
            .ok_or_else(|| ClickRelayError::configuration("WHATSAPP_NUMBER not set"))?;
        Ok(format!(
            "https://wa.me/{}?text={}{}",
            number,
            urlencoding::encode(&self.whatsapp_prefill_text),
            click_id
        ))
    }
}
