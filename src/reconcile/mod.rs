//! Bot confirmation reconciliation
//!
//! A messenger bot relays the text the user sent. The click id is pulled
//! back out of it and the matching row gets its messenger column stamped.
//!
//! - Telegram: `/start <id>`, id is the second whitespace token, verbatim.
//! - WhatsApp: free text; the last 4-7 digit run wins, since the id is
//!   appended after the prefill text.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use strum::AsRefStr;
use tracing::{error, info, warn};

use crate::errors::{ClickRelayError, Result};
use crate::store::RecordStore;

/// 4-7 位数字，两侧为单词边界
const FREE_TEXT_ID_PATTERN: &str = r"\b(\d{4,7})\b";

fn free_text_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(FREE_TEXT_ID_PATTERN).expect("valid click id regex"))
}

/// 写入 messenger 列的渠道名
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Channel {
    Telegram,
    Whatsapp,
}

/// `/start 1042` -> `1042`
pub fn extract_command_id(text: &str) -> Result<String> {
    text.split_whitespace()
        .nth(1)
        .map(str::to_string)
        .ok_or_else(|| ClickRelayError::malformed_input("Bad payload: expected '/start <id>'"))
}

/// 取文本中最后一个 4-7 位数字串
pub fn extract_free_text_id(text: &str) -> Result<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ClickRelayError::malformed_input("Empty payload"));
    }
    free_text_id_regex()
        .captures_iter(text)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| ClickRelayError::malformed_input("click_id not found in text"))
}

/// Drives find-then-update against the record store.
pub struct Reconciler {
    store: Arc<RecordStore>,
}

impl Reconciler {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    pub async fn confirm_telegram(&self, msg: &str) -> Result<String> {
        let click_id = extract_command_id(msg).inspect_err(|_| {
            warn!(msg = %msg, "bot_telegram_bad_payload");
        })?;
        self.stamp(&click_id, Channel::Telegram).await?;
        Ok(click_id)
    }

    pub async fn confirm_whatsapp(&self, msg: &str) -> Result<String> {
        let click_id = extract_free_text_id(msg).inspect_err(|e| {
            warn!(text = %msg, error = %e, "bot_whatsapp_no_id");
        })?;
        self.stamp(&click_id, Channel::Whatsapp).await?;
        Ok(click_id)
    }

    async fn stamp(&self, click_id: &str, channel: Channel) -> Result<()> {
        match self
            .store
            .update_messenger_by_identifier(click_id, channel.as_ref())
            .await
        {
            Ok(row) => {
                info!(click_id, messenger = channel.as_ref(), row, "messenger confirmed");
                Ok(())
            }
            Err(e @ ClickRelayError::NotFound(_)) => {
                warn!(click_id, messenger = channel.as_ref(), "confirmation for unknown id");
                Err(e)
            }
            Err(e) => {
                error!(click_id, messenger = channel.as_ref(), error = %e, "messenger update failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_form() {
        assert_eq!(extract_command_id("/start 1042").unwrap(), "1042");
        assert_eq!(extract_command_id("  /start   abc123def456 extra").unwrap(), "abc123def456");
        assert!(matches!(
            extract_command_id("/start"),
            Err(ClickRelayError::MalformedInput(_))
        ));
        assert!(extract_command_id("").is_err());
    }

    #[test]
    fn test_free_text_last_match_wins() {
        assert_eq!(
            extract_free_text_id("hello 42 order 123456 thanks").unwrap(),
            "123456"
        );
        assert_eq!(extract_free_text_id("id 123456 and 654321").unwrap(), "654321");
        assert_eq!(
            extract_free_text_id("Здравствуйте! Хочу записаться 1042").unwrap(),
            "1042"
        );
    }

    #[test]
    fn test_free_text_ignores_short_and_long_runs() {
        assert!(extract_free_text_id("call me at 12 or 345").is_err());
        // 8 位数字不是合法 id
        assert!(extract_free_text_id("order 12345678").is_err());
        assert_eq!(extract_free_text_id("12345678 then 1000").unwrap(), "1000");
    }

    #[test]
    fn test_free_text_empty_is_malformed() {
        assert!(matches!(
            extract_free_text_id("   "),
            Err(ClickRelayError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_fallback_hex_id_not_extractable() {
        // 降级 id 无法从自由文本中取回
        assert!(extract_free_text_id("hi 3f9a1c0b7e2d").is_err());
    }

    #[test]
    fn test_channel_names() {
        assert_eq!(Channel::Telegram.as_ref(), "telegram");
        assert_eq!(Channel::Whatsapp.as_ref(), "whatsapp");
    }
}
