use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, Utc};
use tracing::warn;

use super::model::{EventKind, EventPayload};
use crate::allocator::ClickId;

/// Request metadata captured by the HTTP layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub ip: String,
    pub geo_city: String,
    pub user_agent: String,
}

/// 表格中的一行（固定 15 列）
///
/// | A id | B timestamp | C event | D page_city | E-I utm_* | J time_on_page_ms |
/// | K ip | L geo_city | M user_agent | N referrer | O messenger |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub click_id: ClickId,
    pub timestamp: String,
    pub event: EventKind,
    pub page_city: String,
    pub utm_source: String,
    pub utm_medium: String,
    pub utm_campaign: String,
    pub utm_content: String,
    pub utm_term: String,
    pub time_on_page_ms: i64,
    pub ip: String,
    pub geo_city: String,
    pub user_agent: String,
    pub referrer: String,
    /// 创建时为空，由对账写入
    pub messenger: String,
}

impl EventRecord {
    pub const COLUMN_COUNT: usize = 15;
    /// 1-based
    pub const ID_COLUMN: usize = 1;
    /// 1-based，O 列
    pub const MESSENGER_COLUMN: usize = 15;

    /// 按列顺序输出单元格
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.click_id.to_string(),
            self.timestamp.clone(),
            self.event.to_string(),
            self.page_city.clone(),
            self.utm_source.clone(),
            self.utm_medium.clone(),
            self.utm_campaign.clone(),
            self.utm_content.clone(),
            self.utm_term.clone(),
            self.time_on_page_ms.to_string(),
            self.ip.clone(),
            self.geo_city.clone(),
            self.user_agent.clone(),
            self.referrer.clone(),
            self.messenger.clone(),
        ]
    }
}

/// strftime 格式里没有 chrono 无法识别的占位符
pub fn is_valid_timestamp_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

/// Builds [`EventRecord`]s stamped in a fixed local time zone.
#[derive(Debug, Clone)]
pub struct EventEnricher {
    offset: FixedOffset,
    timestamp_format: String,
}

impl EventEnricher {
    pub fn new(offset: FixedOffset, timestamp_format: impl Into<String>) -> Self {
        Self {
            offset,
            timestamp_format: timestamp_format.into(),
        }
    }

    /// 由配置的小时偏移构造，越界时回落到 UTC
    pub fn from_offset_hours(hours: i32, timestamp_format: impl Into<String>) -> Self {
        let offset = FixedOffset::east_opt(hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"));
        Self::new(offset, timestamp_format)
    }

    pub fn enrich(
        &self,
        click_id: &ClickId,
        kind: EventKind,
        payload: &EventPayload,
        ctx: &RequestContext,
    ) -> EventRecord {
        self.enrich_at(click_id, kind, payload, ctx, Utc::now())
    }

    /// 格式无效时退回 RFC 3339，不让请求失败
    fn format_timestamp(&self, now: DateTime<Utc>) -> String {
        let local = now.with_timezone(&self.offset);
        let mut out = String::new();
        if write!(out, "{}", local.format(&self.timestamp_format)).is_err() {
            warn!(
                format = %self.timestamp_format,
                "Invalid timestamp format, using RFC 3339"
            );
            return local.to_rfc3339();
        }
        out
    }

    /// Same as [`enrich`](Self::enrich) with an explicit clock.
    pub fn enrich_at(
        &self,
        click_id: &ClickId,
        kind: EventKind,
        payload: &EventPayload,
        ctx: &RequestContext,
        now: DateTime<Utc>,
    ) -> EventRecord {
        let utm = payload.utm.clone().unwrap_or_default();
        let client = payload.client.clone().unwrap_or_default();

        EventRecord {
            click_id: click_id.clone(),
            timestamp: self.format_timestamp(now),
            event: kind,
            page_city: payload.page_city.clone(),
            utm_source: utm.source,
            utm_medium: utm.medium,
            utm_campaign: utm.campaign,
            utm_content: utm.content,
            utm_term: utm.term,
            time_on_page_ms: client.time_on_page_ms,
            ip: ctx.ip.clone(),
            geo_city: ctx.geo_city.clone(),
            user_agent: ctx.user_agent.clone(),
            referrer: client.referrer,
            messenger: String::new(),
        }
    }
}
