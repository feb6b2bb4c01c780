//! Inbound event payloads
//!
//! Only the top level is guaranteed by request validation; every nested
//! block may be missing or partially filled, so all of them default.

use serde::{Deserialize, Deserializer, Serialize};
use strum::AsRefStr;

/// `null` 与缺省都视为空字符串
fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn nullable_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<i64>::deserialize(deserializer)?.unwrap_or_default())
}

/// 事件类型，序列化为表格中的 event 列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    TelegramClick,
    WhatsappClick,
    FormSubmit,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// UTM 归因参数
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Utm {
    #[serde(deserialize_with = "nullable_string")]
    pub source: String,
    #[serde(deserialize_with = "nullable_string")]
    pub medium: String,
    #[serde(deserialize_with = "nullable_string")]
    pub campaign: String,
    #[serde(deserialize_with = "nullable_string")]
    pub content: String,
    #[serde(deserialize_with = "nullable_string")]
    pub term: String,
}

/// 客户端上报的页面信息
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientInfo {
    #[serde(deserialize_with = "nullable_i64")]
    pub time_on_page_ms: i64,
    #[serde(deserialize_with = "nullable_string")]
    pub referrer: String,
}

/// 表单联系人
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormData {
    pub name: String,
    pub phone: String,
}

/// Body of `/events/*` requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventPayload {
    #[serde(default, deserialize_with = "nullable_string")]
    pub page_city: String,
    #[serde(default)]
    pub utm: Option<Utm>,
    #[serde(default)]
    pub client: Option<ClientInfo>,
    /// 仅 form_submit 使用
    #[serde(default)]
    pub form: Option<FormData>,
}

/// Body of `/bot/*` requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotContact {
    #[serde(default, deserialize_with = "nullable_string")]
    pub msg: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_names() {
        assert_eq!(EventKind::TelegramClick.to_string(), "telegram_click");
        assert_eq!(EventKind::WhatsappClick.as_ref(), "whatsapp_click");
        assert_eq!(EventKind::FormSubmit.as_ref(), "form_submit");
    }

    #[test]
    fn test_partial_payload_defaults() {
        let payload: EventPayload = serde_json::from_str(
            r#"{"utm": {"source": "google", "term": null}, "client": {}}"#,
        )
        .unwrap();
        assert_eq!(payload.page_city, "");
        let utm = payload.utm.unwrap();
        assert_eq!(utm.source, "google");
        assert_eq!(utm.term, "");
        assert_eq!(payload.client.unwrap().time_on_page_ms, 0);
        assert!(payload.form.is_none());
    }

    #[test]
    fn test_null_time_on_page() {
        let client: ClientInfo =
            serde_json::from_str(r#"{"time_on_page_ms": null, "referrer": "https://a.b"}"#)
                .unwrap();
        assert_eq!(client.time_on_page_ms, 0);
        assert_eq!(client.referrer, "https://a.b");
    }

    #[test]
    fn test_form_requires_name_and_phone() {
        let result: Result<EventPayload, _> =
            serde_json::from_str(r#"{"form": {"name": "Ann"}}"#);
        assert!(result.is_err());
    }
}
