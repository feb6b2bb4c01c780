use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::AsRefStr;

use crate::errors::{ClickRelayError, Result};
use crate::events::is_valid_timestamp_format;

/// 环境变量前缀，分隔符为 `__`，例如 `CR__SERVER__PORT=9000`
pub const ENV_PREFIX: &str = "CR";

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// 新行写入表格的位置策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InsertPolicy {
    /// 追加到数据区末尾（锚定在 A1）
    #[default]
    Append,
    /// 插入到表头下方，最新事件总在最上面
    InsertTop,
}

/// 表格存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SheetsBackendKind {
    #[default]
    Google,
    Memory,
}

/// 静态配置（从 TOML 和环境变量加载，启动时使用）
///
/// 优先级：ENV > config.toml > 默认值
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub counter: CounterConfig,
    #[serde(default)]
    pub sheets: SheetsConfig,
    #[serde(default)]
    pub crm: CrmConfig,
    #[serde(default)]
    pub messengers: MessengerConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub geoip: GeoIpConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 文件不存在时只使用环境变量和默认值。
    pub fn try_load(path: &str) -> Result<Self> {
        use config::{Config, Environment, File};

        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins"),
            )
            .build()?;

        let config: StaticConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 校验跨字段约束
    pub fn validate(&self) -> Result<()> {
        if self.sheets.total_columns == 0 {
            return Err(ClickRelayError::configuration(
                "sheets.total_columns must be at least 1",
            ));
        }
        if self.sheets.messenger_column == 0
            || self.sheets.messenger_column > self.sheets.total_columns
        {
            return Err(ClickRelayError::configuration(format!(
                "sheets.messenger_column must be within 1..={}",
                self.sheets.total_columns
            )));
        }
        if self.crm.retries == 0 {
            return Err(ClickRelayError::configuration(
                "crm.retries must be at least 1",
            ));
        }
        for (name, secs) in [
            ("crm.timeout_secs", self.crm.timeout_secs),
            ("crm.backoff_base_secs", self.crm.backoff_base_secs),
        ] {
            if Duration::try_from_secs_f64(secs).is_err() {
                return Err(ClickRelayError::configuration(format!(
                    "{} must be a finite, non-negative number of seconds, got {}",
                    name, secs
                )));
            }
        }
        if !is_valid_timestamp_format(&self.events.timestamp_format) {
            return Err(ClickRelayError::configuration(format!(
                "events.timestamp_format '{}' contains an unknown specifier",
                self.events.timestamp_format
            )));
        }
        if !(-12..=14).contains(&self.events.utc_offset_hours) {
            return Err(ClickRelayError::configuration(
                "events.utc_offset_hours must be within -12..=14",
            ));
        }
        if self.sheets.backend == SheetsBackendKind::Google {
            for (name, value) in [
                ("sheets.spreadsheet_id", &self.sheets.spreadsheet_id),
                ("sheets.sheet_name", &self.sheets.sheet_name),
                (
                    "sheets.service_account_file",
                    &self.sheets.service_account_file,
                ),
            ] {
                if value.as_deref().is_none_or(str::is_empty) {
                    return Err(ClickRelayError::configuration(format!(
                        "{} is required for the google sheets backend",
                        name
                    )));
                }
            }
        }
        Ok(())
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config)
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_cpu_count")]
    pub cpu_count: usize,
    /// 允许跨域的来源，空表示不允许跨域
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// 点击 ID 计数器（Redis）配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterConfig {
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_counter_key")]
    pub key: String,
    /// 初始值，首次 INCR 返回 seed + 1
    #[serde(default = "default_counter_seed")]
    pub seed: i64,
    #[serde(default = "default_counter_timeout_ms")]
    pub timeout_ms: u64,
    /// 计数器不可用时返回错误而不是随机 ID
    #[serde(default)]
    pub strict: bool,
}

/// 表格存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    #[serde(default)]
    pub backend: SheetsBackendKind,
    #[serde(default)]
    pub spreadsheet_id: Option<String>,
    #[serde(default)]
    pub sheet_name: Option<String>,
    /// Google service account JSON 文件路径
    #[serde(default)]
    pub service_account_file: Option<String>,
    #[serde(default = "default_total_columns")]
    pub total_columns: usize,
    /// 1-based，默认 O 列
    #[serde(default = "default_messenger_column")]
    pub messenger_column: usize,
    #[serde(default)]
    pub insert_policy: InsertPolicy,
    #[serde(default = "default_sheets_timeout_secs")]
    pub timeout_secs: u64,
}

/// CRM webhook 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmConfig {
    /// 未配置时跳过转发
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_crm_timeout_secs")]
    pub timeout_secs: f64,
    #[serde(default = "default_crm_retries")]
    pub retries: u32,
    #[serde(default = "default_crm_backoff_base_secs")]
    pub backoff_base_secs: f64,
}

/// Messenger deep link destinations
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MessengerConfig {
    #[serde(default)]
    pub telegram_bot_username: Option<String>,
    #[serde(default)]
    pub whatsapp_number: Option<String>,
    #[serde(default)]
    pub whatsapp_prefill_text: String,
}

/// 事件记录配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// 固定时区（Europe/Moscow = +3，无夏令时）
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GeoIpConfig {
    /// MaxMindDB 文件路径 (GeoLite2-City.mmdb)，未配置则不做城市解析
    #[serde(default)]
    pub maxminddb_path: Option<String>,
}

/// 后台任务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// 同时访问外部服务的后台任务上限
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

// ============================================================
// Default value functions for static config
// ============================================================

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_cpu_count() -> usize {
    num_cpus::get()
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/0".to_string()
}

fn default_counter_key() -> String {
    "click_id_counter".to_string()
}

fn default_counter_seed() -> i64 {
    999
}

fn default_counter_timeout_ms() -> u64 {
    1000
}

fn default_total_columns() -> usize {
    15
}

fn default_messenger_column() -> usize {
    15
}

fn default_sheets_timeout_secs() -> u64 {
    10
}

fn default_crm_timeout_secs() -> f64 {
    5.0
}

fn default_crm_retries() -> u32 {
    3
}

fn default_crm_backoff_base_secs() -> f64 {
    0.8
}

fn default_utc_offset_hours() -> i32 {
    3
}

fn default_timestamp_format() -> String {
    "%d.%m.%Y %H:%M:%S".to_string()
}

fn default_max_concurrency() -> usize {
    16
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

// ============================================================
// Default implementations
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            cpu_count: default_cpu_count(),
            cors_origins: Vec::new(),
        }
    }
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            key: default_counter_key(),
            seed: default_counter_seed(),
            timeout_ms: default_counter_timeout_ms(),
            strict: false,
        }
    }
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            backend: SheetsBackendKind::default(),
            spreadsheet_id: None,
            sheet_name: None,
            service_account_file: None,
            total_columns: default_total_columns(),
            messenger_column: default_messenger_column(),
            insert_policy: InsertPolicy::default(),
            timeout_secs: default_sheets_timeout_secs(),
        }
    }
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: default_crm_timeout_secs(),
            retries: default_crm_retries(),
            backoff_base_secs: default_crm_backoff_base_secs(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: default_utc_offset_hours(),
            timestamp_format: default_timestamp_format(),
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> StaticConfig {
        let mut config = StaticConfig::default();
        config.sheets.backend = SheetsBackendKind::Memory;
        config
    }

    #[test]
    fn test_default_values() {
        let config = StaticConfig::default();
        assert_eq!(config.counter.seed, 999);
        assert_eq!(config.counter.key, "click_id_counter");
        assert_eq!(config.sheets.total_columns, 15);
        assert_eq!(config.sheets.messenger_column, 15);
        assert_eq!(config.crm.retries, 3);
        assert!((config.crm.backoff_base_secs - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.events.utc_offset_hours, 3);
    }

    #[test]
    fn test_google_backend_requires_credentials() {
        let config = StaticConfig::default();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ClickRelayError::Configuration(_)));
        assert!(err.message().contains("sheets.spreadsheet_id"));
    }

    #[test]
    fn test_memory_backend_validates_without_credentials() {
        assert!(memory_config().validate().is_ok());
    }

    #[test]
    fn test_messenger_column_out_of_range() {
        let mut config = memory_config();
        config.sheets.messenger_column = 16;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unusable_crm_durations_rejected() {
        for secs in [f64::INFINITY, f64::NAN, -1.0, 1e30] {
            let mut config = memory_config();
            config.crm.timeout_secs = secs;
            assert!(config.validate().is_err(), "timeout {}", secs);

            let mut config = memory_config();
            config.crm.backoff_base_secs = secs;
            assert!(config.validate().is_err(), "backoff {}", secs);
        }
    }

    #[test]
    fn test_unknown_timestamp_specifier_rejected() {
        let mut config = memory_config();
        config.events.timestamp_format = "%d.%m.%Y %Q".into();
        let err = config.validate().unwrap_err();
        assert!(err.message().contains("events.timestamp_format"));
    }

    #[test]
    fn test_sample_config_is_valid_toml() {
        let sample = StaticConfig::generate_sample_config();
        let parsed: StaticConfig = toml::from_str(&sample).expect("sample should parse");
        assert_eq!(parsed.server.port, 8080);
        assert_eq!(parsed.sheets.insert_policy, InsertPolicy::Append);
    }
}
