//! Configuration loading tests
//!
//! 环境变量是进程级的，只有 `test_env_overrides_file` 会设置变量，
//! 并且只触碰其它测试不检查的键。

use std::io::Write;

use clickrelay::config::{InsertPolicy, SheetsBackendKind, StaticConfig};
use clickrelay::errors::ClickRelayError;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_from_toml() {
    let file = write_config(
        r#"
[server]
port = 9100
cors_origins = ["https://landing.example"]

[counter]
key = "clicks"
strict = true

[sheets]
backend = "memory"
insert_policy = "insert_top"

[messengers]
telegram_bot_username = "acme_bot"
whatsapp_prefill_text = "Hi! "
"#,
    );

    let config = StaticConfig::try_load(file.path().to_str().unwrap()).unwrap();
    assert_eq!(config.server.port, 9100);
    assert_eq!(config.server.cors_origins, vec!["https://landing.example"]);
    assert_eq!(config.counter.key, "clicks");
    assert_eq!(config.counter.seed, 999);
    assert!(config.counter.strict);
    assert_eq!(config.sheets.backend, SheetsBackendKind::Memory);
    assert_eq!(config.sheets.insert_policy, InsertPolicy::InsertTop);
    assert_eq!(
        config.messengers.telegram_bot_username.as_deref(),
        Some("acme_bot")
    );
    assert_eq!(config.crm.retries, 3);
}

#[test]
fn test_missing_file_uses_defaults_and_fails_validation() {
    // 默认后端是 google，缺少凭据
    let err = StaticConfig::try_load("/nonexistent/clickrelay.toml").unwrap_err();
    assert!(matches!(err, ClickRelayError::Configuration(_)));
}

#[test]
fn test_invalid_values_are_rejected() {
    let file = write_config(
        r#"
[sheets]
backend = "memory"
total_columns = 10
messenger_column = 15
"#,
    );
    let err = StaticConfig::try_load(file.path().to_str().unwrap()).unwrap_err();
    assert!(err.message().contains("sheets.messenger_column"));

    let file = write_config(
        r#"
[sheets]
backend = "memory"

[crm]
retries = 0
"#,
    );
    assert!(StaticConfig::try_load(file.path().to_str().unwrap()).is_err());
}

#[test]
fn test_env_overrides_file() {
    let file = write_config(
        r#"
[sheets]
backend = "memory"

[dispatcher]
max_concurrency = 4
"#,
    );

    // SAFETY: 本测试文件中只有这个测试修改环境变量
    unsafe {
        std::env::set_var("CR__DISPATCHER__MAX_CONCURRENCY", "7");
    }
    let config = StaticConfig::try_load(file.path().to_str().unwrap());
    unsafe {
        std::env::remove_var("CR__DISPATCHER__MAX_CONCURRENCY");
    }

    assert_eq!(config.unwrap().dispatcher.max_concurrency, 7);
}
