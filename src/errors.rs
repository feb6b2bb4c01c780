use std::fmt;

#[derive(Debug, Clone)]
pub enum ClickRelayError {
    /// 计数器 / 表格 / CRM 的网络或超时错误
    TransientBackend(String),
    /// 必需的目标配置缺失
    Configuration(String),
    NotFound(String),
    MalformedInput(String),
    Serialization(String),
    FileOperation(String),
}

impl ClickRelayError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            ClickRelayError::TransientBackend(_) => "E001",
            ClickRelayError::Configuration(_) => "E002",
            ClickRelayError::NotFound(_) => "E003",
            ClickRelayError::MalformedInput(_) => "E004",
            ClickRelayError::Serialization(_) => "E005",
            ClickRelayError::FileOperation(_) => "E006",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            ClickRelayError::TransientBackend(_) => "Transient Backend Error",
            ClickRelayError::Configuration(_) => "Configuration Error",
            ClickRelayError::NotFound(_) => "Resource Not Found",
            ClickRelayError::MalformedInput(_) => "Malformed Input",
            ClickRelayError::Serialization(_) => "Serialization Error",
            ClickRelayError::FileOperation(_) => "File Operation Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            ClickRelayError::TransientBackend(msg) => msg,
            ClickRelayError::Configuration(msg) => msg,
            ClickRelayError::NotFound(msg) => msg,
            ClickRelayError::MalformedInput(msg) => msg,
            ClickRelayError::Serialization(msg) => msg,
            ClickRelayError::FileOperation(msg) => msg,
        }
    }

    /// Transient errors are degraded or retried, never surfaced to the
    /// event-ingestion caller.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClickRelayError::TransientBackend(_))
    }

    /// 格式化为彩色输出（启动失败时打印到终端）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for ClickRelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for ClickRelayError {}

// 便捷的构造函数
impl ClickRelayError {
    pub fn transient_backend<T: Into<String>>(msg: T) -> Self {
        ClickRelayError::TransientBackend(msg.into())
    }

    pub fn configuration<T: Into<String>>(msg: T) -> Self {
        ClickRelayError::Configuration(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        ClickRelayError::NotFound(msg.into())
    }

    pub fn malformed_input<T: Into<String>>(msg: T) -> Self {
        ClickRelayError::MalformedInput(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        ClickRelayError::Serialization(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        ClickRelayError::FileOperation(msg.into())
    }
}

impl From<redis::RedisError> for ClickRelayError {
    fn from(err: redis::RedisError) -> Self {
        ClickRelayError::TransientBackend(err.to_string())
    }
}

impl From<ureq::Error> for ClickRelayError {
    fn from(err: ureq::Error) -> Self {
        ClickRelayError::TransientBackend(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for ClickRelayError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        ClickRelayError::TransientBackend(format!("timed out: {}", err))
    }
}

impl From<std::io::Error> for ClickRelayError {
    fn from(err: std::io::Error) -> Self {
        ClickRelayError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for ClickRelayError {
    fn from(err: serde_json::Error) -> Self {
        ClickRelayError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for ClickRelayError {
    fn from(err: config::ConfigError) -> Self {
        ClickRelayError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClickRelayError>;
