//! 翻译模块统一错误处理
//!
//! 提供结构化错误类型和错误处理机制

use std::fmt;

use thiserror::Error;

/// 翻译错误类型
///
/// `Display` 文本会直接显示在错误浮层里，所以保持简短的英文。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    /// 配置错误，例如选择了 DeepL 却没有 API key
    #[error("{0}")]
    ConfigError(String),

    /// 网络错误
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 超时错误
    #[error("Request timeout: {0}")]
    TimeoutError(String),

    /// 速率限制错误
    #[error("Rate limited (429) - too many requests")]
    RateLimitExceeded,

    /// 非成功的 HTTP 状态码
    #[error("HTTP {status} - {message}")]
    HttpStatus { status: u16, message: String },

    /// 响应体无法解析或缺少译文
    #[error("Malformed response: {0}")]
    ParseError(String),

    /// 整条端点链都失败了
    #[error("All translation services failed: {0}")]
    Exhausted(String),

    /// 设置存储读写错误
    #[error("Settings store error: {0}")]
    StoreError(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl TranslationError {
    /// 检查错误是否可重试（换下一个端点）
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::NetworkError(_) => true,
            TranslationError::TimeoutError(_) => true,
            TranslationError::RateLimitExceeded => true,
            TranslationError::HttpStatus { .. } => true,
            TranslationError::ParseError(_) => true,
            TranslationError::ConfigError(_) => false,
            TranslationError::Exhausted(_) => false,
            TranslationError::StoreError(_) => false,
            TranslationError::InternalError(_) => false,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::ConfigError(_) => ErrorSeverity::Critical,
            TranslationError::NetworkError(_) => ErrorSeverity::Warning,
            TranslationError::TimeoutError(_) => ErrorSeverity::Warning,
            TranslationError::RateLimitExceeded => ErrorSeverity::Warning,
            TranslationError::HttpStatus { .. } => ErrorSeverity::Warning,
            TranslationError::ParseError(_) => ErrorSeverity::Warning,
            TranslationError::Exhausted(_) => ErrorSeverity::Error,
            TranslationError::StoreError(_) => ErrorSeverity::Error,
            TranslationError::InternalError(_) => ErrorSeverity::Critical,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslationError::ConfigError(_) => ErrorCategory::Configuration,
            TranslationError::NetworkError(_) => ErrorCategory::Network,
            TranslationError::TimeoutError(_) => ErrorCategory::Timeout,
            TranslationError::RateLimitExceeded => ErrorCategory::RateLimit,
            TranslationError::HttpStatus { .. } => ErrorCategory::Service,
            TranslationError::ParseError(_) => ErrorCategory::Parsing,
            TranslationError::Exhausted(_) => ErrorCategory::Service,
            TranslationError::StoreError(_) => ErrorCategory::Storage,
            TranslationError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(self, context: T) -> Self {
        match self {
            TranslationError::ConfigError(msg) => {
                TranslationError::ConfigError(format!("{} ({})", msg, context))
            }
            TranslationError::NetworkError(msg) => {
                TranslationError::NetworkError(format!("{} ({})", msg, context))
            }
            TranslationError::TimeoutError(msg) => {
                TranslationError::TimeoutError(format!("{} ({})", msg, context))
            }
            TranslationError::ParseError(msg) => {
                TranslationError::ParseError(format!("{} ({})", msg, context))
            }
            TranslationError::Exhausted(msg) => {
                TranslationError::Exhausted(format!("{} ({})", msg, context))
            }
            TranslationError::StoreError(msg) => {
                TranslationError::StoreError(format!("{} ({})", msg, context))
            }
            TranslationError::InternalError(msg) => {
                TranslationError::InternalError(format!("{} ({})", msg, context))
            }
            TranslationError::HttpStatus { status, message } => TranslationError::HttpStatus {
                status,
                message: format!("{} ({})", message, context),
            },
            TranslationError::RateLimitExceeded => TranslationError::RateLimitExceeded,
        }
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Network,
    RateLimit,
    Service,
    Timeout,
    Parsing,
    Storage,
    Internal,
}

/// 标准错误转换
impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::StoreError(format!("IO error: {}", error))
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::ParseError(error.to_string())
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::ConfigError(format!("Invalid TOML config: {}", error))
    }
}

impl From<url::ParseError> for TranslationError {
    fn from(error: url::ParseError) -> Self {
        TranslationError::ConfigError(format!("Invalid endpoint URL: {}", error))
    }
}

impl From<tokio::time::error::Elapsed> for TranslationError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        TranslationError::TimeoutError(error.to_string())
    }
}

impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TranslationError::TimeoutError(error.to_string())
        } else if error.is_decode() {
            TranslationError::ParseError(error.to_string())
        } else if let Some(status) = error.status() {
            TranslationError::HttpStatus {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("error").to_string(),
            }
        } else {
            TranslationError::NetworkError(error.to_string())
        }
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录错误
    pub fn log_error(error: &TranslationError) {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!("翻译信息: {}", error),
            ErrorSeverity::Warning => tracing::warn!("翻译警告: {}", error),
            ErrorSeverity::Error => tracing::error!("翻译错误: {}", error),
            ErrorSeverity::Critical => tracing::error!("翻译严重错误: {}", error),
        }
    }

    /// 创建配置错误
    pub fn config_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::ConfigError(msg.to_string())
    }

    /// 创建存储错误
    pub fn store_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::StoreError(msg.to_string())
    }
}
