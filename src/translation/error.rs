//! 翻译代理统一错误处理
//!
//! 所有失败最终都汇入重试控制器的"无效结果 → 重试或放弃"路径，
//! 只有 [`TranslationError::Cancelled`] 会绕过重试直接返回。

use thiserror::Error;

/// 翻译错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    /// 未配置任何 API 密钥
    #[error("没有可用的 API 密钥")]
    NoCredentials,

    /// 网络错误（DNS、连接、TLS、HTTP 状态码）
    #[error("网络错误: {0}")]
    NetworkError(String),

    /// 超时错误
    #[error("请求超时: {0}")]
    TimeoutError(String),

    /// 上游响应缺少 `choices` 字段
    #[error("响应格式无效: {0}")]
    FormatError(String),

    /// 上游响应无法解析为 JSON
    #[error("JSON 解析失败: {0}")]
    ParseError(String),

    /// 结果为空或看起来像错误信息
    #[error("翻译结果无效: {0}")]
    InvalidResult(String),

    /// 服务器被要求停止
    #[error("翻译已终止")]
    Cancelled,

    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 文件读写错误
    #[error("IO错误: {0}")]
    IoError(String),

    /// 监听器错误
    #[error("服务器错误: {0}")]
    ServerError(String),
}

impl TranslationError {
    /// 是否走"无效结果 → 重试或放弃"路径；只有停止请求会跳过重试
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TranslationError::Cancelled)
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslationError::NoCredentials => ErrorCategory::Credential,
            TranslationError::NetworkError(_) => ErrorCategory::Transport,
            TranslationError::TimeoutError(_) => ErrorCategory::Timeout,
            TranslationError::FormatError(_) => ErrorCategory::Upstream,
            TranslationError::ParseError(_) => ErrorCategory::Upstream,
            TranslationError::InvalidResult(_) => ErrorCategory::Validation,
            TranslationError::Cancelled => ErrorCategory::Cancellation,
            TranslationError::ConfigError(_) => ErrorCategory::Configuration,
            TranslationError::IoError(_) => ErrorCategory::Internal,
            TranslationError::ServerError(_) => ErrorCategory::Internal,
        }
    }
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Credential,
    Transport,
    Timeout,
    Upstream,
    Validation,
    Cancellation,
    Configuration,
    Internal,
}

impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::IoError(error.to_string())
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::ParseError(error.to_string())
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::ConfigError(format!("TOML解析错误: {}", error))
    }
}

impl From<toml::ser::Error> for TranslationError {
    fn from(error: toml::ser::Error) -> Self {
        TranslationError::ConfigError(format!("TOML序列化错误: {}", error))
    }
}

impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TranslationError::TimeoutError(error.to_string())
        } else {
            TranslationError::NetworkError(error.to_string())
        }
    }
}

impl From<tokio::time::error::Elapsed> for TranslationError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        TranslationError::TimeoutError(error.to_string())
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;
