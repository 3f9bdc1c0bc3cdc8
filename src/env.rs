//! 环境变量覆盖
//!
//! 每个变量是一个实现 [`EnvVar`] 的零大小类型，负责自己的名称、默认值和校验。
//! 显式设置的变量优先于配置文件。

use std::env;

use thiserror::Error;

/// 变量存在但取值不合法
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("环境变量 {variable}: {message}")]
pub struct EnvError {
    pub variable: &'static str,
    pub message: String,
}

impl EnvError {
    fn new(variable: &'static str, message: impl Into<String>) -> Self {
        Self {
            variable,
            message: message.into(),
        }
    }
}

pub type EnvResult<T> = Result<T, EnvError>;

/// 类型化的环境变量
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    /// 读取变量；未设置时取默认值
    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => Self::DEFAULT.ok_or_else(|| EnvError::new(Self::NAME, "未设置且没有默认值")),
        }
    }

    /// 仅在变量被显式设置时返回值
    fn get_override() -> Option<EnvResult<T>> {
        env::var(Self::NAME).ok().map(|value| Self::parse(&value))
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别，未设置时为 info
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "LLMPROXY_LOG_LEVEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn get() -> EnvResult<String> {
            Self::get_override().unwrap_or_else(|| Ok("info".to_string()))
        }

        fn parse(value: &str) -> EnvResult<String> {
            let level = value.trim().to_lowercase();
            match level.as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(level),
                _ => Err(EnvError::new(Self::NAME, format!("unknown level '{}'", value))),
            }
        }
    }

    /// 禁用颜色输出
    pub struct NoColor;
    impl EnvVar<bool> for NoColor {
        const NAME: &'static str = "NO_COLOR";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Disable colored output when set to any value";

        fn parse(value: &str) -> EnvResult<bool> {
            Ok(!value.is_empty())
        }
    }
}

/// 上游 API 相关环境变量
pub mod upstream {
    use super::*;

    /// API 地址
    pub struct ApiAddress;
    impl EnvVar<String> for ApiAddress {
        const NAME: &'static str = "LLMPROXY_API_ADDRESS";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Chat completion base URL (without /chat/completions)";

        fn parse(value: &str) -> EnvResult<String> {
            let url = value.trim().trim_end_matches('/');
            if url.starts_with("http://") || url.starts_with("https://") {
                Ok(url.to_string())
            } else {
                Err(EnvError::new(Self::NAME, "API address must start with http:// or https://"))
            }
        }
    }

    /// API 密钥（逗号分隔）
    pub struct ApiKey;
    impl EnvVar<String> for ApiKey {
        const NAME: &'static str = "LLMPROXY_API_KEY";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Comma-separated API keys rotated round-robin";

        fn parse(value: &str) -> EnvResult<String> {
            Ok(value.trim().to_string())
        }
    }

    /// 模型名称
    pub struct Model;
    impl EnvVar<String> for Model {
        const NAME: &'static str = "LLMPROXY_MODEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Model identifier sent upstream";

        fn parse(value: &str) -> EnvResult<String> {
            let model = value.trim();
            if model.is_empty() {
                return Err(EnvError::new(Self::NAME, "Model name cannot be empty"));
            }
            Ok(model.to_string())
        }
    }

    /// 采样温度
    pub struct Temperature;
    impl EnvVar<f64> for Temperature {
        const NAME: &'static str = "LLMPROXY_TEMPERATURE";
        const DEFAULT: Option<f64> = Some(1.0);
        const DESCRIPTION: &'static str = "Sampling temperature (0.0 - 2.0)";

        fn parse(value: &str) -> EnvResult<f64> {
            let temperature: f64 = value.trim().parse().map_err(|_| EnvError::new(Self::NAME, "Must be a valid number"))?;

            if !(0.0..=2.0).contains(&temperature) {
                return Err(EnvError::new(Self::NAME, format!("Temperature {} outside 0.0 - 2.0", temperature)));
            }

            Ok(temperature)
        }
    }

    /// 上下文轮数
    pub struct ContextNum;
    impl EnvVar<usize> for ContextNum {
        const NAME: &'static str = "LLMPROXY_CONTEXT_NUM";
        const DEFAULT: Option<usize> = Some(5);
        const DESCRIPTION: &'static str = "Conversation turns remembered per client";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_bounded(value, Self::NAME, 0, 100)
        }
    }
}

/// 本地服务器相关环境变量
pub mod server {
    use super::*;

    /// 监听端口
    pub struct Port;
    impl EnvVar<u16> for Port {
        const NAME: &'static str = "LLMPROXY_PORT";
        const DEFAULT: Option<u16> = Some(6800);
        const DESCRIPTION: &'static str = "Local listening port";

        fn parse(value: &str) -> EnvResult<u16> {
            let port: u16 = value.trim().parse().map_err(|_| EnvError::new(Self::NAME, "Must be a valid port number"))?;

            if port == 0 {
                return Err(EnvError::new(Self::NAME, "Port cannot be 0"));
            }

            Ok(port)
        }
    }

    /// 工作线程数
    pub struct MaxThreads;
    impl EnvVar<usize> for MaxThreads {
        const NAME: &'static str = "LLMPROXY_MAX_THREADS";
        const DEFAULT: Option<usize> = Some(8);
        const DESCRIPTION: &'static str = "Worker threads serving translation requests";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_bounded(value, Self::NAME, 1, 256)
        }
    }
}

/// 解析落在 `[min, max]` 内的整数
fn parse_bounded(value: &str, var_name: &'static str, min: usize, max: usize) -> EnvResult<usize> {
    let num: usize = value.trim().parse().map_err(|_| EnvError::new(var_name, "Must be a non-negative integer"))?;

    if num < min {
        return Err(EnvError::new(var_name, format!("Value {} is below minimum {}", num, min)));
    }

    if num > max {
        return Err(EnvError::new(var_name, format!("Value {} exceeds maximum {}", num, max)));
    }

    Ok(num)
}

/// `env-vars` 子命令输出的变量清单
pub fn generate_env_docs() -> String {
    let mut docs = String::from("# Environment Variables\n\n");

    let entries: [(&str, &str); 9] = [
        (core::LogLevel::NAME, core::LogLevel::DESCRIPTION),
        (core::NoColor::NAME, core::NoColor::DESCRIPTION),
        (upstream::ApiAddress::NAME, upstream::ApiAddress::DESCRIPTION),
        (upstream::ApiKey::NAME, upstream::ApiKey::DESCRIPTION),
        (upstream::Model::NAME, upstream::Model::DESCRIPTION),
        (upstream::Temperature::NAME, upstream::Temperature::DESCRIPTION),
        (upstream::ContextNum::NAME, upstream::ContextNum::DESCRIPTION),
        (server::Port::NAME, server::Port::DESCRIPTION),
        (server::MaxThreads::NAME, server::MaxThreads::DESCRIPTION),
    ];
    for (name, description) in entries {
        docs.push_str(&format!("- `{}`: {}\n", name, description));
    }

    docs
}
