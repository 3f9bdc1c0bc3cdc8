//! 翻译代理配置管理模块
//!
//! 提供配置快照、文件读写和环境变量覆盖

pub mod manager;

// 重新导出主要类型
pub use manager::{ConfigManager, Language, ProxyConfig};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 默认上游设置
    pub const DEFAULT_API_ADDRESS: &str = "https://api.openai.com/v1";
    pub const DEFAULT_API_KEY: &str = "sk-xxxxxxxx";
    pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
    pub const DEFAULT_PRE_PROMPT: &str = "将下面的文本翻译成简体中文：";
    pub const DEFAULT_SYSTEM_PROMPT: &str = "你是一个专业的游戏文本翻译引擎。\
        将用户提供的游戏文本翻译为简体中文，保持语气、人称与标点一致，\
        完整保留所有标签与占位符，只输出译文。";
    pub const DEFAULT_TEMPERATURE: f64 = 1.0;

    // 默认本地服务设置
    pub const DEFAULT_PORT: u16 = 6800;
    pub const DEFAULT_CONTEXT_NUM: usize = 5;
    pub const DEFAULT_MAX_THREADS: usize = 8;
    pub const DEFAULT_LANGUAGE: usize = 1;

    // 网络时限
    pub const TRANSFER_TIMEOUT: Duration = Duration::from_secs(45);
    pub const CALL_TIMEOUT: Duration = Duration::from_secs(40);
    pub const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(100);

    // 重试策略
    pub const MAX_RETRY_ATTEMPTS: usize = 5;
    pub const RETRY_DELAY: Duration = Duration::from_millis(1000);
    pub const RETRY_DELAY_SLICE: Duration = Duration::from_millis(100);

    /// 原文长度超过该值时才要求模型输出 `<tl>`/`<tm>` 结构
    pub const MIN_EXTRACTION_CHARS: usize = 5;

    /// 客户端标识取哈希前缀的长度
    pub const CLIENT_ID_LEN: usize = 8;

    pub const FAILURE_BODY: &str = "Translation Failed";

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "llm-proxy.toml",
        "config.toml",
        "~/.config/llm-translate-proxy/config.toml",
    ];

    pub const ENV_FILES: &[&str] = &[".env.local", ".env"];
}
