//! # LLM Translate Proxy
//!
//! 本地 HTTP 翻译代理：接收游戏文本钩子的翻译请求，转发到 OpenAI 风格的
//! chat completions 接口，返回译文并原样保留模板变量、标签和转义序列。
//!
//! ## 模块组织
//!
//! - `translation` - 翻译请求管道（冻结/解冻、会话、密钥轮换、重试）
//! - `web` - 本地监听端与服务器生命周期
//! - `env` - 环境变量覆盖

pub mod env;
pub mod translation;
pub mod web;

pub use translation::{ProxyConfig, TranslationEngine, TranslationError, TranslationResult};
pub use web::ProxyServer;
