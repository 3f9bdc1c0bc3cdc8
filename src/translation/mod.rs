//! 翻译模块
//!
//! 提供完整的翻译请求管道，采用清晰的模块化架构：
//! - **core**: 重试控制器、LLM 客户端与停止信号
//! - **pipeline**: 冻结/解冻、提示词组装、响应解析
//! - **storage**: 密钥池与会话记忆
//! - **collaborators**: 术语表与文本规则引擎接口及默认实现
//! - **events**: 面向界面的事件流
//! - **config**: 配置管理
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use llm_translate_proxy::translation::{
//!     collaborators::{NoGlossary, NoRules},
//!     ProxyConfig, TranslationEngine, EventBus, StopSignal,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = TranslationEngine::new(
//!     ProxyConfig::default(),
//!     Arc::new(NoGlossary),
//!     Arc::new(NoRules),
//!     EventBus::new(),
//!     StopSignal::new(),
//! )?;
//! let translated = engine.translate("Hello\n{{name}}", "127.0.0.1").await.into_text();
//! # Ok(())
//! # }
//! ```

/// 外部协作者 - 术语表与文本规则引擎
pub mod collaborators;

/// 配置管理模块 - 配置快照、文件读写与环境变量覆盖
pub mod config;

/// 核心模块 - 重试控制器与上游调用
pub mod core;

/// 错误处理模块 - 统一的错误类型
pub mod error;

/// 事件流 - 日志行、Token 用量与工作状态
pub mod events;

/// 文本处理管道模块
pub mod pipeline;

/// 存储管理模块 - 密钥池与会话记忆
pub mod storage;

pub use config::{constants, ConfigManager, Language, ProxyConfig};
pub use self::core::{LlmClient, RetryOutcome, RetryPolicy, RetryState, StopSignal, TranslationEngine};
pub use error::{ErrorCategory, TranslationError, TranslationResult};
pub use events::{EventBus, Message, ServerEvent};
pub use pipeline::{freeze, thaw, EscapeMap};
