//! 翻译系统核心模块
//!
//! - **客户端** (`client.rs`): 上游 chat completions 调用，带超时与取消
//! - **引擎** (`engine.rs`): 重试控制器与单次尝试流程
//! - **信号** (`signal.rs`): 进程级停止标志
//!
//! ## 模块依赖关系
//!
//! ```text
//! TranslationEngine (engine.rs)
//!     ├── CredentialRotator / SessionStore (storage)
//!     ├── PromptComposer / ResponseParser / EscapeMap (pipeline)
//!     ├── GlossaryProvider / TextRuleEngine (collaborators)
//!     └── LlmClient (client.rs)
//!             └── StopSignal (signal.rs)
//! ```

pub mod client;
pub mod engine;
pub mod signal;

pub use client::{ChatRequest, KeyProbe, LlmClient};
pub use engine::{is_valid_result, EngineStats, RetryOutcome, RetryPolicy, RetryState, TranslationEngine};
pub use signal::StopSignal;
