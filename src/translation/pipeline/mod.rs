//! 翻译管道模块
//!
//! 单次尝试中与网络无关的文本处理：冻结/解冻、提示词组装、响应解析

pub mod escape;
pub mod prompt;
pub mod response;

// 重新导出主要类型
pub use escape::{freeze, thaw, EscapeMap};
pub use prompt::{ChatMessage, ComposedPrompt, PromptComposer, PromptInput, Role};
pub use response::{ChatCompletion, HarvestedTerm, ParsedResponse, ResponseParser, Usage};
