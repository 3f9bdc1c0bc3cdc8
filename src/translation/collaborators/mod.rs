//! 外部协作者接口
//!
//! 术语表与文本规则引擎由调用方在构造引擎时注入，核心流程只通过
//! 这里的 trait 访问它们，不依赖任何全局单例。

pub mod glossary;
pub mod rules;

pub use glossary::{JsonGlossary, NoGlossary};
pub use rules::{NoRules, RegexRuleSet, RuleEntry};

/// 术语表提供者
pub trait GlossaryProvider: Send + Sync {
    /// 为给定文本生成追加到系统提示词的术语提示，没有命中时返回空串
    fn get_context_prompt(&self, text: &str) -> String;

    /// 记录模型报告的新术语
    fn add_new_term(&self, source: &str, target: &str);

    /// 切换术语表文件
    fn set_file_path(&self, path: &str);
}

/// 文本规则引擎（确定性的预处理与后处理替换）
pub trait TextRuleEngine: Send + Sync {
    fn process_pre(&self, text: &str) -> String;

    fn process_post(&self, text: &str) -> String;
}
