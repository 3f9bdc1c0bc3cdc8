//! 文本规则引擎实现

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::TextRuleEngine;
use crate::translation::error::{TranslationError, TranslationResult};

/// 原样返回文本的空实现
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRules;

impl TextRuleEngine for NoRules {
    fn process_pre(&self, text: &str) -> String {
        text.to_string()
    }

    fn process_post(&self, text: &str) -> String {
        text.to_string()
    }
}

/// 规则文件中的单条替换
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleEntry {
    pub pattern: String,
    #[serde(default)]
    pub replacement: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RuleFile {
    #[serde(default)]
    pre: Vec<RuleEntry>,
    #[serde(default)]
    post: Vec<RuleEntry>,
}

/// 按顺序执行的正则替换规则集
#[derive(Debug, Default)]
pub struct RegexRuleSet {
    pre: Vec<(Regex, String)>,
    post: Vec<(Regex, String)>,
}

impl RegexRuleSet {
    pub fn new(pre: Vec<RuleEntry>, post: Vec<RuleEntry>) -> TranslationResult<Self> {
        Ok(Self {
            pre: compile(pre)?,
            post: compile(post)?,
        })
    }

    /// 从 TOML 规则文件加载（`[[pre]]` / `[[post]]` 表）
    pub fn load<P: AsRef<Path>>(path: P) -> TranslationResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let file: RuleFile = toml::from_str(&content)?;

        tracing::info!(
            "已加载规则文件 {} (预处理 {} 条, 后处理 {} 条)",
            path.display(),
            file.pre.len(),
            file.post.len()
        );

        Self::new(file.pre, file.post)
    }

    pub fn rule_count(&self) -> usize {
        self.pre.len() + self.post.len()
    }
}

fn compile(entries: Vec<RuleEntry>) -> TranslationResult<Vec<(Regex, String)>> {
    entries
        .into_iter()
        .map(|entry| {
            Regex::new(&entry.pattern)
                .map(|re| (re, entry.replacement))
                .map_err(|e| TranslationError::ConfigError(format!("无效的规则 '{}': {}", entry.pattern, e)))
        })
        .collect()
}

fn apply(rules: &[(Regex, String)], text: &str) -> String {
    rules.iter().fold(text.to_string(), |acc, (re, replacement)| {
        re.replace_all(&acc, replacement.as_str()).into_owned()
    })
}

impl TextRuleEngine for RegexRuleSet {
    fn process_pre(&self, text: &str) -> String {
        apply(&self.pre, text)
    }

    fn process_post(&self, text: &str) -> String {
        apply(&self.post, text)
    }
}
