//! 上游响应解析与术语收集

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use super::escape::{self, EscapeMap};
use crate::translation::collaborators::{GlossaryProvider, TextRuleEngine};
use crate::translation::error::{TranslationError, TranslationResult};

static THINK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("think pattern is a valid regex"));

static TERM_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<tm>\s*(.*?)\s*=\s*(.*?)\s*</tm>").expect("term pattern is a valid regex")
});

static TRANSLATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<tl>(.*?)</tl>").expect("translation pattern is a valid regex"));

static LEFTOVER_TL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?tl>").expect("leftover tag pattern is a valid regex"));

/// 形如 `ZMCZ` 的术语代码
static TERM_CODE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Z[A-Z]{2}Z").expect("term code pattern is a valid regex"));

/// 上游报告的 Token 用量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// 从响应体中取出的内容
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletion {
    pub content: String,
    pub usage: Usage,
}

impl ChatCompletion {
    /// 解析 chat completions 响应体
    ///
    /// 无法解析的响应体返回 [`TranslationError::ParseError`]，
    /// 缺少 `choices[0].message.content` 返回 [`TranslationError::FormatError`]。
    pub fn from_body(body: &str) -> TranslationResult<Self> {
        let value: Value = serde_json::from_str(body)?;

        let usage = value
            .get("usage")
            .map(|usage| Usage {
                prompt_tokens: usage.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0),
                completion_tokens: usage.get("completion_tokens").and_then(Value::as_u64).unwrap_or(0),
            })
            .unwrap_or_default();

        let first_choice = value
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .ok_or_else(|| TranslationError::FormatError("响应缺少 choices 字段".to_string()))?;

        let content = first_choice
            .pointer("/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| TranslationError::FormatError("choices[0] 缺少 message.content".to_string()))?;

        Ok(Self {
            content: content.to_string(),
            usage,
        })
    }
}

/// 收集到的新术语
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestedTerm {
    pub source: String,
    pub target: String,
}

/// 解析结果
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub text: String,
    pub terms: Vec<HarvestedTerm>,
}

/// 去掉推理模型的 `<think>` 块
pub fn strip_think(content: &str) -> String {
    THINK_PATTERN.replace_all(content, "").into_owned()
}

/// 术语对是否可以入库：两侧非空，且都不含占位符或术语代码
pub fn is_acceptable_term(source: &str, target: &str) -> bool {
    if source.is_empty() || target.is_empty() {
        return false;
    }
    if escape::contains_placeholder(source) || escape::contains_placeholder(target) {
        return false;
    }
    !(TERM_CODE_PATTERN.is_match(source) || TERM_CODE_PATTERN.is_match(target))
}

/// 收集 `<tm>源=译</tm>` 术语对
///
/// 源词出现在 `candidate` 中（不区分大小写）的术语对替换为译文并返回，
/// 其余 `<tm>` 片段直接删除。
pub fn harvest_terms(content: &str, candidate: &str) -> (String, Vec<HarvestedTerm>) {
    let candidate_lower = candidate.to_lowercase();
    let mut terms = Vec::new();

    let cleaned = TERM_PATTERN
        .replace_all(content, |caps: &Captures| {
            let source = caps[1].trim();
            let target = caps[2].trim();

            if is_acceptable_term(source, target) && candidate_lower.contains(&source.to_lowercase()) {
                terms.push(HarvestedTerm {
                    source: source.to_string(),
                    target: target.to_string(),
                });
                target.to_string()
            } else {
                String::new()
            }
        })
        .into_owned();

    (cleaned, terms)
}

/// 取第一个 `<tl>` 块的内容，没有时取全文；清掉残留的 `<tl>` 标记
pub fn extract_translation(content: &str) -> String {
    let body = match TRANSLATION_PATTERN.captures(content) {
        Some(caps) => caps[1].trim().to_string(),
        None => content.trim().to_string(),
    };
    LEFTOVER_TL_PATTERN.replace_all(&body, "").into_owned()
}

/// 响应解析器
pub struct ResponseParser<'a> {
    glossary: &'a dyn GlossaryProvider,
    rules: &'a dyn TextRuleEngine,
    enable_glossary: bool,
}

impl<'a> ResponseParser<'a> {
    pub fn new(glossary: &'a dyn GlossaryProvider, rules: &'a dyn TextRuleEngine, enable_glossary: bool) -> Self {
        Self {
            glossary,
            rules,
            enable_glossary,
        }
    }

    /// 把模型输出还原为最终译文
    ///
    /// `candidate` 是冻结后再解冻的请求文本，只有出现在其中的术语才会交给术语表。
    pub fn parse(&self, content: &str, extract_terms: bool, candidate: &str, map: &EscapeMap) -> ParsedResponse {
        let mut cleaned = strip_think(content);

        let mut terms = Vec::new();
        if extract_terms {
            let (harvested_content, harvested) = harvest_terms(&cleaned, candidate);
            for term in &harvested {
                self.glossary.add_new_term(&term.source, &term.target);
            }
            cleaned = harvested_content;
            terms = harvested;
        }

        let mut text = map.thaw(&extract_translation(&cleaned));
        if self.enable_glossary {
            text = self.rules.process_post(&text);
        }

        ParsedResponse { text, terms }
    }
}
