//! 提示词组装
//!
//! 系统消息 = 配置的系统提示词 + 固定翻译规则 + 可选的术语提示与术语提取说明，
//! 随后是会话历史（最旧在前），最后是 `pre_prompt + 冻结文本`。

use serde::{Deserialize, Serialize};

use crate::translation::collaborators::GlossaryProvider;
use crate::translation::config::{constants, ProxyConfig};
use crate::translation::storage::Turn;

/// 要求模型原样保留占位符与术语代码的规则块
pub const TRANSLATION_RULES: &str = "\n\n【Translation Rules】:\n\
1. 🛑 PRESERVE TAGS: You will see tags like '[T_0]', '[T_1]'.\n   \
- These replace newlines or code. Keep them EXACTLY as is.\n   \
- Input: \"Hello [T_0] World\"\n   \
- Output: \"你好 [T_0] 世界\"\n\
2. 🛑 NO CLEANUP: Do NOT remove the tags.\n\
3. 🔰 TERM CODES: Keep 'Z[A-Z]{2}Z' (e.g., 'ZMCZ') codes exactly as is.\n\
4. Translate the text BETWEEN the tags naturally.\n\
5. Output ONLY the translated result.\n";

/// 要求模型用 `<tl>` 包裹译文并以 `<tm>` 报告新术语
pub const TERM_EXTRACTION: &str = "\n【Term Extraction】:\n\
1. Wrap translation in <tl>...</tl>.\n\
2. If you find Proper Nouns (Names) NOT in glossary, output <tm>Src=Trgt</tm>.\n";

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// 一条聊天消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// 组装结果
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedPrompt {
    pub messages: Vec<ChatMessage>,
    /// 是否要求了 `<tl>`/`<tm>` 结构
    pub extract_terms: bool,
    /// 当前用户消息，成功后写入会话
    pub user_content: String,
}

/// 本次请求的文本三种形态
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    /// 未经任何处理的原文
    pub raw: &'a str,
    /// 冻结（及预处理）后发往模型的文本
    pub frozen: &'a str,
    /// 冻结文本解冻后的候选文本，用于术语查询
    pub candidate: &'a str,
}

/// 提示词组装器
pub struct PromptComposer<'a> {
    config: &'a ProxyConfig,
    glossary: &'a dyn GlossaryProvider,
}

impl<'a> PromptComposer<'a> {
    pub fn new(config: &'a ProxyConfig, glossary: &'a dyn GlossaryProvider) -> Self {
        Self { config, glossary }
    }

    /// 组装系统提示词，返回提示词以及是否要求术语提取
    pub fn system_prompt(&self, input: &PromptInput<'_>) -> (String, bool) {
        let mut prompt = String::with_capacity(self.config.system_prompt.len() + TRANSLATION_RULES.len());
        prompt.push_str(&self.config.system_prompt);
        prompt.push_str(TRANSLATION_RULES);

        let mut extract_terms = false;
        if self.config.enable_glossary {
            let hint = self.glossary.get_context_prompt(input.candidate);
            if !hint.is_empty() {
                prompt.push('\n');
                prompt.push_str(&hint);
            }

            // 过短的文本只会提取出占位符
            if input.raw.chars().count() > constants::MIN_EXTRACTION_CHARS {
                extract_terms = true;
                prompt.push_str(TERM_EXTRACTION);
            }
        }

        (prompt, extract_terms)
    }

    /// 组装完整的消息序列
    pub fn compose(&self, input: PromptInput<'_>, history: &[Turn]) -> ComposedPrompt {
        let (system, extract_terms) = self.system_prompt(&input);
        let user_content = format!("{}{}", self.config.pre_prompt, input.frozen);

        let mut messages = Vec::with_capacity(history.len() * 2 + 2);
        messages.push(ChatMessage::system(system));
        for turn in history {
            messages.push(ChatMessage::user(turn.request.clone()));
            messages.push(ChatMessage::assistant(turn.response.clone()));
        }
        messages.push(ChatMessage::user(user_content.clone()));

        tracing::debug!(
            "提示词已组装: {} 条消息, 历史 {} 轮, 术语提取 {}",
            messages.len(),
            history.len(),
            extract_terms
        );

        ComposedPrompt {
            messages,
            extract_terms,
            user_content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::collaborators::NoGlossary;
    use std::sync::Mutex;

    /// 记录查询文本并返回固定提示的术语表
    struct FixedGlossary {
        hint: &'static str,
        queried: Mutex<Vec<String>>,
    }

    impl GlossaryProvider for FixedGlossary {
        fn get_context_prompt(&self, text: &str) -> String {
            self.queried.lock().unwrap().push(text.to_string());
            self.hint.to_string()
        }

        fn add_new_term(&self, _source: &str, _target: &str) {}

        fn set_file_path(&self, _path: &str) {}
    }

    fn input<'a>(raw: &'a str, frozen: &'a str) -> PromptInput<'a> {
        PromptInput {
            raw,
            frozen,
            candidate: raw,
        }
    }

    #[test]
    fn test_message_order_with_history() {
        let config = ProxyConfig {
            system_prompt: "SYS".to_string(),
            pre_prompt: "PRE:".to_string(),
            ..ProxyConfig::default()
        };
        let history = vec![
            Turn {
                request: "PRE:q1".to_string(),
                response: "a1".to_string(),
            },
            Turn {
                request: "PRE:q2".to_string(),
                response: "a2".to_string(),
            },
        ];

        let composed = PromptComposer::new(&config, &NoGlossary).compose(input("Hi", "Hi"), &history);

        let roles: Vec<Role> = composed.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User, Role::Assistant, Role::User]
        );
        assert!(composed.messages[0].content.starts_with("SYS"));
        assert!(composed.messages[0].content.contains("PRESERVE TAGS"));
        assert!(composed.messages[0].content.contains("ZMCZ"));
        assert_eq!(composed.messages[1].content, "PRE:q1");
        assert_eq!(composed.messages[4].content, "a2");
        assert_eq!(composed.user_content, "PRE:Hi");
        assert_eq!(composed.messages[5].content, "PRE:Hi");
        assert!(!composed.extract_terms);
    }

    #[test]
    fn test_glossary_disabled_skips_provider() {
        let glossary = FixedGlossary {
            hint: "【Glossary】:\nworld = 世界\n",
            queried: Mutex::new(Vec::new()),
        };
        let config = ProxyConfig::default();

        let composed = PromptComposer::new(&config, &glossary).compose(input("Hello world", "Hello world"), &[]);

        assert!(glossary.queried.lock().unwrap().is_empty());
        assert!(!composed.messages[0].content.contains("【Glossary】"));
        assert!(!composed.messages[0].content.contains("<tl>"));
    }

    #[test]
    fn test_glossary_hint_uses_candidate_text() {
        let glossary = FixedGlossary {
            hint: "【Glossary】:\nname = 名字\n",
            queried: Mutex::new(Vec::new()),
        };
        let config = ProxyConfig {
            enable_glossary: true,
            ..ProxyConfig::default()
        };
        let prompt_input = PromptInput {
            raw: "Hi\n{{name}}",
            frozen: "Hi [T_0]  [T_1] ",
            candidate: "Hi\n{{name}}",
        };

        let composed = PromptComposer::new(&config, &glossary).compose(prompt_input, &[]);

        assert_eq!(*glossary.queried.lock().unwrap(), vec!["Hi\n{{name}}".to_string()]);
        assert!(composed.messages[0].content.contains("\n【Glossary】:\nname = 名字"));
        assert!(composed.extract_terms);
        assert!(composed.messages[0].content.contains("<tm>Src=Trgt</tm>"));
    }

    #[test]
    fn test_short_text_skips_extraction() {
        let config = ProxyConfig {
            enable_glossary: true,
            ..ProxyConfig::default()
        };
        let composer = PromptComposer::new(&config, &NoGlossary);

        let (prompt, extract) = composer.system_prompt(&input("Hello", "Hello"));
        assert!(!extract);
        assert!(!prompt.contains("Term Extraction"));

        // 按字符计数，不按字节
        let (_, extract) = composer.system_prompt(&input("你好世界啊", "你好世界啊"));
        assert!(!extract);

        let (_, extract) = composer.system_prompt(&input("Hello!", "Hello!"));
        assert!(extract);
    }

    #[test]
    fn test_messages_serialize_openai_style() {
        let value = serde_json::to_value(ChatMessage::assistant("ok")).unwrap();
        assert_eq!(value, serde_json::json!({"role": "assistant", "content": "ok"}));
    }
}
