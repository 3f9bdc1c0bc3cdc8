//! 翻译引擎核心实现
//!
//! 引擎持有一个请求生命周期之外的全部共享状态（配置快照、密钥池、
//! 会话存储、注入的协作者），并为每个请求运行重试控制器：
//!
//! ## 工作流程
//! 1. 冻结原文（每个请求一次，重试复用同一个映射）
//! 2. 每次尝试开始时复制完整配置快照
//! 3. 轮换取得密钥，组装提示词，调用上游
//! 4. 解析响应、收集术语、解冻
//! 5. 校验结果：成功则写入会话，否则延迟后重试
//!
//! 停止信号在尝试开始前、延迟的每个分片和在途网络调用期间都会被检查。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::translation::collaborators::{GlossaryProvider, TextRuleEngine};
use crate::translation::config::{constants, ProxyConfig};
use crate::translation::core::client::{ChatRequest, LlmClient};
use crate::translation::core::signal::StopSignal;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::events::{single_line, EventBus, Message};
use crate::translation::pipeline::{escape, EscapeMap, PromptComposer, PromptInput, ResponseParser};
use crate::translation::storage::{client_id, CredentialRotator, SessionStore};

/// 重试策略
///
/// 默认 5 次尝试，每次重试前等待 1000ms，等待按 100ms 分片检查停止信号。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 最大尝试次数（含第一次）
    pub max_attempts: usize,
    /// 两次尝试之间的固定延迟
    pub delay: Duration,
    /// 延迟期间检查停止信号的粒度
    pub slice: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: constants::MAX_RETRY_ATTEMPTS,
            delay: constants::RETRY_DELAY,
            slice: constants::RETRY_DELAY_SLICE,
        }
    }
}

/// 重试控制器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Idle,
    Attempting,
    Validating,
    Success,
    Retrying,
    Exhausted,
    Aborted,
}

/// 一个请求的最终结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    Success(String),
    /// 尝试次数用尽
    Exhausted,
    /// 停止信号触发
    Aborted,
}

impl RetryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Success(_))
    }

    /// 成功时返回译文，否则返回空串
    pub fn into_text(self) -> String {
        match self {
            RetryOutcome::Success(text) => text,
            RetryOutcome::Exhausted | RetryOutcome::Aborted => String::new(),
        }
    }
}

/// 结果是否可以交给调用方
///
/// 非空，不以 "error" 开头，不含 "translation failed" / "翻译失败"（均不区分大小写）。
pub fn is_valid_result(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    let lower = text.to_lowercase();
    !(lower.starts_with("error") || lower.contains("translation failed") || lower.contains("翻译失败"))
}

/// 单次成功调用的产物，尚未经过校验
#[derive(Debug, Clone)]
struct AttemptOutput {
    text: String,
    user_content: String,
    context_num: usize,
}

/// 引擎运行统计
///
/// 计数器只增不减，使用 Relaxed 顺序。
#[derive(Debug, Default)]
pub struct EngineStats {
    pub requests: AtomicUsize,
    pub attempts: AtomicUsize,
    pub successes: AtomicUsize,
    pub failures: AtomicUsize,
    pub aborted: AtomicUsize,
    pub harvested_terms: AtomicUsize,
}

impl EngineStats {
    fn inc(counter: &AtomicUsize, by: usize) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::Relaxed)
    }

    /// 单行统计摘要，停止服务时写入日志
    pub fn summary(&self) -> String {
        format!(
            "requests={} attempts={} successes={} failures={} aborted={} terms={}",
            Self::get(&self.requests),
            Self::get(&self.attempts),
            Self::get(&self.successes),
            Self::get(&self.failures),
            Self::get(&self.aborted),
            Self::get(&self.harvested_terms),
        )
    }
}

/// 翻译引擎
pub struct TranslationEngine {
    config: Mutex<ProxyConfig>,
    credentials: CredentialRotator,
    sessions: SessionStore,
    glossary: Arc<dyn GlossaryProvider>,
    rules: Arc<dyn TextRuleEngine>,
    client: LlmClient,
    events: EventBus,
    stop: StopSignal,
    policy: RetryPolicy,
    stats: EngineStats,
}

impl TranslationEngine {
    /// 创建引擎
    ///
    /// 术语表与规则引擎由调用方注入；`stop` 与服务器共享。
    pub fn new(
        config: ProxyConfig,
        glossary: Arc<dyn GlossaryProvider>,
        rules: Arc<dyn TextRuleEngine>,
        events: EventBus,
        stop: StopSignal,
    ) -> TranslationResult<Self> {
        let engine = Self {
            credentials: CredentialRotator::from_config(&config.api_key),
            config: Mutex::new(config),
            sessions: SessionStore::new(),
            glossary,
            rules,
            client: LlmClient::new()?,
            events,
            stop,
            policy: RetryPolicy::default(),
            stats: EngineStats::default(),
        };
        engine.point_glossary(&engine.config_snapshot());
        Ok(engine)
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_client(mut self, client: LlmClient) -> Self {
        self.client = client;
        self
    }

    fn lock_config(&self) -> MutexGuard<'_, ProxyConfig> {
        self.config.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 当前配置的完整副本
    pub fn config_snapshot(&self) -> ProxyConfig {
        self.lock_config().clone()
    }

    /// 热更新配置
    ///
    /// 整体替换快照并重建密钥池（游标归零）；已经开始的尝试不受影响。
    pub fn update_config(&self, mut config: ProxyConfig) {
        self.credentials.reload(&config.api_key);
        self.point_glossary(&config);
        if config.enable_glossary && !config.glossary_path.is_empty() {
            let path = config.glossary_path.clone();
            config.remember_glossary(&path);
        }
        *self.lock_config() = config;
        tracing::debug!("配置已更新，密钥数: {}", self.credentials.len());
    }

    fn point_glossary(&self, config: &ProxyConfig) {
        if config.enable_glossary && !config.glossary_path.is_empty() {
            let path = config.expanded_glossary_path();
            self.glossary.set_file_path(&path.to_string_lossy());
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn credentials(&self) -> &CredentialRotator {
        &self.credentials
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// 清除所有客户端的对话记忆
    pub fn clear_sessions(&self) {
        self.sessions.clear_all();
    }

    /// 翻译一个请求
    ///
    /// `client_addr` 是调用方的网络地址，用于区分会话。
    pub async fn translate(&self, text: &str, client_addr: &str) -> RetryOutcome {
        EngineStats::inc(&self.stats.requests, 1);

        let (frozen, map) = escape::freeze(text);
        let client = client_id(client_addr);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut state = RetryState::Idle;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                transition(&mut state, RetryState::Retrying);
                let language = self.config_snapshot().language();
                self.events.log(Message::retry_attempt(language, attempt + 1, max_attempts));

                if !self.stop.sleep(self.policy.delay, self.policy.slice).await {
                    return self.abort(&mut state);
                }
            }

            if self.stop.is_raised() {
                return self.abort(&mut state);
            }

            transition(&mut state, RetryState::Attempting);
            EngineStats::inc(&self.stats.attempts, 1);

            let output = match self.attempt(text, &frozen, &map, &client).await {
                Ok(output) => output,
                Err(e) if !e.is_retryable() => return self.abort(&mut state),
                Err(e) => {
                    self.report_error(&e);
                    continue;
                }
            };

            // 网络调用返回后再检查一次
            if self.stop.is_raised() {
                return self.abort(&mut state);
            }

            transition(&mut state, RetryState::Validating);
            if is_valid_result(&output.text) {
                self.sessions
                    .append(&client, &output.user_content, &output.text, output.context_num);
                if attempt > 0 {
                    let language = self.config_snapshot().language();
                    self.events.log(Message::RetrySuccess.text(language));
                }
                transition(&mut state, RetryState::Success);
                EngineStats::inc(&self.stats.successes, 1);
                return RetryOutcome::Success(output.text);
            }

            tracing::warn!("翻译结果无效 (尝试 {}/{}): {:?}", attempt + 1, max_attempts, output.text);
        }

        transition(&mut state, RetryState::Exhausted);
        EngineStats::inc(&self.stats.failures, 1);
        metrics::counter!("llmproxy_requests_failed_total").increment(1);
        let language = self.config_snapshot().language();
        self.events.log(Message::RetryFailed.text(language));
        RetryOutcome::Exhausted
    }

    fn abort(&self, state: &mut RetryState) -> RetryOutcome {
        transition(state, RetryState::Aborted);
        EngineStats::inc(&self.stats.aborted, 1);
        let language = self.config_snapshot().language();
        self.events.log(Message::Aborted.text(language));
        RetryOutcome::Aborted
    }

    /// 单次尝试：快照 → 密钥 → 提示词 → 调用 → 解析 → 解冻
    async fn attempt(
        &self,
        text: &str,
        frozen: &str,
        map: &EscapeMap,
        client: &str,
    ) -> TranslationResult<AttemptOutput> {
        let config = self.config_snapshot();

        let key = self.credentials.next().ok_or(TranslationError::NoCredentials)?;

        let processed = if config.enable_glossary {
            self.rules.process_pre(frozen)
        } else {
            frozen.to_string()
        };
        let candidate = map.thaw(&processed);

        let history = self.sessions.history(client, config.context_num);
        let composed = PromptComposer::new(&config, self.glossary.as_ref()).compose(
            PromptInput {
                raw: text,
                frozen: &processed,
                candidate: &candidate,
            },
            &history,
        );

        let request = ChatRequest {
            model: &config.model_name,
            messages: &composed.messages,
            temperature: config.temperature,
        };
        let completion = self
            .client
            .chat(&config.completions_url(), &key, &request, &self.stop)
            .await?;

        let usage = completion.usage;
        self.events.token_usage(usage.prompt_tokens, usage.completion_tokens);
        metrics::counter!("llmproxy_prompt_tokens_total").increment(usage.prompt_tokens);
        metrics::counter!("llmproxy_completion_tokens_total").increment(usage.completion_tokens);

        let parsed = ResponseParser::new(self.glossary.as_ref(), self.rules.as_ref(), config.enable_glossary)
            .parse(&completion.content, composed.extract_terms, &candidate, map);

        let language = config.language();
        for term in &parsed.terms {
            self.events.log(format!(
                "{}{} = {}",
                Message::NewTerm.text(language),
                term.source,
                term.target
            ));
        }
        EngineStats::inc(&self.stats.harvested_terms, parsed.terms.len());

        self.events.log(format!("  -> {}", single_line(&parsed.text)));

        Ok(AttemptOutput {
            text: parsed.text,
            user_content: composed.user_content,
            context_num: config.context_num,
        })
    }

    /// 按错误类别输出日志
    fn report_error(&self, error: &TranslationError) {
        let language = self.config_snapshot().language();
        let line = match error {
            TranslationError::NoCredentials => Message::InvalidApiKey.text(language).to_string(),
            TranslationError::TimeoutError(_) => Message::RequestTimeout.text(language).to_string(),
            TranslationError::FormatError(_) => Message::InvalidFormat.text(language).to_string(),
            TranslationError::ParseError(_) => Message::JsonParseError.text(language).to_string(),
            TranslationError::NetworkError(detail) => {
                format!("{}{}", Message::NetworkError.text(language), detail)
            }
            other => other.to_string(),
        };
        tracing::warn!(category = ?error.category(), "{}", error);
        self.events.log(line);
    }
}

fn transition(state: &mut RetryState, next: RetryState) {
    tracing::trace!("重试状态: {:?} -> {:?}", state, next);
    *state = next;
}
