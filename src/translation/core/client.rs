//! 上游 chat completions 客户端
//!
//! 每次调用有两道时限：reqwest 的传输超时和外层的硬性调用超时；
//! 同时每 100ms 检查一次停止信号，信号触发时放弃在途请求。

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use super::signal::StopSignal;
use crate::translation::config::{constants, ProxyConfig};
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::pipeline::{ChatCompletion, ChatMessage};
use crate::translation::storage::credentials::{mask_key, parse_keys};

/// 请求体
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub temperature: f64,
}

/// 单个密钥的探测结果
#[derive(Debug, Clone, PartialEq)]
pub struct KeyProbe {
    /// 打码后的密钥
    pub key: String,
    pub outcome: TranslationResult<()>,
}

impl KeyProbe {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// LLM 客户端
#[derive(Debug, Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    call_timeout: Duration,
}

impl LlmClient {
    /// 使用默认时限创建客户端
    pub fn new() -> TranslationResult<Self> {
        Self::with_timeouts(constants::TRANSFER_TIMEOUT, constants::CALL_TIMEOUT)
    }

    pub fn with_timeouts(transfer: Duration, call: Duration) -> TranslationResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(transfer)
            .user_agent(concat!("llm-translate-proxy/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TranslationError::ConfigError(format!("创建 HTTP 客户端失败: {}", e)))?;

        Ok(Self {
            http,
            call_timeout: call,
        })
    }

    /// 发送一次 chat completions 请求
    ///
    /// 停止信号优先于结果：一旦触发立即返回 [`TranslationError::Cancelled`]。
    pub async fn chat(
        &self,
        url: &str,
        key: &str,
        request: &ChatRequest<'_>,
        stop: &StopSignal,
    ) -> TranslationResult<ChatCompletion> {
        if stop.is_raised() {
            return Err(TranslationError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = stop.cancelled() => Err(TranslationError::Cancelled),
            result = tokio::time::timeout(self.call_timeout, self.send_chat(url, key, request)) => result?,
        }
    }

    async fn send_chat(&self, url: &str, key: &str, request: &ChatRequest<'_>) -> TranslationResult<ChatCompletion> {
        let response = self.http.post(url).bearer_auth(key).json(request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(TranslationError::NetworkError(format!(
                "HTTP {}: {}",
                status,
                preview(&body)
            )));
        }

        ChatCompletion::from_body(&body)
    }

    /// 获取上游可用的模型列表（`GET {api}/models` 的 `data[].id`）
    pub async fn list_models(&self, config: &ProxyConfig, key: &str) -> TranslationResult<Vec<String>> {
        let response = self.http.get(config.models_url()).bearer_auth(key).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(TranslationError::NetworkError(format!("HTTP {}: {}", status, preview(&body))));
        }

        let value: Value = serde_json::from_str(&body)?;
        let models = value
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| TranslationError::FormatError("响应缺少 data 字段".to_string()))?
            .iter()
            .filter_map(|model| model.get("id").and_then(Value::as_str))
            .map(str::to_string)
            .collect();

        Ok(models)
    }

    /// 用一条最短的消息逐个测试配置中的密钥
    pub async fn probe_keys(&self, config: &ProxyConfig) -> Vec<KeyProbe> {
        let url = config.completions_url();
        let messages = [ChatMessage::user("Hi")];
        let request = ChatRequest {
            model: &config.model_name,
            messages: &messages,
            temperature: config.temperature,
        };
        let stop = StopSignal::new();

        let mut probes = Vec::new();
        for key in parse_keys(&config.api_key) {
            let outcome = self.chat(&url, &key, &request, &stop).await.map(|_| ());
            match &outcome {
                Ok(()) => tracing::info!("密钥可用: {}", mask_key(&key)),
                Err(e) => tracing::warn!("密钥不可用: {} ({})", mask_key(&key), e),
            }
            probes.push(KeyProbe {
                key: mask_key(&key),
                outcome,
            });
        }
        probes
    }
}

/// 截取响应体用于日志
fn preview(body: &str) -> String {
    const LIMIT: usize = 200;
    if body.chars().count() <= LIMIT {
        body.to_string()
    } else {
        let head: String = body.chars().take(LIMIT).collect();
        format!("{}...", head)
    }
}
