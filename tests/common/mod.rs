// 集成测试公共模块
//
// 提供模拟上游、记录型协作者和引擎构建器

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::broadcast;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use llm_translate_proxy::translation::collaborators::{GlossaryProvider, NoRules, TextRuleEngine};
use llm_translate_proxy::translation::{
    EventBus, LlmClient, ProxyConfig, RetryPolicy, ServerEvent, StopSignal, TranslationEngine,
};

/// 上游 chat completions 响应体
pub fn completion_body(content: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5}
    })
}

/// 挂载一个总是返回固定内容的上游
pub async fn mount_reply(server: &MockServer, content: &str) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(content)))
        .mount(server)
        .await;
}

/// 指向模拟上游的配置
pub fn test_config(server: &MockServer) -> ProxyConfig {
    ProxyConfig {
        api_address: server.uri(),
        api_key: "test-key".to_string(),
        model_name: "test-model".to_string(),
        system_prompt: "You translate game text.".to_string(),
        pre_prompt: "Translate: ".to_string(),
        language: 0,
        port: 0,
        max_threads: 2,
        ..ProxyConfig::default()
    }
}

/// 测试用的快速重试策略（5 次尝试，极短延迟）
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 5,
        delay: Duration::from_millis(20),
        slice: Duration::from_millis(5),
    }
}

/// 上游收到的全部请求体
pub async fn received_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request: &Request| serde_json::from_slice(&request.body).expect("request body is JSON"))
        .collect()
}

/// 上游收到的 Authorization 头
pub async fn received_auth_headers(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter_map(|request| request.headers.get("authorization"))
        .map(|value| value.to_str().unwrap_or_default().to_string())
        .collect()
}

/// 请求体中的 (role, content) 序列
pub fn roles_and_contents(body: &Value) -> Vec<(String, String)> {
    body["messages"]
        .as_array()
        .expect("messages array")
        .iter()
        .map(|m| {
            (
                m["role"].as_str().unwrap_or_default().to_string(),
                m["content"].as_str().unwrap_or_default().to_string(),
            )
        })
        .collect()
}

/// 取出当前已缓冲的全部事件
pub fn drain_events(rx: &mut broadcast::Receiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// 事件中的日志行
pub fn log_lines(events: &[ServerEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            ServerEvent::Log(line) => Some(line.clone()),
            _ => None,
        })
        .collect()
}

/// 记录所有调用的术语表
#[derive(Default)]
pub struct RecordingGlossary {
    pub hint: String,
    pub queries: Mutex<Vec<String>>,
    pub added: Mutex<Vec<(String, String)>>,
    pub paths: Mutex<Vec<String>>,
}

impl RecordingGlossary {
    pub fn with_hint(hint: &str) -> Self {
        Self {
            hint: hint.to_string(),
            ..Self::default()
        }
    }

    pub fn added(&self) -> Vec<(String, String)> {
        self.added.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl GlossaryProvider for RecordingGlossary {
    fn get_context_prompt(&self, text: &str) -> String {
        self.queries.lock().unwrap().push(text.to_string());
        self.hint.clone()
    }

    fn add_new_term(&self, source: &str, target: &str) {
        self.added.lock().unwrap().push((source.to_string(), target.to_string()));
    }

    fn set_file_path(&self, path: &str) {
        self.paths.lock().unwrap().push(path.to_string());
    }
}

/// 引擎构建器
pub struct EngineBuilder {
    pub config: ProxyConfig,
    pub glossary: Arc<RecordingGlossary>,
    pub rules: Arc<dyn TextRuleEngine>,
    pub policy: RetryPolicy,
    pub client: Option<LlmClient>,
    pub events: EventBus,
    pub stop: StopSignal,
}

impl EngineBuilder {
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            config,
            glossary: Arc::new(RecordingGlossary::default()),
            rules: Arc::new(NoRules),
            policy: fast_policy(),
            client: None,
            events: EventBus::new(),
            stop: StopSignal::new(),
        }
    }

    pub fn glossary(mut self, glossary: RecordingGlossary) -> Self {
        self.glossary = Arc::new(glossary);
        self
    }

    pub fn rules(mut self, rules: Arc<dyn TextRuleEngine>) -> Self {
        self.rules = rules;
        self
    }

    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn call_timeout(mut self, call: Duration) -> Self {
        self.client = Some(LlmClient::with_timeouts(Duration::from_secs(30), call).expect("client builds"));
        self
    }

    /// 构建引擎，同时返回术语表句柄以便断言
    pub fn build(self) -> (TranslationEngine, Arc<RecordingGlossary>) {
        let glossary = Arc::clone(&self.glossary);
        let mut engine = TranslationEngine::new(
            self.config,
            self.glossary,
            self.rules,
            self.events,
            self.stop,
        )
        .expect("engine builds")
        .with_retry_policy(self.policy);

        if let Some(client) = self.client {
            engine = engine.with_client(client);
        }

        (engine, glossary)
    }
}
