//! 面向界面协作者的事件流
//!
//! 日志行、Token 用量以及工作开始/结束事件通过广播通道发布，
//! 任何界面都可以订阅，没有订阅者时发布也不会出错。

use chrono::Local;
use tokio::sync::broadcast;

use crate::translation::config::Language;

/// 广播通道容量，慢订阅者会丢失最旧的事件
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// 服务器事件
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// 带时间戳的日志行
    Log(String),
    /// 上游报告的 Token 用量
    TokenUsage { prompt: u64, completion: u64 },
    /// 开始处理一个翻译请求
    WorkStarted,
    /// 翻译请求处理完毕
    WorkFinished { success: bool },
}

/// 事件总线
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ServerEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// 订阅事件流
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: ServerEvent) {
        // 没有订阅者时 send 返回错误，这里忽略
        let _ = self.sender.send(event);
    }

    /// 发布日志行，同时写入 tracing
    pub fn log(&self, line: impl Into<String>) {
        let line = line.into();
        tracing::info!(target: "llm_translate_proxy::events", "{}", line);
        self.publish(ServerEvent::Log(format!("[{}] {}", Local::now().format("%H:%M:%S"), line)));
    }

    pub fn token_usage(&self, prompt: u64, completion: u64) {
        if prompt > 0 || completion > 0 {
            self.publish(ServerEvent::TokenUsage { prompt, completion });
        }
    }

    pub fn work_started(&self) {
        self.publish(ServerEvent::WorkStarted);
    }

    pub fn work_finished(&self, success: bool) {
        self.publish(ServerEvent::WorkFinished { success });
    }
}

/// 本地化的日志文本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    ServerStarted,
    ServerStopped,
    RequestReceived,
    InvalidApiKey,
    InvalidFormat,
    JsonParseError,
    NewTerm,
    RetryAttempt,
    RetrySuccess,
    RetryFailed,
    Aborted,
    RequestTimeout,
    NetworkError,
    ContextCleared,
}

impl Message {
    /// 取对应语言的文本
    pub fn text(self, language: Language) -> &'static str {
        let (en, zh) = match self {
            Message::ServerStarted => ("Server started. Port: {port}, Threads: {threads}", "服务已启动，端口：{port}，并发线程数：{threads}"),
            Message::ServerStopped => ("Server stopped", "服务已停止"),
            Message::RequestReceived => ("Request received: ", "收到请求: "),
            Message::InvalidApiKey => ("❌ Error: Invalid API Key", "❌ 错误：API 密钥无效"),
            Message::InvalidFormat => ("❌ Error: Invalid Response Format", "❌ 错误：响应格式无效"),
            Message::JsonParseError => ("❌ Error: JSON Parse Error", "❌ 错误：JSON 解析失败"),
            Message::NewTerm => ("✨ New Term Discovered: ", "✨ 发现新术语: "),
            Message::RetryAttempt => ("🔄 Retry translation ({n}/{max}): ", "🔄 重试翻译 ({n}/{max}): "),
            Message::RetrySuccess => ("✅ Retry successful", "✅ 重试成功"),
            Message::RetryFailed => ("❌ Retry failed, skipping text", "❌ 重试失败，跳过文本"),
            Message::Aborted => ("⛔ Translation Aborted", "⛔ 翻译已终止"),
            Message::RequestTimeout => ("❌ Request Timeout", "❌ 请求超时"),
            Message::NetworkError => ("❌ Network Error: ", "❌ 网络错误: "),
            Message::ContextCleared => ("🧹 Context memory cleared.", "🧹 上下文记忆已清空。"),
        };

        match language {
            Language::English => en,
            Language::Chinese => zh,
        }
    }

    /// 服务启动日志
    pub fn server_started(language: Language, port: u16, threads: usize) -> String {
        Message::ServerStarted
            .text(language)
            .replace("{port}", &port.to_string())
            .replace("{threads}", &threads.to_string())
    }

    /// 重试日志
    pub fn retry_attempt(language: Language, attempt: usize, max: usize) -> String {
        Message::RetryAttempt
            .text(language)
            .replace("{n}", &attempt.to_string())
            .replace("{max}", &max.to_string())
    }
}

/// 日志显示优化：把真实换行替换为 `[LF]`，保持单行
pub fn single_line(text: &str) -> String {
    text.replace("\r\n", "[LF]").replace('\n', "[LF]")
}
