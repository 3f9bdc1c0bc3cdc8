//! Web 服务器模块
//!
//! 本地翻译代理的监听端：一个专用线程运行自己的多线程 tokio 运行时，
//! 工作线程数与并发管道数都取配置的线程数（至少为1）。

pub mod handlers;
pub mod routes;
pub mod types;

pub use handlers::*;
pub use routes::*;
pub use types::*;

use std::net::SocketAddr;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot};

use crate::translation::collaborators::{GlossaryProvider, TextRuleEngine};
use crate::translation::config::ProxyConfig;
use crate::translation::core::{StopSignal, TranslationEngine};
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::events::{EventBus, Message, ServerEvent};

/// 运行中的监听线程
struct ListenerHandle {
    thread: JoinHandle<()>,
    shutdown: Option<oneshot::Sender<()>>,
    addr: SocketAddr,
}

/// 翻译代理服务器
pub struct ProxyServer {
    engine: Arc<TranslationEngine>,
    listener: Option<ListenerHandle>,
}

impl ProxyServer {
    pub fn new(engine: TranslationEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            listener: None,
        }
    }

    /// 由配置和协作者直接创建
    pub fn from_config(
        config: ProxyConfig,
        glossary: Arc<dyn GlossaryProvider>,
        rules: Arc<dyn TextRuleEngine>,
    ) -> TranslationResult<Self> {
        let engine = TranslationEngine::new(config, glossary, rules, EventBus::new(), StopSignal::new())?;
        Ok(Self::new(engine))
    }

    /// 启动服务器，返回实际绑定的地址；已在运行时直接返回当前地址
    pub fn start(&mut self) -> TranslationResult<SocketAddr> {
        if let Some(listener) = &self.listener {
            return Ok(listener.addr);
        }

        self.engine.stop_signal().reset();

        let config = self.engine.config_snapshot();
        let threads = config.worker_threads();
        let port = config.port;

        let (ready_tx, ready_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let engine = Arc::clone(&self.engine);

        let thread = std::thread::Builder::new()
            .name("llm-proxy-listener".to_string())
            .spawn(move || run_listener(engine, port, threads, ready_tx, shutdown_rx))
            .map_err(|e| TranslationError::ServerError(format!("无法创建监听线程: {}", e)))?;

        let addr = match ready_rx.recv() {
            Ok(Ok(addr)) => addr,
            Ok(Err(message)) => {
                let _ = thread.join();
                return Err(TranslationError::ServerError(message));
            }
            Err(_) => {
                let _ = thread.join();
                return Err(TranslationError::ServerError("监听线程意外退出".to_string()));
            }
        };

        self.listener = Some(ListenerHandle {
            thread,
            shutdown: Some(shutdown_tx),
            addr,
        });

        self.engine
            .events()
            .log(Message::server_started(config.language(), addr.port(), threads));
        Ok(addr)
    }

    /// 停止服务器
    ///
    /// 触发停止信号让在途请求尽快返回，通知监听器停止接受连接，并等待线程结束。
    pub fn stop(&mut self) {
        let Some(mut listener) = self.listener.take() else {
            return;
        };

        self.engine.stop_signal().raise();
        if let Some(shutdown) = listener.shutdown.take() {
            let _ = shutdown.send(());
        }
        if listener.thread.join().is_err() {
            tracing::error!("监听线程异常退出");
        }

        let language = self.engine.config_snapshot().language();
        self.engine.events().log(Message::ServerStopped.text(language));
        tracing::info!("引擎统计: {}", self.engine.stats().summary());
    }

    pub fn is_running(&self) -> bool {
        self.listener.is_some()
    }

    /// 运行中时返回绑定地址
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().map(|listener| listener.addr)
    }

    /// 热更新配置；端口与线程数在下次启动时生效
    pub fn update_config(&self, config: ProxyConfig) {
        self.engine.update_config(config);
    }

    pub fn config(&self) -> ProxyConfig {
        self.engine.config_snapshot()
    }

    /// 清除所有客户端的对话记忆
    pub fn clear_all_contexts(&self) {
        self.engine.clear_sessions();
        let language = self.engine.config_snapshot().language();
        self.engine.events().log(Message::ContextCleared.text(language));
    }

    /// 订阅日志、Token 用量与工作状态事件
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.engine.events().subscribe()
    }

    pub fn engine(&self) -> &Arc<TranslationEngine> {
        &self.engine
    }
}

impl Drop for ProxyServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 监听线程主体：构建运行时、绑定端口、回报地址、服务直到收到关闭信号
fn run_listener(
    engine: Arc<TranslationEngine>,
    port: u16,
    threads: usize,
    ready: mpsc::Sender<Result<SocketAddr, String>>,
    shutdown: oneshot::Receiver<()>,
) {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(threads)
        .thread_name("llm-proxy-worker")
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = ready.send(Err(format!("创建运行时失败: {}", e)));
            return;
        }
    };

    runtime.block_on(async move {
        let listener = match TcpListener::bind(("0.0.0.0", port)).await {
            Ok(listener) => listener,
            Err(e) => {
                let _ = ready.send(Err(format!("端口 {} 绑定失败: {}", port, e)));
                return;
            }
        };
        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                let _ = ready.send(Err(format!("无法读取监听地址: {}", e)));
                return;
            }
        };
        let _ = ready.send(Ok(addr));
        tracing::info!("翻译代理监听于 http://{}", addr);

        let app = create_router(Arc::new(AppState::new(engine, threads)));
        let served = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(async {
                let _ = shutdown.await;
            })
            .await;

        if let Err(e) = served {
            tracing::error!("服务器错误: {}", e);
        }
    });
}
