//! Web 模块的数据类型定义

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::Semaphore;

use crate::translation::core::TranslationEngine;

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TranslationEngine>,
    /// 同时执行的翻译管道数上限
    pub permits: Arc<Semaphore>,
}

impl AppState {
    pub fn new(engine: Arc<TranslationEngine>, max_threads: usize) -> Self {
        Self {
            engine,
            permits: Arc::new(Semaphore::new(max_threads.max(1))),
        }
    }
}

/// 翻译请求 `GET /?text=...`
#[derive(Debug, Default, Deserialize)]
pub struct TranslateQuery {
    pub text: Option<String>,
}
