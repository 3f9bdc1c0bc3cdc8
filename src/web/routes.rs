//! Web 路由定义

use std::sync::Arc;

use axum::{routing::get, Router};

use crate::web::{handlers::translate_text, types::AppState};

/// 创建路由结构，只有一个翻译端点
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(translate_text))
}

/// 创建带状态的路由器
pub fn create_router(state: Arc<AppState>) -> Router {
    create_routes().with_state(state)
}
