//! 翻译请求处理器

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::translation::config::constants;
use crate::translation::core::RetryOutcome;
use crate::translation::events::{single_line, Message};
use crate::web::types::{AppState, TranslateQuery};

const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";

fn plain(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, TEXT_PLAIN_UTF8)], body).into_response()
}

/// `GET /?text=...`
///
/// 文本缺失或去掉首尾空白后为空时直接返回空的 200 响应，不派发任何工作。
/// 结果为空时返回 500 和固定的失败标记。
pub async fn translate_text(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(query): Query<TranslateQuery>,
) -> Response {
    let text = query.text.as_deref().map(str::trim).unwrap_or_default();
    if text.is_empty() {
        return plain(StatusCode::OK, String::new());
    }

    let engine = &state.engine;
    let events = engine.events();
    let language = engine.config_snapshot().language();

    events.log(format!("{}{}", Message::RequestReceived.text(language), single_line(text)));
    metrics::counter!("llmproxy_requests_total").increment(1);
    events.work_started();

    let outcome = match Arc::clone(&state.permits).acquire_owned().await {
        Ok(_permit) => engine.translate(text, &peer.ip().to_string()).await,
        Err(e) => {
            tracing::error!("工作池已关闭: {}", e);
            RetryOutcome::Aborted
        }
    };

    let success = outcome.is_success() && !engine.stop_signal().is_raised();
    events.work_finished(success);

    let result = outcome.into_text();
    if result.is_empty() {
        plain(StatusCode::INTERNAL_SERVER_ERROR, constants::FAILURE_BODY.to_string())
    } else {
        plain(StatusCode::OK, result)
    }
}
