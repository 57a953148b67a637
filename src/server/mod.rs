//! HTTP 触发入口
//!
//! - `GET /`：服务信息
//! - `GET /health`：浏览器状态
//! - `POST /process-queue`：校验 Bearer 密钥后处理一批作业

pub mod routes;
pub mod shutdown;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::orchestrator::QueueProcessor;

pub use shutdown::shutdown_signal;

/// 路由共享状态
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<QueueProcessor>,
    /// 未配置时 `/process-queue` 一律拒绝
    pub cron_secret: Option<String>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::root))
        .route("/health", get(routes::health))
        .route("/process-queue", post(routes::process_queue))
        .with_state(state)
}
