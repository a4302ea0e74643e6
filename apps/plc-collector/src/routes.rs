//! 路由定义
//!
//! 集中管理所有 API 路由，将路径映射到对应的 handlers：
//! - 健康检查：/health
//! - 运行状态：/status, /status/{plc}
//! - 指标快照：/metrics
//! - 实时值：/realtime?plc=..&tag=..
//! - 重新加载 PLC 定义：/reload

use super::AppState;
use super::handlers::*;
use axum::{
    Router,
    routing::{get, post},
};

/// 创建 API 路由
///
/// 由 `build_app` 同时挂在 / 和 /api/ 两种前缀下
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(list_status))
        .route("/status/:plc", get(get_status))
        .route("/metrics", get(get_metrics))
        .route("/realtime", get(get_realtime))
        .route("/reload", post(reload))
}
