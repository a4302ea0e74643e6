//! 健康检查
//!
//! - GET /health

use crate::AppState;
use api_contract::{ApiResponse, HealthDto};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

pub async fn health(State(state): State<AppState>) -> Response {
    let running_plcs = state.supervisor.running().await.len();
    (
        StatusCode::OK,
        Json(ApiResponse::success(HealthDto {
            status: "ok".to_string(),
            running_plcs,
        })),
    )
        .into_response()
}
