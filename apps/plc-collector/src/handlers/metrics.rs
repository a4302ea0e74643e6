//! 采集指标快照。
//!
//! - GET /metrics

use crate::AppState;
use crate::utils::response::metrics_to_dto;
use api_contract::ApiResponse;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use plc_telemetry::metrics;

pub async fn get_metrics(State(state): State<AppState>) -> Response {
    let snapshot = metrics().snapshot();
    (
        StatusCode::OK,
        Json(ApiResponse::success(metrics_to_dto(
            snapshot,
            state.sink.queued(),
        ))),
    )
        .into_response()
}
