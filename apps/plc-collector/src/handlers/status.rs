//! PLC 运行状态
//!
//! - GET /status
//! - GET /status/{plc}

use crate::AppState;
use crate::utils::response::{not_found_error, status_to_dto};
use api_contract::{ApiResponse, PlcStatusDto};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

pub async fn list_status(State(state): State<AppState>) -> Response {
    let data: Vec<PlcStatusDto> = state
        .supervisor
        .status()
        .await
        .into_values()
        .map(status_to_dto)
        .collect();
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

pub async fn get_status(State(state): State<AppState>, Path(plc): Path<String>) -> Response {
    let mut status = state.supervisor.status().await;
    match status.remove(&plc) {
        Some(item) => (
            StatusCode::OK,
            Json(ApiResponse::success(status_to_dto(item))),
        )
            .into_response(),
        None => not_found_error(format!("plc not running: {}", plc)),
    }
}
