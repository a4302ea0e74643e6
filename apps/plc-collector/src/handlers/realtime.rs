//! 实时查询 handlers
//!
//! - GET /realtime?plc=Line1
//! - GET /realtime?plc=Line1&tag=A

use crate::AppState;
use crate::utils::response::{bad_request_error, realtime_to_dto, storage_error};
use api_contract::{ApiResponse, RealtimeQuery, RealtimeValueDto};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

pub async fn get_realtime(
    State(state): State<AppState>,
    Query(query): Query<RealtimeQuery>,
) -> Response {
    let plc = query.plc.trim();
    if plc.is_empty() {
        return bad_request_error("plc is required");
    }
    let tag = query
        .tag
        .as_deref()
        .map(str::trim)
        .filter(|tag| !tag.is_empty());

    let records = if let Some(tag) = tag {
        match state.realtime.get_realtime(plc, tag).await {
            Ok(Some(item)) => vec![item],
            Ok(None) => Vec::new(),
            Err(err) => return storage_error(err),
        }
    } else {
        match state.realtime.list_realtime(plc).await {
            Ok(items) => items,
            Err(err) => return storage_error(err),
        }
    };
    let data: Vec<RealtimeValueDto> = records.into_iter().map(realtime_to_dto).collect();
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}
