//! 重新加载 PLC 定义文件
//!
//! - POST /reload
//!
//! 新配置整体校验通过后才会应用；未变更的 PLC 不会重启。

use crate::AppState;
use crate::utils::response::{config_error, reload_error};
use api_contract::{ApiResponse, ReloadResultDto};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use plc_config::load_plc_configs;
use tracing::warn;

pub async fn reload(State(state): State<AppState>) -> Response {
    let configs = match load_plc_configs(state.plc_config_path.as_str()) {
        Ok(configs) => configs,
        Err(err) => {
            warn!(target: "plc.collector", error = %err, "reload rejected");
            return config_error(err);
        }
    };
    match state.supervisor.reload(configs).await {
        Ok(summary) => (
            StatusCode::OK,
            Json(ApiResponse::success(ReloadResultDto {
                started: summary.started,
                stopped: summary.stopped,
                unchanged: summary.unchanged,
            })),
        )
            .into_response(),
        Err(err) => {
            warn!(target: "plc.collector", error = %err, "reload rejected");
            reload_error(err)
        }
    }
}
