//! 稳定的 DTO 与 API 响应契约。

use serde::{Deserialize, Serialize};

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 最近一次失败。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureDto {
    /// device_offline / read_errors / sink_overflow / persist_failed
    pub class: String,
    pub message: String,
    pub at_ms: i64,
}

/// 单个 PLC 的运行状态。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlcStatusDto {
    pub name: String,
    pub address: String,
    pub family: String,
    pub state: String,
    pub connection: String,
    pub last_success_ms: Option<i64>,
    pub consecutive_failures: u32,
    pub last_failure: Option<FailureDto>,
    pub reconnect_attempts: u64,
    pub reads_ok: u64,
    pub read_errors: u64,
    pub sink_overflows: u64,
    pub persisted_historical: u64,
    pub persisted_realtime: u64,
    pub persist_failures: u64,
}

/// 进程级计数器。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshotDto {
    pub reads_ok: u64,
    pub read_errors: u64,
    pub device_unavailable: u64,
    pub reconnect_attempts: u64,
    pub sink_overflows: u64,
    pub persisted_historical: u64,
    pub persisted_realtime: u64,
    pub persist_failures: u64,
    pub write_batches: u64,
    pub avg_write_latency_ms: Option<f64>,
    pub sink_queued: usize,
}

/// 实时视图中的一条记录。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeValueDto {
    pub plc_name: String,
    pub tag_name: String,
    pub value: serde_json::Value,
    pub value_type: String,
    pub ts_ms: i64,
    pub updated_at_ms: i64,
}

/// 实时查询参数：`tag` 为空时返回该 PLC 的全部点位。
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeQuery {
    pub plc: String,
    pub tag: Option<String>,
}

/// 重新加载配置的结果。
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadResultDto {
    pub started: Vec<String>,
    pub stopped: Vec<String>,
    pub unchanged: Vec<String>,
}

/// 健康检查。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthDto {
    pub status: String,
    pub running_plcs: usize,
}
