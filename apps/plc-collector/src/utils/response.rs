//! HTTP 响应辅助函数和 DTO 转换
//!
//! - 错误响应：bad_request_error, not_found_error, storage_error, reload_error
//! - DTO 转换：status_to_dto, realtime_to_dto, metrics_to_dto

use api_contract::{
    ApiResponse, FailureDto, MetricsSnapshotDto, PlcStatusDto, RealtimeValueDto,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::TagValue;
use plc_config::ConfigError;
use plc_ingest::{PlcStatus, SupervisorError};
use plc_storage::{RealtimeRecord, StorageError};
use plc_telemetry::MetricsSnapshot;
use serde::Serialize;
use serde_json::{Map, Value};

/// 错误请求响应
pub fn bad_request_error(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error("INVALID.REQUEST", message.into())),
    )
        .into_response()
}

/// 资源未找到错误响应
pub fn not_found_error(message: impl Into<String>) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::error("RESOURCE.NOT_FOUND", message.into())),
    )
        .into_response()
}

/// 存储错误响应
pub fn storage_error(err: StorageError) -> Response {
    let message = err.to_string();
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::<()>::error("INTERNAL.ERROR", message)),
    )
        .into_response()
}

/// 配置文件无法读取或解析
pub fn config_error(err: ConfigError) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error("CONFIG.INVALID", err.to_string())),
    )
        .into_response()
}

/// 新配置未通过启动校验
pub fn reload_error(err: SupervisorError) -> Response {
    let code = match &err {
        SupervisorError::Validation(_) => "CONFIG.INVALID",
        SupervisorError::UnsupportedFamily { .. } => "CONFIG.UNSUPPORTED_FAMILY",
        SupervisorError::AlreadyRunning(_) => "CONFIG.DUPLICATE_PLC",
    };
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error(code, err.to_string())),
    )
        .into_response()
}

/// snake_case 枚举的序列化名
fn variant_name<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(Value::String(name)) => name,
        _ => String::new(),
    }
}

/// 点位值去掉类型标签后的 JSON；非有限浮点数输出 null
pub fn plain_value(value: &TagValue) -> Value {
    match value {
        TagValue::Integer(v) => Value::from(*v),
        TagValue::Float(v) => serde_json::Number::from_f64(*v)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        TagValue::Boolean(v) => Value::Bool(*v),
        TagValue::String(v) => Value::String(v.clone()),
        TagValue::Array(items) => Value::Array(items.iter().map(plain_value).collect()),
        TagValue::Structured(members) => Value::Object(
            members
                .iter()
                .map(|(name, member)| (name.clone(), plain_value(member)))
                .collect::<Map<String, Value>>(),
        ),
    }
}

/// PlcStatus 转 PlcStatusDto
pub fn status_to_dto(status: PlcStatus) -> PlcStatusDto {
    PlcStatusDto {
        state: variant_name(&status.state),
        connection: variant_name(&status.connection),
        family: status.family.to_string(),
        last_failure: status.last_failure.map(|failure| FailureDto {
            class: variant_name(&failure.class),
            message: failure.message,
            at_ms: failure.at_ms,
        }),
        name: status.name,
        address: status.address,
        last_success_ms: status.last_success_ms,
        consecutive_failures: status.consecutive_failures,
        reconnect_attempts: status.reconnect_attempts,
        reads_ok: status.reads_ok,
        read_errors: status.read_errors,
        sink_overflows: status.sink_overflows,
        persisted_historical: status.persisted_historical,
        persisted_realtime: status.persisted_realtime,
        persist_failures: status.persist_failures,
    }
}

/// RealtimeRecord 转 RealtimeValueDto
pub fn realtime_to_dto(record: RealtimeRecord) -> RealtimeValueDto {
    RealtimeValueDto {
        value: plain_value(&record.value),
        value_type: record.value.type_name().to_string(),
        plc_name: record.plc_name,
        tag_name: record.tag_name,
        ts_ms: record.ts_ms,
        updated_at_ms: record.updated_at_ms,
    }
}

/// 计数器快照转 DTO，附带样本汇当前排队数
pub fn metrics_to_dto(snapshot: MetricsSnapshot, sink_queued: usize) -> MetricsSnapshotDto {
    let avg_write_latency_ms = (snapshot.write_latency_ms_count > 0).then(|| {
        snapshot.write_latency_ms_total as f64 / snapshot.write_latency_ms_count as f64
    });
    MetricsSnapshotDto {
        reads_ok: snapshot.reads_ok,
        read_errors: snapshot.read_errors,
        device_unavailable: snapshot.device_unavailable,
        reconnect_attempts: snapshot.reconnect_attempts,
        sink_overflows: snapshot.sink_overflows,
        persisted_historical: snapshot.persisted_historical,
        persisted_realtime: snapshot.persisted_realtime,
        persist_failures: snapshot.persist_failures,
        write_batches: snapshot.write_batches,
        avg_write_latency_ms,
        sink_queued,
    }
}
