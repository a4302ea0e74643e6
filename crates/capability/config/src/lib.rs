//! 采集服务运行配置与 PLC 定义加载。
//!
//! - [`AppConfig::from_env`]：读取 `COLLECTOR_*` 环境变量，缺省值见各字段
//! - [`load_plc_configs`]：从 JSON 文件读取 PLC 定义，启动时和显式 reload 时调用

use domain::PlcConfig;
use serde::Deserialize;
use std::env;
use std::path::Path;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
    #[error("cannot read {path}: {message}")]
    Io { path: String, message: String },
    #[error("invalid plc definition: {0}")]
    Parse(String),
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    /// PLC 定义文件（JSON）
    pub plc_config_path: String,
    /// 未设置时历史视图使用内存存储
    pub database_url: Option<String>,
    /// 设置后实时视图写 Redis，否则写 Postgres（或内存）
    pub redis_url: Option<String>,
    pub redis_realtime_ttl_seconds: Option<u64>,
    pub sink_capacity: usize,
    pub sink_batch_size: usize,
    pub sink_max_wait_ms: u64,
    pub sink_submit_timeout_ms: u64,
    pub sink_max_retries: usize,
    pub sink_retry_delay_ms: u64,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    pub backoff_jitter: f64,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub health_check_timeout_ms: u64,
    pub health_check_interval_ms: u64,
    pub min_tick_ms: u64,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_addr =
            env::var("COLLECTOR_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let plc_config_path =
            env::var("COLLECTOR_PLC_CONFIG").unwrap_or_else(|_| "plcs.json".to_string());
        let database_url = read_optional("COLLECTOR_DATABASE_URL");
        let redis_url = read_optional("COLLECTOR_REDIS_URL");
        let redis_realtime_ttl_seconds =
            read_optional_u64("COLLECTOR_REDIS_REALTIME_TTL_SECONDS")?.filter(|value| *value > 0);

        let sink_capacity = read_u64_with_default("COLLECTOR_SINK_CAPACITY", 10_000)? as usize;
        let sink_batch_size = read_u64_with_default("COLLECTOR_SINK_BATCH_SIZE", 200)? as usize;
        let sink_max_wait_ms = read_u64_with_default("COLLECTOR_SINK_MAX_WAIT_MS", 500)?;
        let sink_submit_timeout_ms =
            read_u64_with_default("COLLECTOR_SINK_SUBMIT_TIMEOUT_MS", 200)?;
        let sink_max_retries = read_u64_with_default("COLLECTOR_SINK_MAX_RETRIES", 3)? as usize;
        let sink_retry_delay_ms = read_u64_with_default("COLLECTOR_SINK_RETRY_DELAY_MS", 200)?;

        let backoff_base_ms = read_u64_with_default("COLLECTOR_BACKOFF_BASE_MS", 1_000)?;
        let backoff_cap_ms = read_u64_with_default("COLLECTOR_BACKOFF_CAP_MS", 60_000)?;
        let backoff_jitter = read_f64_with_default("COLLECTOR_BACKOFF_JITTER", 0.1)?;

        let connect_timeout_ms = read_u64_with_default("COLLECTOR_CONNECT_TIMEOUT_MS", 5_000)?;
        let read_timeout_ms = read_u64_with_default("COLLECTOR_READ_TIMEOUT_MS", 3_000)?;
        let health_check_timeout_ms =
            read_u64_with_default("COLLECTOR_HEALTH_CHECK_TIMEOUT_MS", 2_000)?;
        let health_check_interval_ms =
            read_u64_with_default("COLLECTOR_HEALTH_CHECK_INTERVAL_MS", 30_000)?;
        let min_tick_ms = read_u64_with_default("COLLECTOR_MIN_TICK_MS", 100)?;

        if sink_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "COLLECTOR_SINK_BATCH_SIZE".to_string(),
                "0".to_string(),
            ));
        }
        if backoff_base_ms == 0 {
            return Err(ConfigError::Invalid(
                "COLLECTOR_BACKOFF_BASE_MS".to_string(),
                "0".to_string(),
            ));
        }
        if min_tick_ms == 0 {
            return Err(ConfigError::Invalid(
                "COLLECTOR_MIN_TICK_MS".to_string(),
                "0".to_string(),
            ));
        }

        Ok(Self {
            http_addr,
            plc_config_path,
            database_url,
            redis_url,
            redis_realtime_ttl_seconds,
            sink_capacity,
            sink_batch_size,
            sink_max_wait_ms,
            sink_submit_timeout_ms,
            sink_max_retries,
            sink_retry_delay_ms,
            backoff_base_ms,
            backoff_cap_ms,
            backoff_jitter,
            connect_timeout_ms,
            read_timeout_ms,
            health_check_timeout_ms,
            health_check_interval_ms,
            min_tick_ms,
        })
    }
}

#[derive(Deserialize)]
struct PlcDocument {
    plcs: Vec<PlcConfig>,
}

/// 解析 PLC 定义文档：`{"plcs": [ ... ]}`。
///
/// 这里只做结构解析；名称唯一、周期合法等规则由启动校验负责。
pub fn parse_plc_configs(text: &str) -> Result<Vec<PlcConfig>, ConfigError> {
    let document: PlcDocument =
        serde_json::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))?;
    Ok(document.plcs)
}

/// 读取并解析 PLC 定义文件。
pub fn load_plc_configs(path: impl AsRef<Path>) -> Result<Vec<PlcConfig>, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    parse_plc_configs(&text)
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_f64_with_default(key: &str, default: f64) -> Result<f64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    match value.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() && parsed >= 0.0 => Ok(parsed),
        _ => Err(ConfigError::Invalid(key.to_string(), value)),
    }
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_optional_u64(key: &str) -> Result<Option<u64>, ConfigError> {
    match env::var(key) {
        Ok(value) if value.is_empty() => Ok(None),
        Ok(value) => value
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(key.to_string(), value)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{ControllerFamily, DataType};

    #[test]
    fn parses_plc_document() {
        let text = r#"{
            "plcs": [
                {
                    "name": "Line1",
                    "address": "192.168.1.10",
                    "family": "compact_logix",
                    "tags": [
                        {"name": "Temp", "data_type": "float32", "scan_interval_secs": 1.0},
                        {"name": "Count", "scan_interval_secs": 5.0}
                    ]
                },
                {
                    "name": "Press",
                    "address": "10.0.0.5:502",
                    "family": "modbus_tcp",
                    "slot": 3,
                    "tags": [{"name": "hr:100", "data_type": "int32", "scan_interval_secs": 0.5}]
                }
            ]
        }"#;
        let plcs = parse_plc_configs(text).expect("parse");
        assert_eq!(plcs.len(), 2);
        assert_eq!(plcs[0].descriptor.family, ControllerFamily::CompactLogix);
        assert_eq!(plcs[0].tags[0].data_type, DataType::Float32);
        assert_eq!(plcs[0].tags[1].data_type, DataType::Auto);
        assert_eq!(plcs[1].descriptor.effective_slot(), Some(3));
    }

    #[test]
    fn rejects_malformed_document() {
        assert!(matches!(
            parse_plc_configs(r#"{"plcs": [{"name": "Line1"}]}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(parse_plc_configs("[]"), Err(ConfigError::Parse(_))));
    }
}
