//! 存储数据模型
//!
//! - HistoricalRecord：历史视图的一行（只追加）
//! - RealtimeRecord：实时视图的一行（按 `(plc_name, tag_name)` 覆盖）

use domain::{Reading, TagValue};
use serde::Serialize;
use std::collections::HashMap;

/// 历史记录：读数的只追加投影，失败读数也会保留。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalRecord {
    pub plc_name: String,
    pub tag_name: String,
    pub value: Option<TagValue>,
    pub ts_ms: i64,
    pub success: bool,
    pub error: Option<String>,
}

impl From<&Reading> for HistoricalRecord {
    fn from(reading: &Reading) -> Self {
        Self {
            plc_name: reading.plc_name.clone(),
            tag_name: reading.tag_name.clone(),
            value: reading.value.clone(),
            ts_ms: reading.ts_ms,
            success: reading.success,
            error: reading.error.clone(),
        }
    }
}

/// 实时记录：每个点位一行，保存时间戳最大的值。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RealtimeRecord {
    pub plc_name: String,
    pub tag_name: String,
    pub value: TagValue,
    pub ts_ms: i64,
    pub updated_at_ms: i64,
}

/// 每个 `(plc_name, tag_name)` 只保留时间戳最大的成功读数。
///
/// 失败读数没有值，不参与实时视图；相同时间戳取后出现者。
pub fn latest_per_key(readings: &[Reading]) -> Vec<&Reading> {
    let mut latest: HashMap<(&str, &str), &Reading> = HashMap::new();
    let mut order = Vec::new();
    for reading in readings.iter().filter(|r| r.success && r.value.is_some()) {
        match latest.get_mut(&reading.key()) {
            Some(current) => {
                if current.ts_ms <= reading.ts_ms {
                    *current = reading;
                }
            }
            None => {
                latest.insert(reading.key(), reading);
                order.push(reading.key());
            }
        }
    }
    order
        .into_iter()
        .filter_map(|key| latest.get(&key).copied())
        .collect()
}
