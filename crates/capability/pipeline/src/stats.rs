//! 按 PLC 汇总的写入统计

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// 最近一次写入失败的类别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkFailureKind {
    Overflow,
    PersistFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkFailure {
    pub kind: SinkFailureKind,
    pub message: String,
    pub at_ms: i64,
}

/// 单个 PLC 的写入统计快照。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SinkStats {
    pub overflows: u64,
    pub persisted_historical: u64,
    pub persisted_realtime: u64,
    pub historical_failures: u64,
    pub realtime_failures: u64,
    pub last_failure: Option<SinkFailure>,
}

impl SinkStats {
    pub fn persist_failures(&self) -> u64 {
        self.historical_failures + self.realtime_failures
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct StatsTable {
    inner: Arc<RwLock<HashMap<String, SinkStats>>>,
}

impl StatsTable {
    pub(crate) fn update(&self, plc_name: &str, apply: impl FnOnce(&mut SinkStats)) {
        // 统计写不进去不影响数据路径
        if let Ok(mut table) = self.inner.write() {
            apply(table.entry(plc_name.to_string()).or_default());
        }
    }

    pub(crate) fn get(&self, plc_name: &str) -> SinkStats {
        self.inner
            .read()
            .ok()
            .and_then(|table| table.get(plc_name).cloned())
            .unwrap_or_default()
    }
}
