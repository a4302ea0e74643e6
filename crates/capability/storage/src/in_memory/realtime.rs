//! 实时视图内存实现
//!
//! 仅用于本地测试和演示。

use crate::error::StorageError;
use crate::models::{RealtimeRecord, latest_per_key};
use crate::traits::RealtimeStore;
use domain::{Reading, now_epoch_ms};
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

type RealtimeKey = (String, String);

/// 实时视图内存存储
pub struct InMemoryRealtimeStore {
    rows: RwLock<HashMap<RealtimeKey, RealtimeRecord>>,
    failing: AtomicBool,
}

impl InMemoryRealtimeStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// 行数量（用于测试）
    pub fn len(&self) -> usize {
        self.rows.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 打开后所有写入都返回错误，模拟后端不可用。
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Default for InMemoryRealtimeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RealtimeStore for InMemoryRealtimeStore {
    async fn upsert_realtime(&self, readings: &[Reading]) -> Result<usize, StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::new("realtime store unavailable"));
        }
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let updated_at_ms = now_epoch_ms();
        let mut written = 0;
        for reading in latest_per_key(readings) {
            let Some(value) = reading.value.clone() else {
                continue;
            };
            let key = (reading.plc_name.clone(), reading.tag_name.clone());
            if let Some(existing) = rows.get(&key)
                && existing.ts_ms > reading.ts_ms
            {
                continue;
            }
            rows.insert(
                key,
                RealtimeRecord {
                    plc_name: reading.plc_name.clone(),
                    tag_name: reading.tag_name.clone(),
                    value,
                    ts_ms: reading.ts_ms,
                    updated_at_ms,
                },
            );
            written += 1;
        }
        Ok(written)
    }

    async fn get_realtime(
        &self,
        plc_name: &str,
        tag_name: &str,
    ) -> Result<Option<RealtimeRecord>, StorageError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(rows
            .get(&(plc_name.to_string(), tag_name.to_string()))
            .cloned())
    }

    async fn list_realtime(&self, plc_name: &str) -> Result<Vec<RealtimeRecord>, StorageError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<RealtimeRecord> = rows
            .values()
            .filter(|row| row.plc_name == plc_name)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.tag_name.cmp(&b.tag_name));
        Ok(items)
    }
}
