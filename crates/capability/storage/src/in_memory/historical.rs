//! 历史视图内存实现
//!
//! 仅用于本地测试和演示。

use crate::error::StorageError;
use crate::models::HistoricalRecord;
use crate::traits::HistoricalStore;
use domain::Reading;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// 历史视图内存存储
pub struct InMemoryHistoricalStore {
    records: RwLock<Vec<HistoricalRecord>>,
    failing: AtomicBool,
}

impl InMemoryHistoricalStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// 记录数量（用于测试）
    pub fn len(&self) -> usize {
        self.records.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 按写入顺序返回全部记录（用于测试）
    pub fn records(&self) -> Vec<HistoricalRecord> {
        self.records.read().map(|m| m.clone()).unwrap_or_default()
    }

    /// 打开后所有写入都返回错误，模拟后端不可用。
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Default for InMemoryHistoricalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl HistoricalStore for InMemoryHistoricalStore {
    async fn append_historical(&self, readings: &[Reading]) -> Result<usize, StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::new("historical store unavailable"));
        }
        let mut records = self
            .records
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        records.extend(readings.iter().map(HistoricalRecord::from));
        Ok(readings.len())
    }

    async fn count_historical(&self) -> Result<u64, StorageError> {
        let records = self
            .records
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(records.len() as u64)
    }
}
