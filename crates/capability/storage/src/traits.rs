//! 持久化接口 Trait 定义
//!
//! - HistoricalStore：历史视图，只追加
//! - RealtimeStore：实时视图，按 `(plc_name, tag_name)` 条件覆盖
//!
//! 设计原则：
//! - 接口以批为单位，减少往返
//! - 所有接口返回 StorageError
//! - 使用 async_trait 支持动态分发

use crate::error::StorageError;
use crate::models::RealtimeRecord;
use async_trait::async_trait;
use domain::Reading;

/// 历史视图存储接口
#[async_trait]
pub trait HistoricalStore: Send + Sync {
    /// 追加一批读数，返回写入条数。
    ///
    /// 重复追加同一读数可能产生重复行，但不会丢数据。
    async fn append_historical(&self, readings: &[Reading]) -> Result<usize, StorageError>;

    /// 历史记录总数（统计用）
    async fn count_historical(&self) -> Result<u64, StorageError>;
}

/// 实时视图存储接口
#[async_trait]
pub trait RealtimeStore: Send + Sync {
    /// 条件覆盖：仅当读数时间戳不小于已存时间戳时写入。
    ///
    /// 失败读数被忽略；返回实际写入的行数。
    async fn upsert_realtime(&self, readings: &[Reading]) -> Result<usize, StorageError>;

    /// 查询单个点位最新值
    async fn get_realtime(
        &self,
        plc_name: &str,
        tag_name: &str,
    ) -> Result<Option<RealtimeRecord>, StorageError>;

    /// 列出某个 PLC 的全部最新值
    async fn list_realtime(&self, plc_name: &str) -> Result<Vec<RealtimeRecord>, StorageError>;
}
