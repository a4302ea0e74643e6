//! # PostgreSQL 存储实现模块
//!
//! 生产环境使用的历史视图与实时视图实现。
//!
//! ## 包含的实现
//!
//! - **HistoricalStore** (`historical.rs`)：`plc_historical` 只追加表
//! - **RealtimeStore** (`realtime.rs`)：`plc_realtime` 条件 upsert 表
//!
//! ## 数据库模式要求
//!
//! 表结构由 [`crate::connection::ensure_schema`] 创建：
//!
//! - `plc_historical`：(id, plc_name, tag_name, ts_ms, value_json, success, error, inserted_at)
//! - `plc_realtime`：(plc_name, tag_name) 主键，(value_json, ts_ms, updated_at_ms)
//!
//! ## 写入语义
//!
//! - 每批读数在一个事务内写入，失败时整批回滚，由上层重试
//! - 历史表允许重复行（至少一次语义）
//! - 实时表仅在 `ts_ms` 不倒退时覆盖
//! - 值以带类型标签的 JSON 文本保存，读取时还原为 `TagValue`

pub mod historical;
pub mod realtime;

pub use historical::*;
pub use realtime::*;
