//! # PLC Storage 模块
//!
//! 采集结果的持久化抽象层，提供两个视图：
//!
//! - **历史视图**：每条读数（包括失败读数）追加一行，用于回溯
//! - **实时视图**：每个 `(plc_name, tag_name)` 一行，保存时间戳最大的成功值
//!
//! ## 模块说明
//!
//! - [`traits`]：`HistoricalStore` / `RealtimeStore` 异步接口
//! - [`models`]：存储记录结构与批内去重辅助函数
//! - [`error`]：统一的存储错误类型
//! - [`connection`]：PostgreSQL 连接池与建表
//!
//! ## 存储实现
//!
//! - [`in_memory`]：`RwLock` 内存实现，带故障注入开关，用于测试和本地演示
//! - [`postgres`]：事务批量写入，实时表使用 `on conflict ... where` 条件 upsert
//! - [`redis`]：实时视图的 Redis 实现，条件覆盖由 Lua 脚本原子执行
//!
//! ## 实时视图的单调性
//!
//! 所有实现都保证实时视图的 `ts_ms` 不会倒退：
//! 时间戳较旧的读数即使晚到，也不会覆盖较新的值。时间戳相同则覆盖（幂等）。

pub mod connection;
pub mod error;
pub mod in_memory;
pub mod models;
pub mod postgres;
pub mod redis;
pub mod traits;

pub use connection::*;
pub use error::*;
pub use models::*;
pub use redis::RedisRealtimeStore;
pub use traits::*;

pub use in_memory::{InMemoryHistoricalStore, InMemoryRealtimeStore};

pub use postgres::{PgHistoricalStore, PgRealtimeStore};
