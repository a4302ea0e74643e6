//! # PLC Pipeline 模块
//!
//! 采集读数到两个存储视图之间的缓冲层（Sample Sink）。
//!
//! - 入口是有界队列，多个 Poller 并发 `submit`；队列满时有限阻塞，超时丢弃并计为溢出
//! - 单个写入任务按「N 条或 T 时间」凑批，批量写历史视图，再写实时视图
//! - 两个视图各自重试，重试耗尽后逐条上报永久失败
//! - 失败读数只进历史视图；实时视图的条件覆盖由存储层保证
//! - 单写入任务保证同一 PLC 的读数按提交顺序落库

mod sink;
mod stats;

pub use sink::{SampleSink, SinkConfig, SinkError, SinkHandle};
pub use stats::{SinkFailure, SinkFailureKind, SinkStats};
