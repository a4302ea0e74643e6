//! 内存存储实现模块
//!
//! 仅用于本地演示和测试。
//!
//! 包含以下实现：
//! - HistoricalStore: InMemoryHistoricalStore
//! - RealtimeStore: InMemoryRealtimeStore

pub mod historical;
pub mod realtime;

pub use historical::*;
pub use realtime::*;
