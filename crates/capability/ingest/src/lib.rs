//! # PLC 采集引擎
//!
//! - [`TagSchedule`]：按扫描周期把点位分桶，算出每个 tick 的到期集合
//! - [`Backoff`]：指数退避，成功连接后归零
//! - [`Poller`]：单个 PLC 的 tick → 读批 → 投递 Sink → 故障重连循环
//! - [`Supervisor`]：按配置启动 / 停止 / 重载 Poller，汇总状态
//!
//! 每个 Poller 独占自己的会话与调度，Poller 之间唯一共享的是 Sink 的入口队列。

mod backoff;
mod poller;
mod schedule;
mod supervisor;

pub use backoff::Backoff;
pub use poller::{
    FailureClass, FailureRecord, Poller, PollerHandle, PollerSettings, PollerState, PollerStatus,
};
pub use schedule::TagSchedule;
pub use supervisor::{PlcStatus, ReloadSummary, Supervisor, SupervisorError};
