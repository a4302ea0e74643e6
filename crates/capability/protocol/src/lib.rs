//! # 设备驱动能力模块
//!
//! 提供与控制器通信所需的全部抽象：
//! - **DeviceDriver / DeviceLink**：驱动接口，由具体协议实现
//! - **DeviceSession**：单控制器会话，负责超时、状态与故障上报
//! - **DriverRegistry**：控制器系列 → 驱动
//!
//! ## 架构设计
//!
//! ```text
//! Poller
//!   │
//!   ▼
//! DeviceSession (connect / read_batch / health_check / close)
//!   │
//!   ▼
//! DeviceDriver ──► DeviceLink
//!   ├── ModbusTcpDriver
//!   └── SimulatedDriver
//! ```
//!
//! ## 失败语义
//!
//! - 点位级失败（异常码、解码失败）：放在批量结果中，不影响其他点位
//! - 链路级失败（连接重置、超时）：会话进入 `Faulted`，返回 `DeviceError::Unavailable`
//! - 会话本身从不重试，重试策略属于 Poller

mod driver;
mod error;
mod modbus_tcp;
mod session;
mod simulated;
mod types;

pub use driver::{DeviceDriver, DeviceLink, DriverRegistry, TagOutcome, TagRequest};
pub use error::{DeviceError, ProtocolError, ReadError};
pub use modbus_tcp::ModbusTcpDriver;
pub use session::{BatchResult, DeviceSession, SessionTimeouts};
pub use simulated::{SimulatedDriver, SimulatedPlc};
pub use types::{ModbusAddress, ModbusArea, decode_bits, decode_registers, register_count};
