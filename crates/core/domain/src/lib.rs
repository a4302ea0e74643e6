//! 采集核心领域模型：PLC、点位（tag）、读数（reading）。
//!
//! 所有能力 crate 共享这里的类型；本 crate 不做任何 I/O。

pub mod data;
pub mod plc;
pub mod validation;

pub use data::{Reading, TagValue, now_epoch_ms};
pub use plc::{
    ConnectionDescriptor, ConnectionState, ControllerFamily, DataType, PlcConfig, TagConfig,
};
pub use validation::{ValidationError, validate_plc, validate_plc_set};
