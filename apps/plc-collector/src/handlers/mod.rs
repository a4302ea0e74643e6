//! Handlers 模块

pub mod health;
pub mod metrics;
pub mod realtime;
pub mod reload;
pub mod status;

pub use health::*;
pub use metrics::*;
pub use realtime::*;
pub use reload::*;
pub use status::*;
