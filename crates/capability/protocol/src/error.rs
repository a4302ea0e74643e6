//! 协议与设备会话错误类型定义

/// 驱动层错误（单次链路操作）。
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// 连接错误
    #[error("connection error: {0}")]
    Connection(String),

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Modbus 传输错误
    #[error("modbus error: {0}")]
    Modbus(String),

    /// 地址 / 配置解析错误
    #[error("config parse error: {0}")]
    ConfigParse(String),
}

/// 设备会话错误：调用方据此决定是否重连。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// 会话建立失败（超时或握手失败）
    #[error("connection error: {0}")]
    Connection(String),

    /// 整个会话失效（链路中断、超时、响应畸形）
    #[error("device unavailable: {0}")]
    Unavailable(String),
}

/// 单个点位读取失败，不影响同批其他点位。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("read error on {tag}: {reason}")]
pub struct ReadError {
    pub tag: String,
    pub reason: String,
}

impl ReadError {
    pub fn new(tag: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            reason: reason.into(),
        }
    }
}
