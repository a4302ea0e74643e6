use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// 控制器系列，决定使用哪种设备驱动。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerFamily {
    CompactLogix,
    ControlLogix,
    MicroLogix,
    Micro800,
    ModbusTcp,
    Simulated,
}

impl ControllerFamily {
    /// 未显式配置时的槽号 / 从站号。
    pub fn default_slot(&self) -> Option<u8> {
        match self {
            ControllerFamily::CompactLogix
            | ControllerFamily::ControlLogix
            | ControllerFamily::Micro800 => Some(0),
            ControllerFamily::MicroLogix => None,
            ControllerFamily::ModbusTcp => Some(1),
            ControllerFamily::Simulated => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ControllerFamily::CompactLogix => "compact_logix",
            ControllerFamily::ControlLogix => "control_logix",
            ControllerFamily::MicroLogix => "micro_logix",
            ControllerFamily::Micro800 => "micro800",
            ControllerFamily::ModbusTcp => "modbus_tcp",
            ControllerFamily::Simulated => "simulated",
        }
    }
}

impl fmt::Display for ControllerFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 点位声明类型；`Auto` 交给驱动推断。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    #[default]
    #[serde(alias = "AUTO")]
    Auto,
    Bool,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Float32,
    Float64,
    String,
}

/// 连接描述：地址、控制器系列、槽号 / 从站号。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    /// 主机名或 IP，可带 `:port`。
    pub address: String,
    pub family: ControllerFamily,
    #[serde(default)]
    pub slot: Option<u8>,
}

impl ConnectionDescriptor {
    pub fn new(address: impl Into<String>, family: ControllerFamily) -> Self {
        Self {
            address: address.into(),
            family,
            slot: None,
        }
    }

    pub fn with_slot(mut self, slot: u8) -> Self {
        self.slot = Some(slot);
        self
    }

    /// 显式槽号优先，否则取系列默认值。
    pub fn effective_slot(&self) -> Option<u8> {
        self.slot.or_else(|| self.family.default_slot())
    }
}

/// 单个点位配置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagConfig {
    /// 线上使用的精确名称。
    pub name: String,
    #[serde(default)]
    pub data_type: DataType,
    pub scan_interval_secs: f64,
    #[serde(default)]
    pub description: Option<String>,
}

impl TagConfig {
    pub fn new(name: impl Into<String>, scan_interval_secs: f64) -> Self {
        Self {
            name: name.into(),
            data_type: DataType::Auto,
            scan_interval_secs,
            description: None,
        }
    }

    /// 扫描周期；非法值（≤0、非有限）返回 `None`。
    pub fn scan_interval(&self) -> Option<Duration> {
        if !self.scan_interval_secs.is_finite() || self.scan_interval_secs <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(self.scan_interval_secs).ok()
    }
}

/// 单个 PLC 配置：名称唯一。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlcConfig {
    pub name: String,
    #[serde(flatten)]
    pub descriptor: ConnectionDescriptor,
    pub tags: Vec<TagConfig>,
}

impl PlcConfig {
    pub fn new(
        name: impl Into<String>,
        descriptor: ConnectionDescriptor,
        tags: Vec<TagConfig>,
    ) -> Self {
        Self {
            name: name.into(),
            descriptor,
            tags,
        }
    }
}

/// 设备会话连接状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Faulted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plc_config_from_json() {
        let json = r#"{
            "name": "Line1",
            "address": "192.168.1.10",
            "family": "compact_logix",
            "tags": [
                {"name": "A", "scan_interval_secs": 1.0},
                {"name": "B", "data_type": "AUTO", "scan_interval_secs": 5.0, "description": "flow"}
            ]
        }"#;
        let config: PlcConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.name, "Line1");
        assert_eq!(config.descriptor.family, ControllerFamily::CompactLogix);
        assert_eq!(config.descriptor.effective_slot(), Some(0));
        assert_eq!(config.tags[1].data_type, DataType::Auto);
        assert_eq!(config.tags[1].scan_interval(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn scan_interval_rejects_non_positive() {
        assert!(TagConfig::new("A", 0.0).scan_interval().is_none());
        assert!(TagConfig::new("A", -1.0).scan_interval().is_none());
        assert!(TagConfig::new("A", f64::NAN).scan_interval().is_none());
        assert_eq!(
            TagConfig::new("A", 0.25).scan_interval(),
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn micrologix_has_no_default_slot() {
        let descriptor = ConnectionDescriptor::new("10.0.0.5", ControllerFamily::MicroLogix);
        assert_eq!(descriptor.effective_slot(), None);
        assert_eq!(descriptor.with_slot(2).effective_slot(), Some(2));
    }
}
