//! 设备驱动接口与按控制器系列的驱动注册表。

use crate::error::ProtocolError;
use async_trait::async_trait;
use domain::{ConnectionDescriptor, ControllerFamily, DataType, TagValue};
use std::collections::HashMap;
use std::sync::Arc;

/// 批量读取中的单个点位请求。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRequest {
    pub name: String,
    pub data_type: DataType,
}

impl TagRequest {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// 单个点位的读取结果；`Err` 为点位级失败原因。
pub type TagOutcome = Result<TagValue, String>;

/// 设备驱动：按描述建立链路。
#[async_trait]
pub trait DeviceDriver: Send + Sync {
    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Box<dyn DeviceLink>, ProtocolError>;
}

/// 已建立的设备链路。
///
/// `read_batch` 返回 `Err` 表示链路整体失效；点位级失败放在结果里。
#[async_trait]
pub trait DeviceLink: Send {
    async fn read_batch(
        &mut self,
        tags: &[TagRequest],
    ) -> Result<Vec<(String, TagOutcome)>, ProtocolError>;

    /// 轻量存活探测（读取固定身份属性）。
    async fn ping(&mut self) -> Result<(), ProtocolError>;

    async fn close(&mut self) -> Result<(), ProtocolError>;
}

/// 控制器系列 → 驱动。
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: HashMap<ControllerFamily, Arc<dyn DeviceDriver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, family: ControllerFamily, driver: Arc<dyn DeviceDriver>) {
        self.drivers.insert(family, driver);
    }

    pub fn with(mut self, family: ControllerFamily, driver: Arc<dyn DeviceDriver>) -> Self {
        self.register(family, driver);
        self
    }

    pub fn get(&self, family: ControllerFamily) -> Option<Arc<dyn DeviceDriver>> {
        self.drivers.get(&family).cloned()
    }

    pub fn supports(&self, family: ControllerFamily) -> bool {
        self.drivers.contains_key(&family)
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("families", &self.drivers.keys().collect::<Vec<_>>())
            .finish()
    }
}
