//! 设备会话：一个控制器上的单条逻辑连接。
//!
//! 会话只负责连接、批量读取、存活探测与关闭；任何 I/O 级失败都会让会话
//! 进入 `Faulted` 并返回 [`DeviceError::Unavailable`]，重试策略由 Poller 决定。

use crate::driver::{DeviceDriver, DeviceLink, TagRequest};
use crate::error::{DeviceError, ReadError};
use domain::{ConnectionDescriptor, ConnectionState, TagValue};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// 会话超时配置；每个网络调用都有上限。
#[derive(Debug, Clone, Copy)]
pub struct SessionTimeouts {
    pub connect: Duration,
    pub read: Duration,
    pub health_check: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            read: Duration::from_secs(3),
            health_check: Duration::from_secs(2),
        }
    }
}

/// 一次批量读取的结果，按点位名排序。
pub type BatchResult = BTreeMap<String, Result<TagValue, ReadError>>;

pub struct DeviceSession {
    plc_name: String,
    descriptor: ConnectionDescriptor,
    driver: Arc<dyn DeviceDriver>,
    timeouts: SessionTimeouts,
    link: Option<Box<dyn DeviceLink>>,
    state: ConnectionState,
}

impl DeviceSession {
    pub fn new(
        plc_name: impl Into<String>,
        descriptor: ConnectionDescriptor,
        driver: Arc<dyn DeviceDriver>,
        timeouts: SessionTimeouts,
    ) -> Self {
        Self {
            plc_name: plc_name.into(),
            descriptor,
            driver,
            timeouts,
            link: None,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected && self.link.is_some()
    }

    /// 建立会话；已连接时直接返回成功。
    pub async fn connect(&mut self) -> Result<(), DeviceError> {
        if self.is_connected() {
            return Ok(());
        }
        self.link = None;
        self.state = ConnectionState::Connecting;
        debug!(
            target: "plc.session",
            plc = %self.plc_name,
            address = %self.descriptor.address,
            family = %self.descriptor.family,
            "connecting"
        );
        match timeout(self.timeouts.connect, self.driver.connect(&self.descriptor)).await {
            Ok(Ok(link)) => {
                self.link = Some(link);
                self.state = ConnectionState::Connected;
                info!(
                    target: "plc.session",
                    plc = %self.plc_name,
                    address = %self.descriptor.address,
                    "connected"
                );
                Ok(())
            }
            Ok(Err(err)) => {
                self.state = ConnectionState::Faulted;
                Err(DeviceError::Connection(err.to_string()))
            }
            Err(_) => {
                self.state = ConnectionState::Faulted;
                Err(DeviceError::Connection(format!(
                    "connect timed out after {}ms",
                    self.timeouts.connect.as_millis()
                )))
            }
        }
    }

    /// 批量读取；点位级失败放在结果中，链路失败返回 `Unavailable`。
    ///
    /// 每个请求的点位在结果里都有且仅有一项。
    pub async fn read_batch(&mut self, tags: &[TagRequest]) -> Result<BatchResult, DeviceError> {
        if self.state != ConnectionState::Connected {
            return Err(DeviceError::Unavailable("session not connected".to_string()));
        }
        let Some(link) = self.link.as_mut() else {
            return Err(DeviceError::Unavailable("session not connected".to_string()));
        };
        if tags.is_empty() {
            return Ok(BatchResult::new());
        }

        let outcome = timeout(self.timeouts.read, link.read_batch(tags)).await;
        let results = match outcome {
            Ok(Ok(results)) => results,
            Ok(Err(err)) => return Err(self.fault(err.to_string())),
            Err(_) => {
                let reason = format!(
                    "read timed out after {}ms",
                    self.timeouts.read.as_millis()
                );
                return Err(self.fault(reason));
            }
        };

        let mut batch = BatchResult::new();
        for (name, result) in results {
            let result = result.map_err(|reason| ReadError::new(name.clone(), reason));
            batch.insert(name, result);
        }
        for tag in tags {
            batch.entry(tag.name.clone()).or_insert_with(|| {
                Err(ReadError::new(tag.name.clone(), "no result returned"))
            });
        }
        batch.retain(|name, _| tags.iter().any(|tag| &tag.name == name));
        Ok(batch)
    }

    /// 存活探测；失败会让会话进入 `Faulted`。
    pub async fn health_check(&mut self) -> bool {
        if self.state != ConnectionState::Connected {
            return false;
        }
        let Some(link) = self.link.as_mut() else {
            return false;
        };
        match timeout(self.timeouts.health_check, link.ping()).await {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                self.fault(err.to_string());
                false
            }
            Err(_) => {
                self.fault("health check timed out".to_string());
                false
            }
        }
    }

    /// 释放连接；可重复调用。
    pub async fn close(&mut self) {
        if let Some(mut link) = self.link.take() {
            match timeout(self.timeouts.connect, link.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    debug!(target: "plc.session", plc = %self.plc_name, error = %err, "close failed");
                }
                Err(_) => {
                    debug!(target: "plc.session", plc = %self.plc_name, "close timed out");
                }
            }
            info!(target: "plc.session", plc = %self.plc_name, "disconnected");
        }
        self.state = ConnectionState::Disconnected;
    }

    fn fault(&mut self, reason: String) -> DeviceError {
        warn!(
            target: "plc.session",
            plc = %self.plc_name,
            reason = %reason,
            "session faulted"
        );
        self.link = None;
        self.state = ConnectionState::Faulted;
        DeviceError::Unavailable(reason)
    }
}
