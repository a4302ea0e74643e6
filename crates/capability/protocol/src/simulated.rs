//! 仿真驱动：进程内的可编排控制器，用于演示和测试。
//!
//! 可以设定点位值、单点位失败、链路中断、拒绝连接和读取延迟。

use crate::driver::{DeviceDriver, DeviceLink, TagOutcome, TagRequest};
use crate::error::ProtocolError;
use async_trait::async_trait;
use domain::{ConnectionDescriptor, TagValue};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Default)]
struct SimState {
    values: HashMap<String, TagValue>,
    failing: HashMap<String, String>,
    offline: bool,
    refuse_connects: u32,
    generation: u64,
    connects: u64,
    batches: Vec<Vec<String>>,
    generate_missing: bool,
    counter: i64,
    read_delay: Option<Duration>,
}

/// 一台仿真控制器；克隆共享同一状态。
#[derive(Debug, Clone, Default)]
pub struct SimulatedPlc {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedPlc {
    pub fn new() -> Self {
        Self::default()
    }

    /// 未设定的点位返回递增整数，而不是报错。
    pub fn generating() -> Self {
        let plc = Self::default();
        plc.lock().generate_missing = true;
        plc
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_value(&self, tag: impl Into<String>, value: TagValue) {
        self.lock().values.insert(tag.into(), value);
    }

    pub fn fail_tag(&self, tag: impl Into<String>, reason: impl Into<String>) {
        self.lock().failing.insert(tag.into(), reason.into());
    }

    pub fn clear_failure(&self, tag: &str) {
        self.lock().failing.remove(tag);
    }

    /// 离线：拒绝新连接，已有链路全部失效。
    pub fn set_online(&self, online: bool) {
        let mut state = self.lock();
        if !online && !state.offline {
            state.generation += 1;
        }
        state.offline = !online;
    }

    /// 断开已有链路，但仍接受新连接（模拟网线抖动）。
    pub fn drop_link(&self) {
        self.lock().generation += 1;
    }

    /// 拒绝接下来的 `count` 次连接。
    pub fn refuse_connects(&self, count: u32) {
        self.lock().refuse_connects = count;
    }

    pub fn set_read_delay(&self, delay: Option<Duration>) {
        self.lock().read_delay = delay;
    }

    pub fn connect_count(&self) -> u64 {
        self.lock().connects
    }

    /// 每次批量读取请求的点位名（按请求顺序）。
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.lock().batches.clone()
    }

    fn accept(&self) -> Result<u64, ProtocolError> {
        let mut state = self.lock();
        state.connects += 1;
        if state.offline {
            return Err(ProtocolError::Connection("controller offline".to_string()));
        }
        if state.refuse_connects > 0 {
            state.refuse_connects -= 1;
            return Err(ProtocolError::Connection("connection refused".to_string()));
        }
        Ok(state.generation)
    }
}

/// 仿真驱动：按地址查找仿真控制器。
#[derive(Debug, Default)]
pub struct SimulatedDriver {
    plcs: Mutex<HashMap<String, SimulatedPlc>>,
    create_on_connect: bool,
}

impl SimulatedDriver {
    /// 只接受已挂接地址的驱动。
    pub fn new() -> Self {
        Self::default()
    }

    /// 对未知地址自动创建 [`SimulatedPlc::generating`] 控制器。
    pub fn generating() -> Self {
        Self {
            plcs: Mutex::new(HashMap::new()),
            create_on_connect: true,
        }
    }

    pub fn attach(&self, address: impl Into<String>, plc: SimulatedPlc) {
        self.plcs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(address.into(), plc);
    }

    fn lookup(&self, address: &str) -> Option<SimulatedPlc> {
        let mut plcs = self.plcs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(plc) = plcs.get(address) {
            return Some(plc.clone());
        }
        if !self.create_on_connect {
            return None;
        }
        let plc = SimulatedPlc::generating();
        plcs.insert(address.to_string(), plc.clone());
        Some(plc)
    }
}

#[async_trait]
impl DeviceDriver for SimulatedDriver {
    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Box<dyn DeviceLink>, ProtocolError> {
        let plc = self.lookup(&descriptor.address).ok_or_else(|| {
            ProtocolError::Connection(format!(
                "no simulated controller at {}",
                descriptor.address
            ))
        })?;
        let generation = plc.accept()?;
        Ok(Box::new(SimulatedLink { plc, generation }))
    }
}

struct SimulatedLink {
    plc: SimulatedPlc,
    generation: u64,
}

impl SimulatedLink {
    fn check(&self, state: &SimState) -> Result<(), ProtocolError> {
        if state.offline || state.generation != self.generation {
            return Err(ProtocolError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceLink for SimulatedLink {
    async fn read_batch(
        &mut self,
        tags: &[TagRequest],
    ) -> Result<Vec<(String, TagOutcome)>, ProtocolError> {
        let delay = self.plc.lock().read_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.plc.lock();
        self.check(&state)?;
        state
            .batches
            .push(tags.iter().map(|tag| tag.name.clone()).collect());

        let mut results = Vec::with_capacity(tags.len());
        for tag in tags {
            let outcome = if let Some(reason) = state.failing.get(&tag.name) {
                Err(reason.clone())
            } else if let Some(value) = state.values.get(&tag.name) {
                Ok(value.clone())
            } else if state.generate_missing {
                state.counter += 1;
                Ok(TagValue::Integer(state.counter))
            } else {
                Err(format!("tag not found: {}", tag.name))
            };
            results.push((tag.name.clone(), outcome));
        }
        Ok(results)
    }

    async fn ping(&mut self) -> Result<(), ProtocolError> {
        let state = self.plc.lock();
        self.check(&state)
    }

    async fn close(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }
}
