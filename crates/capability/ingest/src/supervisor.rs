//! PLC 集合的生命周期管理。
//!
//! Supervisor 独占「当前运行的 PLC 集合」，所有查询都通过快照完成。
//! PLC 名称是唯一约束：重复或已在运行的名称在启动前被拒绝。
//!
//! start / reload / stop_all 通过 `lifecycle` 串行执行；等待 Poller 退出时
//! 不持有 `running`，状态查询不会被停机过程阻塞。

use crate::poller::{FailureClass, FailureRecord, Poller, PollerHandle, PollerSettings, PollerState};
use domain::{ConnectionState, ControllerFamily, PlcConfig, ValidationError, validate_plc_set};
use plc_pipeline::{SampleSink, SinkFailureKind};
use plc_protocol::DriverRegistry;
use plc_telemetry::{CollectorEvent, EventBus};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::{Mutex, broadcast};
use tracing::info;

/// Supervisor 错误：均为启动前检测到的配置问题。
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),
    #[error("no driver registered for {family} (plc {plc})")]
    UnsupportedFamily { plc: String, family: ControllerFamily },
    #[error("plc already running: {0}")]
    AlreadyRunning(String),
}

/// 单个 PLC 的聚合状态（Poller + Sink）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlcStatus {
    pub name: String,
    pub address: String,
    pub family: ControllerFamily,
    pub state: PollerState,
    pub connection: ConnectionState,
    pub last_success_ms: Option<i64>,
    pub consecutive_failures: u32,
    pub last_failure: Option<FailureRecord>,
    pub reconnect_attempts: u64,
    pub reads_ok: u64,
    pub read_errors: u64,
    pub sink_overflows: u64,
    pub persisted_historical: u64,
    pub persisted_realtime: u64,
    pub persist_failures: u64,
}

/// reload 的结果。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReloadSummary {
    pub started: Vec<String>,
    pub stopped: Vec<String>,
    pub unchanged: Vec<String>,
}

struct RunningPlc {
    config: PlcConfig,
    handle: PollerHandle,
}

pub struct Supervisor {
    registry: DriverRegistry,
    sink: SampleSink,
    events: EventBus,
    settings: PollerSettings,
    lifecycle: Mutex<()>,
    running: Mutex<HashMap<String, RunningPlc>>,
}

impl Supervisor {
    pub fn new(
        registry: DriverRegistry,
        sink: SampleSink,
        events: EventBus,
        settings: PollerSettings,
    ) -> Self {
        Self {
            registry,
            sink,
            events,
            settings,
            lifecycle: Mutex::new(()),
            running: Mutex::new(HashMap::new()),
        }
    }

    /// 为每个 PLC 启动一个 Poller，不等待连接建立。
    ///
    /// 任何配置问题都会在启动第一个 Poller 之前返回错误。
    pub async fn start(&self, configs: Vec<PlcConfig>) -> Result<(), SupervisorError> {
        self.check(&configs)?;
        let _lifecycle = self.lifecycle.lock().await;
        let mut running = self.running.lock().await;
        if let Some(config) = configs.iter().find(|config| running.contains_key(&config.name)) {
            return Err(SupervisorError::AlreadyRunning(config.name.clone()));
        }
        for config in configs {
            self.launch(&mut running, config)?;
        }
        Ok(())
    }

    /// 聚合状态快照，可与运行中的 Poller 并发调用。
    pub async fn status(&self) -> BTreeMap<String, PlcStatus> {
        let running = self.running.lock().await;
        running
            .iter()
            .map(|(name, plc)| (name.clone(), self.merge_status(plc)))
            .collect()
    }

    /// 停止全部 Poller，等它们关闭会话后返回。
    pub async fn stop_all(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        let drained: Vec<RunningPlc> = {
            let mut running = self.running.lock().await;
            running.drain().map(|(_, plc)| plc).collect()
        };
        if drained.is_empty() {
            return;
        }
        let count = drained.len();
        for plc in &drained {
            plc.handle.stop();
        }
        for plc in drained {
            plc.handle.join().await;
        }
        info!(target: "plc.supervisor", count, "all pollers stopped");
    }

    /// 应用新的 PLC 集合：删除或变更的先停，新增或变更的再启，未变更的不动。
    ///
    /// 正在停止的 PLC 从状态快照中移除，等它们退出后再启动替代者。
    pub async fn reload(&self, configs: Vec<PlcConfig>) -> Result<ReloadSummary, SupervisorError> {
        self.check(&configs)?;
        let _lifecycle = self.lifecycle.lock().await;
        let mut summary = ReloadSummary::default();

        let wanted: HashMap<&str, &PlcConfig> = configs
            .iter()
            .map(|config| (config.name.as_str(), config))
            .collect();
        let stopping: Vec<RunningPlc> = {
            let mut running = self.running.lock().await;
            let to_stop: Vec<String> = running
                .iter()
                .filter(|(name, plc)| wanted.get(name.as_str()) != Some(&&plc.config))
                .map(|(name, _)| name.clone())
                .collect();
            to_stop
                .iter()
                .filter_map(|name| running.remove(name))
                .collect()
        };
        for plc in &stopping {
            plc.handle.stop();
        }
        for plc in stopping {
            summary.stopped.push(plc.config.name.clone());
            plc.handle.join().await;
        }

        let mut running = self.running.lock().await;
        for config in configs {
            if running.contains_key(&config.name) {
                summary.unchanged.push(config.name.clone());
                continue;
            }
            summary.started.push(config.name.clone());
            self.launch(&mut running, config)?;
        }
        summary.started.sort();
        summary.stopped.sort();
        summary.unchanged.sort();
        info!(
            target: "plc.supervisor",
            started = summary.started.len(),
            stopped = summary.stopped.len(),
            unchanged = summary.unchanged.len(),
            "configuration reloaded"
        );
        Ok(summary)
    }

    /// 订阅采集事件流。
    pub fn subscribe(&self) -> broadcast::Receiver<CollectorEvent> {
        self.events.subscribe()
    }

    pub async fn running(&self) -> Vec<String> {
        let running = self.running.lock().await;
        let mut names: Vec<String> = running.keys().cloned().collect();
        names.sort();
        names
    }

    fn check(&self, configs: &[PlcConfig]) -> Result<(), SupervisorError> {
        validate_plc_set(configs)?;
        for config in configs {
            if !self.registry.supports(config.descriptor.family) {
                return Err(SupervisorError::UnsupportedFamily {
                    plc: config.name.clone(),
                    family: config.descriptor.family,
                });
            }
        }
        Ok(())
    }

    fn launch(
        &self,
        running: &mut HashMap<String, RunningPlc>,
        config: PlcConfig,
    ) -> Result<(), SupervisorError> {
        let driver = self.registry.get(config.descriptor.family).ok_or_else(|| {
            SupervisorError::UnsupportedFamily {
                plc: config.name.clone(),
                family: config.descriptor.family,
            }
        })?;
        let handle = Poller::spawn(
            &config,
            driver,
            self.sink.clone(),
            self.events.clone(),
            &self.settings,
        );
        info!(
            target: "plc.supervisor",
            plc = %config.name,
            address = %config.descriptor.address,
            family = %config.descriptor.family,
            tags = config.tags.len(),
            "poller launched"
        );
        running.insert(config.name.clone(), RunningPlc { config, handle });
        Ok(())
    }

    fn merge_status(&self, plc: &RunningPlc) -> PlcStatus {
        let poller = plc.handle.status();
        let sink = self.sink.stats(&plc.config.name);
        let sink_failure = sink.last_failure.as_ref().map(|failure| FailureRecord {
            class: match failure.kind {
                SinkFailureKind::Overflow => FailureClass::SinkOverflow,
                SinkFailureKind::PersistFailed => FailureClass::PersistFailed,
            },
            message: failure.message.clone(),
            at_ms: failure.at_ms,
        });
        let last_failure = match (poller.last_failure, sink_failure) {
            (Some(a), Some(b)) => Some(if b.at_ms > a.at_ms { b } else { a }),
            (a, b) => a.or(b),
        };
        PlcStatus {
            name: plc.config.name.clone(),
            address: plc.config.descriptor.address.clone(),
            family: plc.config.descriptor.family,
            state: poller.state,
            connection: poller.connection,
            last_success_ms: poller.last_success_ms,
            consecutive_failures: poller.consecutive_failures,
            last_failure,
            reconnect_attempts: poller.reconnect_attempts,
            reads_ok: poller.reads_ok,
            read_errors: poller.read_errors,
            sink_overflows: sink.overflows,
            persisted_historical: sink.persisted_historical,
            persisted_realtime: sink.persisted_realtime,
            persist_failures: sink.persist_failures(),
        }
    }
}
