//! 单个 PLC 的采集循环。
//!
//! 状态机：`Idle → Connecting → Polling → Reconnecting → … → Stopped`。
//! 重连无限重试，直到显式停止；停止信号可以打断 tick 等待、连接和退避睡眠，
//! 正在进行的批量读取会读完（受读超时约束）再退出。
//! 停止后还没进入 Sink 队列的读数计为溢出，不再等待队列空位。

use crate::backoff::Backoff;
use crate::schedule::TagSchedule;
use domain::{ConnectionState, PlcConfig, Reading, now_epoch_ms};
use plc_pipeline::{SampleSink, SinkError};
use plc_protocol::{BatchResult, DeviceDriver, DeviceSession, SessionTimeouts};
use plc_telemetry::{CollectorEvent, EventBus};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Poller 状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollerState {
    Idle,
    Connecting,
    Polling,
    Reconnecting,
    Stopped,
}

/// 失败类别，便于区分设备离线、存储故障和 Sink 过载。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    DeviceOffline,
    ReadErrors,
    SinkOverflow,
    PersistFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub class: FailureClass,
    pub message: String,
    pub at_ms: i64,
}

/// Poller 自身的状态快照。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollerStatus {
    pub state: PollerState,
    pub connection: ConnectionState,
    pub last_success_ms: Option<i64>,
    pub consecutive_failures: u32,
    pub last_failure: Option<FailureRecord>,
    pub reconnect_attempts: u64,
    pub reads_ok: u64,
    pub read_errors: u64,
}

impl Default for PollerStatus {
    fn default() -> Self {
        Self {
            state: PollerState::Idle,
            connection: ConnectionState::Disconnected,
            last_success_ms: None,
            consecutive_failures: 0,
            last_failure: None,
            reconnect_attempts: 0,
            reads_ok: 0,
            read_errors: 0,
        }
    }
}

/// Poller 运行参数。
#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub timeouts: SessionTimeouts,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    pub backoff_jitter: f64,
    /// 连续这么久没有读取时做一次存活探测
    pub health_check_interval: Duration,
    pub min_tick: Duration,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            timeouts: SessionTimeouts::default(),
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(60),
            backoff_jitter: 0.1,
            health_check_interval: Duration::from_secs(30),
            min_tick: Duration::from_millis(100),
        }
    }
}

/// 已启动 Poller 的句柄。
#[derive(Debug)]
pub struct PollerHandle {
    name: String,
    cancel: CancellationToken,
    status: watch::Receiver<PollerStatus>,
    join: JoinHandle<()>,
}

impl PollerHandle {
    pub fn status(&self) -> PollerStatus {
        self.status.borrow().clone()
    }

    /// 请求停止；可重复调用。
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// 等待循环退出（会话已关闭）。
    pub async fn join(self) {
        if let Err(err) = self.join.await {
            warn!(target: "plc.poller", plc = %self.name, error = %err, "poller task ended abnormally");
        }
    }

    pub async fn shutdown(self) {
        self.stop();
        self.join().await;
    }
}

enum PollExit {
    Stopped,
    Unavailable(String),
}

pub struct Poller {
    name: String,
    session: DeviceSession,
    schedule: TagSchedule,
    backoff: Backoff,
    sink: SampleSink,
    events: EventBus,
    health_check_interval: Duration,
    status: watch::Sender<PollerStatus>,
    cancel: CancellationToken,
}

impl Poller {
    pub fn new(
        config: &PlcConfig,
        driver: Arc<dyn DeviceDriver>,
        sink: SampleSink,
        events: EventBus,
        settings: &PollerSettings,
    ) -> (Self, watch::Receiver<PollerStatus>) {
        let (status, receiver) = watch::channel(PollerStatus::default());
        let poller = Self {
            name: config.name.clone(),
            session: DeviceSession::new(
                config.name.clone(),
                config.descriptor.clone(),
                driver,
                settings.timeouts,
            ),
            schedule: TagSchedule::new(&config.tags, settings.min_tick),
            backoff: Backoff::new(settings.backoff_base, settings.backoff_cap)
                .with_jitter(settings.backoff_jitter),
            sink,
            events,
            health_check_interval: settings.health_check_interval,
            status,
            cancel: CancellationToken::new(),
        };
        (poller, receiver)
    }

    /// 在后台启动采集循环。
    pub fn spawn(
        config: &PlcConfig,
        driver: Arc<dyn DeviceDriver>,
        sink: SampleSink,
        events: EventBus,
        settings: &PollerSettings,
    ) -> PollerHandle {
        let (poller, status) = Poller::new(config, driver, sink, events, settings);
        let cancel = poller.cancel.clone();
        let name = poller.name.clone();
        let join = tokio::spawn(poller.run());
        PollerHandle {
            name,
            cancel,
            status,
            join,
        }
    }

    pub async fn run(mut self) {
        info!(
            target: "plc.poller",
            plc = %self.name,
            tags = self.schedule.len(),
            resolution_ms = self.schedule.resolution().as_millis() as u64,
            "poller started"
        );
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            if self.backoff.attempt() == 0 {
                self.set_state(PollerState::Connecting);
            }

            let connected = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                connected = self.session.connect() => connected,
            };
            match connected {
                Ok(()) => {
                    self.backoff.reset();
                    self.events.emit(CollectorEvent::Connected {
                        plc: self.name.clone(),
                    });
                    self.set_state(PollerState::Polling);
                    match self.poll_connected().await {
                        PollExit::Stopped => break,
                        PollExit::Unavailable(reason) => {
                            warn!(target: "plc.poller", plc = %self.name, reason = %reason, "device unavailable");
                            self.events.emit(CollectorEvent::DeviceUnavailable {
                                plc: self.name.clone(),
                                reason: reason.clone(),
                            });
                            self.record_failure(FailureClass::DeviceOffline, reason);
                        }
                    }
                }
                Err(err) => {
                    warn!(target: "plc.poller", plc = %self.name, error = %err, "connect failed");
                    self.record_failure(FailureClass::DeviceOffline, err.to_string());
                }
            }

            self.set_state(PollerState::Reconnecting);
            let attempt = self.backoff.attempt() + 1;
            let delay = self.backoff.next_delay();
            self.status.send_modify(|status| status.reconnect_attempts += 1);
            self.events.emit(CollectorEvent::ReconnectAttempt {
                plc: self.name.clone(),
                attempt,
                delay_ms: delay.as_millis() as u64,
            });
            info!(
                target: "plc.poller",
                plc = %self.name,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "reconnecting"
            );
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = sleep(delay) => {}
            }
        }

        self.session.close().await;
        self.set_state(PollerState::Stopped);
        info!(target: "plc.poller", plc = %self.name, "poller stopped");
    }

    async fn poll_connected(&mut self) -> PollExit {
        let mut ticker = interval(self.schedule.resolution());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tick: u64 = 0;
        let mut last_activity = Instant::now();
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return PollExit::Stopped,
                _ = ticker.tick() => {}
            }

            let due = self.schedule.due_tags(tick);
            tick = tick.wrapping_add(1);
            if due.is_empty() {
                if last_activity.elapsed() >= self.health_check_interval {
                    if !self.session.health_check().await {
                        return PollExit::Unavailable("health check failed".to_string());
                    }
                    debug!(target: "plc.poller", plc = %self.name, "health check ok");
                    last_activity = Instant::now();
                }
                continue;
            }

            let ts_ms = now_epoch_ms();
            match self.session.read_batch(&due).await {
                Ok(batch) => {
                    last_activity = Instant::now();
                    self.emit_batch(batch, ts_ms).await;
                }
                Err(err) => {
                    self.sync_connection();
                    return PollExit::Unavailable(err.to_string());
                }
            }
        }
    }

    async fn emit_batch(&mut self, batch: BatchResult, ts_ms: i64) {
        let total = batch.len();
        let mut failed = 0usize;
        let mut first_reason = None;
        for (tag, result) in batch {
            let reading = match result {
                Ok(value) => {
                    self.events.emit(CollectorEvent::ReadSucceeded {
                        plc: self.name.clone(),
                        tag: tag.clone(),
                        ts_ms,
                    });
                    Reading::ok(self.name.clone(), tag, value, ts_ms)
                }
                Err(err) => {
                    failed += 1;
                    debug!(target: "plc.poller", plc = %self.name, tag = %tag, reason = %err.reason, "tag read failed");
                    self.events.emit(CollectorEvent::ReadFailed {
                        plc: self.name.clone(),
                        tag: tag.clone(),
                        reason: err.reason.clone(),
                    });
                    if first_reason.is_none() {
                        first_reason = Some(format!("{}: {}", tag, err.reason));
                    }
                    Reading::failed(self.name.clone(), tag, err.reason, ts_ms)
                }
            };
            match self.sink.submit_or_cancel(reading, &self.cancel).await {
                Ok(()) => {}
                Err(SinkError::Overflow { .. }) => {}
                Err(SinkError::Closed) => {
                    debug!(target: "plc.poller", plc = %self.name, "sink closed, reading discarded");
                }
            }
        }

        let succeeded = total - failed;
        self.status.send_modify(|status| {
            status.reads_ok += succeeded as u64;
            status.read_errors += failed as u64;
            if succeeded > 0 {
                status.last_success_ms = Some(ts_ms);
                status.consecutive_failures = 0;
            } else {
                status.consecutive_failures = status.consecutive_failures.saturating_add(1);
            }
        });
        if let Some(reason) = first_reason {
            let message = format!("{} of {} tags failed ({})", failed, total, reason);
            self.status.send_modify(|status| {
                status.last_failure = Some(FailureRecord {
                    class: FailureClass::ReadErrors,
                    message,
                    at_ms: now_epoch_ms(),
                });
            });
        }
    }

    fn record_failure(&self, class: FailureClass, message: String) {
        let connection = self.session.state();
        self.status.send_modify(|status| {
            status.connection = connection;
            status.consecutive_failures = status.consecutive_failures.saturating_add(1);
            status.last_failure = Some(FailureRecord {
                class,
                message,
                at_ms: now_epoch_ms(),
            });
        });
    }

    fn sync_connection(&self) {
        let connection = self.session.state();
        self.status.send_modify(|status| status.connection = connection);
    }

    fn set_state(&self, state: PollerState) {
        let connection = self.session.state();
        self.status.send_modify(|status| {
            status.state = state;
            status.connection = connection;
        });
    }
}
