//! 追踪初始化、进程级计数器与采集事件流。

use serde::Serialize;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 持久化视图。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageView {
    Historical,
    Realtime,
}

impl std::fmt::Display for StorageView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageView::Historical => f.write_str("historical"),
            StorageView::Realtime => f.write_str("realtime"),
        }
    }
}

/// 采集事件：供日志 / 监控层订阅。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CollectorEvent {
    Connected {
        plc: String,
    },
    ReadSucceeded {
        plc: String,
        tag: String,
        ts_ms: i64,
    },
    ReadFailed {
        plc: String,
        tag: String,
        reason: String,
    },
    DeviceUnavailable {
        plc: String,
        reason: String,
    },
    ReconnectAttempt {
        plc: String,
        attempt: u32,
        delay_ms: u64,
    },
    SinkOverflow {
        plc: String,
        tag: String,
    },
    PersistFailed {
        plc: String,
        tag: String,
        view: StorageView,
        reason: String,
    },
}

/// 计数器快照。
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MetricsSnapshot {
    pub reads_ok: u64,
    pub read_errors: u64,
    pub device_unavailable: u64,
    pub reconnect_attempts: u64,
    pub sink_overflows: u64,
    pub persisted_historical: u64,
    pub persisted_realtime: u64,
    pub persist_failures: u64,
    pub write_batches: u64,
    pub write_latency_ms_total: u64,
    pub write_latency_ms_count: u64,
}

/// 进程级计数器。
pub struct TelemetryMetrics {
    reads_ok: AtomicU64,
    read_errors: AtomicU64,
    device_unavailable: AtomicU64,
    reconnect_attempts: AtomicU64,
    sink_overflows: AtomicU64,
    persisted_historical: AtomicU64,
    persisted_realtime: AtomicU64,
    persist_failures: AtomicU64,
    write_batches: AtomicU64,
    write_latency_ms_total: AtomicU64,
    write_latency_ms_count: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            reads_ok: AtomicU64::new(0),
            read_errors: AtomicU64::new(0),
            device_unavailable: AtomicU64::new(0),
            reconnect_attempts: AtomicU64::new(0),
            sink_overflows: AtomicU64::new(0),
            persisted_historical: AtomicU64::new(0),
            persisted_realtime: AtomicU64::new(0),
            persist_failures: AtomicU64::new(0),
            write_batches: AtomicU64::new(0),
            write_latency_ms_total: AtomicU64::new(0),
            write_latency_ms_count: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            reads_ok: self.reads_ok.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            device_unavailable: self.device_unavailable.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            sink_overflows: self.sink_overflows.load(Ordering::Relaxed),
            persisted_historical: self.persisted_historical.load(Ordering::Relaxed),
            persisted_realtime: self.persisted_realtime.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            write_batches: self.write_batches.load(Ordering::Relaxed),
            write_latency_ms_total: self.write_latency_ms_total.load(Ordering::Relaxed),
            write_latency_ms_count: self.write_latency_ms_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录持久化成功条数。
pub fn record_persisted(view: StorageView, count: u64) {
    let metrics = metrics();
    match view {
        StorageView::Historical => metrics
            .persisted_historical
            .fetch_add(count, Ordering::Relaxed),
        StorageView::Realtime => metrics
            .persisted_realtime
            .fetch_add(count, Ordering::Relaxed),
    };
}

/// 记录一次批量写入及其耗时（毫秒）。
pub fn record_write_batch(latency_ms: u64) {
    let metrics = metrics();
    metrics.write_batches.fetch_add(1, Ordering::Relaxed);
    metrics
        .write_latency_ms_total
        .fetch_add(latency_ms, Ordering::Relaxed);
    metrics
        .write_latency_ms_count
        .fetch_add(1, Ordering::Relaxed);
}

fn record_event(event: &CollectorEvent) {
    let metrics = metrics();
    let counter = match event {
        CollectorEvent::Connected { .. } => return,
        CollectorEvent::ReadSucceeded { .. } => &metrics.reads_ok,
        CollectorEvent::ReadFailed { .. } => &metrics.read_errors,
        CollectorEvent::DeviceUnavailable { .. } => &metrics.device_unavailable,
        CollectorEvent::ReconnectAttempt { .. } => &metrics.reconnect_attempts,
        CollectorEvent::SinkOverflow { .. } => &metrics.sink_overflows,
        CollectorEvent::PersistFailed { .. } => &metrics.persist_failures,
    };
    counter.fetch_add(1, Ordering::Relaxed);
}

/// 采集事件总线：计数 + 广播。
///
/// 无订阅者时事件只计数；慢订阅者会收到 `Lagged`。
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CollectorEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn emit(&self, event: CollectorEvent) {
        record_event(&event);
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CollectorEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
