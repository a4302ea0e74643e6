use crate::stats::{SinkFailure, SinkFailureKind, SinkStats, StatsTable};
use domain::{Reading, now_epoch_ms};
use plc_storage::{HistoricalStore, RealtimeStore, StorageError};
use plc_telemetry::{CollectorEvent, EventBus, StorageView, record_persisted, record_write_batch};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Sink 参数。
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// 入口队列容量
    pub capacity: usize,
    /// 单批最多条数
    pub batch_size: usize,
    /// 凑批最长等待
    pub max_wait: Duration,
    /// 队列满时 submit 最长阻塞
    pub submit_timeout: Duration,
    /// 首次写入失败后的重试次数
    pub max_retries: usize,
    pub retry_delay: Duration,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            batch_size: 200,
            max_wait: Duration::from_millis(500),
            submit_timeout: Duration::from_millis(200),
            max_retries: 3,
            retry_delay: Duration::from_millis(200),
        }
    }
}

impl SinkConfig {
    fn sanitized(mut self) -> Self {
        if self.batch_size == 0 {
            self.batch_size = 1;
        }
        if self.capacity < self.batch_size {
            self.capacity = self.batch_size;
        }
        self
    }
}

/// Sink 提交错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("sink overflow: {plc}/{tag} dropped")]
    Overflow { plc: String, tag: String },
    #[error("sink closed")]
    Closed,
}

/// 采集结果入口，可被多个 Poller 并发克隆使用。
#[derive(Debug, Clone)]
pub struct SampleSink {
    sender: mpsc::Sender<Reading>,
    submit_timeout: Duration,
    stats: StatsTable,
    events: EventBus,
}

/// Sink 后台任务句柄，用于停机时排空队列。
#[derive(Debug)]
pub struct SinkHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl SampleSink {
    /// 启动写入任务，返回入口与任务句柄。
    pub fn spawn(
        historical: Arc<dyn HistoricalStore>,
        realtime: Arc<dyn RealtimeStore>,
        config: SinkConfig,
        events: EventBus,
    ) -> (SampleSink, SinkHandle) {
        let config = config.sanitized();
        let (sender, receiver) = mpsc::channel(config.capacity);
        let stats = StatsTable::default();
        let cancel = CancellationToken::new();
        let worker = DrainWorker {
            receiver,
            historical,
            realtime,
            config: config.clone(),
            stats: stats.clone(),
            events: events.clone(),
        };
        let join = tokio::spawn(worker.run(cancel.clone()));
        let sink = SampleSink {
            sender,
            submit_timeout: config.submit_timeout,
            stats,
            events,
        };
        (sink, SinkHandle { cancel, join })
    }

    /// 投递一条读数。
    ///
    /// 队列满时最多阻塞 `submit_timeout`，超时后丢弃并计为溢出。
    pub async fn submit(&self, reading: Reading) -> Result<(), SinkError> {
        match self.sender.send_timeout(reading, self.submit_timeout).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(reading)) => {
                let message = format!("queue full for {}ms", self.submit_timeout.as_millis());
                Err(self.discard(reading, message))
            }
            Err(SendTimeoutError::Closed(_)) => Err(SinkError::Closed),
        }
    }

    /// 与 `submit` 相同，但 `cancel` 触发时立即放弃等待。
    ///
    /// 队列有空位时总是先入队；被取消而没能入队的读数同样计为溢出。
    pub async fn submit_or_cancel(
        &self,
        reading: Reading,
        cancel: &CancellationToken,
    ) -> Result<(), SinkError> {
        let reserved = tokio::select! {
            biased;
            reserved = timeout(self.submit_timeout, self.sender.reserve()) => reserved,
            _ = cancel.cancelled() => {
                return Err(self.discard(reading, "poller stopped before queueing".to_string()));
            }
        };
        match reserved {
            Ok(Ok(permit)) => {
                permit.send(reading);
                Ok(())
            }
            Ok(Err(_)) => Err(SinkError::Closed),
            Err(_) => {
                let message = format!("queue full for {}ms", self.submit_timeout.as_millis());
                Err(self.discard(reading, message))
            }
        }
    }

    fn discard(&self, reading: Reading, message: String) -> SinkError {
        warn!(
            target: "plc.sink",
            plc = %reading.plc_name,
            tag = %reading.tag_name,
            "reading dropped: {}",
            message
        );
        self.stats.update(&reading.plc_name, |stats| {
            stats.overflows += 1;
            stats.last_failure = Some(SinkFailure {
                kind: SinkFailureKind::Overflow,
                message,
                at_ms: now_epoch_ms(),
            });
        });
        self.events.emit(CollectorEvent::SinkOverflow {
            plc: reading.plc_name.clone(),
            tag: reading.tag_name.clone(),
        });
        SinkError::Overflow {
            plc: reading.plc_name,
            tag: reading.tag_name,
        }
    }

    pub fn stats(&self, plc_name: &str) -> SinkStats {
        self.stats.get(plc_name)
    }

    /// 当前排队的读数数量
    pub fn queued(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }
}

impl SinkHandle {
    /// 停止接收新读数，写完已排队的读数后返回。
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(err) = self.join.await {
            warn!(target: "plc.sink", error = %err, "sink worker ended abnormally");
        }
    }
}

struct DrainWorker {
    receiver: mpsc::Receiver<Reading>,
    historical: Arc<dyn HistoricalStore>,
    realtime: Arc<dyn RealtimeStore>,
    config: SinkConfig,
    stats: StatsTable,
    events: EventBus,
}

impl DrainWorker {
    async fn run(mut self, cancel: CancellationToken) {
        let mut batch = Vec::with_capacity(self.config.batch_size);
        loop {
            let first = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                received = self.receiver.recv() => received,
            };
            let Some(first) = first else {
                break;
            };
            batch.push(first);

            let deadline = Instant::now() + self.config.max_wait;
            while batch.len() < self.config.batch_size {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    next = timeout_at(deadline, self.receiver.recv()) => next,
                };
                match next {
                    Ok(Some(reading)) => batch.push(reading),
                    Ok(None) | Err(_) => break,
                }
            }
            self.persist(std::mem::take(&mut batch)).await;
        }

        // 停机：拒绝新读数，把已排队的写完
        self.receiver.close();
        let mut drained = 0usize;
        while let Some(reading) = self.receiver.recv().await {
            batch.push(reading);
            drained += 1;
            if batch.len() >= self.config.batch_size {
                self.persist(std::mem::take(&mut batch)).await;
            }
        }
        if !batch.is_empty() {
            self.persist(std::mem::take(&mut batch)).await;
        }
        info!(target: "plc.sink", drained, "sink drained");
    }

    async fn persist(&self, batch: Vec<Reading>) {
        if batch.is_empty() {
            return;
        }
        let started = Instant::now();
        let realtime_candidates: Vec<Reading> = batch
            .iter()
            .filter(|reading| reading.success && reading.value.is_some())
            .cloned()
            .collect();

        let historical = self.historical.as_ref();
        let readings = batch.as_slice();
        let historical_result = self
            .with_retry(StorageView::Historical, move || {
                historical.append_historical(readings)
            })
            .await;
        self.settle(StorageView::Historical, &batch, historical_result);

        if !realtime_candidates.is_empty() {
            let realtime = self.realtime.as_ref();
            let candidates = realtime_candidates.as_slice();
            let realtime_result = self
                .with_retry(StorageView::Realtime, move || {
                    realtime.upsert_realtime(candidates)
                })
                .await;
            self.settle(StorageView::Realtime, &realtime_candidates, realtime_result);
        }

        let latency_ms = started.elapsed().as_millis() as u64;
        record_write_batch(latency_ms);
        debug!(
            target: "plc.sink",
            readings = batch.len(),
            latency_ms,
            "batch persisted"
        );
    }

    async fn with_retry<F, Fut>(&self, view: StorageView, mut op: F) -> Result<(), StorageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<usize, StorageError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(_) => return Ok(()),
                Err(err) => {
                    attempt += 1;
                    if attempt > self.config.max_retries {
                        return Err(err);
                    }
                    warn!(
                        target: "plc.sink",
                        view = %view,
                        attempt,
                        error = %err,
                        "write failed, retrying"
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                }
            }
        }
    }

    fn settle(&self, view: StorageView, readings: &[Reading], result: Result<(), StorageError>) {
        let mut per_plc: HashMap<&str, u64> = HashMap::new();
        for reading in readings {
            *per_plc.entry(reading.plc_name.as_str()).or_default() += 1;
        }
        match result {
            Ok(()) => {
                record_persisted(view, readings.len() as u64);
                for (plc_name, count) in per_plc {
                    self.stats.update(plc_name, |stats| match view {
                        StorageView::Historical => stats.persisted_historical += count,
                        StorageView::Realtime => stats.persisted_realtime += count,
                    });
                }
            }
            Err(err) => {
                let reason = err.to_string();
                warn!(
                    target: "plc.sink",
                    view = %view,
                    readings = readings.len(),
                    error = %reason,
                    "write permanently failed"
                );
                let at_ms = now_epoch_ms();
                for (plc_name, count) in per_plc {
                    self.stats.update(plc_name, |stats| {
                        match view {
                            StorageView::Historical => stats.historical_failures += count,
                            StorageView::Realtime => stats.realtime_failures += count,
                        }
                        stats.last_failure = Some(SinkFailure {
                            kind: SinkFailureKind::PersistFailed,
                            message: format!("{} write failed: {}", view, reason),
                            at_ms,
                        });
                    });
                }
                for reading in readings {
                    self.events.emit(CollectorEvent::PersistFailed {
                        plc: reading.plc_name.clone(),
                        tag: reading.tag_name.clone(),
                        view,
                        reason: reason.clone(),
                    });
                }
            }
        }
    }
}
