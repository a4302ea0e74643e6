use async_trait::async_trait;
use domain::{Reading, TagValue};
use plc_pipeline::{SampleSink, SinkConfig, SinkError, SinkFailureKind};
use plc_storage::{
    HistoricalStore, InMemoryHistoricalStore, InMemoryRealtimeStore, RealtimeStore, StorageError,
};
use plc_telemetry::{CollectorEvent, EventBus, StorageView};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn config() -> SinkConfig {
    SinkConfig {
        capacity: 64,
        batch_size: 16,
        max_wait: Duration::from_millis(50),
        submit_timeout: Duration::from_millis(20),
        max_retries: 2,
        retry_delay: Duration::from_millis(10),
    }
}

/// 记录每批大小，可按次数注入失败。
#[derive(Default)]
struct RecordingHistorical {
    inner: InMemoryHistoricalStore,
    batches: Mutex<Vec<usize>>,
    fail_first: AtomicUsize,
}

#[async_trait]
impl HistoricalStore for RecordingHistorical {
    async fn append_historical(&self, readings: &[Reading]) -> Result<usize, StorageError> {
        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::new("transient failure"));
        }
        self.batches.lock().unwrap().push(readings.len());
        self.inner.append_historical(readings).await
    }

    async fn count_historical(&self) -> Result<u64, StorageError> {
        self.inner.count_historical().await
    }
}

/// 永远不返回的历史存储，用于堵住写入任务。
struct StalledHistorical;

#[async_trait]
impl HistoricalStore for StalledHistorical {
    async fn append_historical(&self, _readings: &[Reading]) -> Result<usize, StorageError> {
        std::future::pending().await
    }

    async fn count_historical(&self) -> Result<u64, StorageError> {
        Ok(0)
    }
}

#[tokio::test(start_paused = true)]
async fn failed_readings_reach_historical_only() {
    let historical = Arc::new(InMemoryHistoricalStore::new());
    let realtime = Arc::new(InMemoryRealtimeStore::new());
    let (sink, handle) = SampleSink::spawn(
        historical.clone(),
        realtime.clone(),
        config(),
        EventBus::default(),
    );

    sink.submit(Reading::ok("Line1", "A", TagValue::Integer(1), 5_000))
        .await
        .expect("submit A");
    sink.submit(Reading::failed("Line1", "B", "tag not found", 5_000))
        .await
        .expect("submit B");
    handle.shutdown().await;

    assert_eq!(historical.len(), 2);
    assert!(realtime.get_realtime("Line1", "A").await.unwrap().is_some());
    assert!(realtime.get_realtime("Line1", "B").await.unwrap().is_none());

    let stats = sink.stats("Line1");
    assert_eq!(stats.persisted_historical, 2);
    assert_eq!(stats.persisted_realtime, 1);
    assert_eq!(stats.persist_failures(), 0);
}

#[tokio::test(start_paused = true)]
async fn batches_never_exceed_batch_size() {
    let historical = Arc::new(RecordingHistorical::default());
    let realtime = Arc::new(InMemoryRealtimeStore::new());
    let (sink, handle) = SampleSink::spawn(
        historical.clone(),
        realtime,
        SinkConfig {
            batch_size: 2,
            ..config()
        },
        EventBus::default(),
    );

    for ts in 0..5 {
        sink.submit(Reading::ok("Line1", "A", TagValue::Integer(ts), ts))
            .await
            .expect("submit");
    }
    handle.shutdown().await;

    let batches = historical.batches.lock().unwrap().clone();
    assert_eq!(batches.iter().sum::<usize>(), 5);
    assert!(batches.iter().all(|size| *size <= 2));
}

#[tokio::test(start_paused = true)]
async fn partial_batch_flushes_after_max_wait() {
    let historical = Arc::new(InMemoryHistoricalStore::new());
    let realtime = Arc::new(InMemoryRealtimeStore::new());
    let (sink, handle) = SampleSink::spawn(
        historical.clone(),
        realtime,
        config(),
        EventBus::default(),
    );

    sink.submit(Reading::ok("Line1", "A", TagValue::Integer(1), 1))
        .await
        .expect("submit");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(historical.len(), 1);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn full_queue_drops_with_overflow() {
    let events = EventBus::default();
    let mut receiver = events.subscribe();
    let (sink, _handle) = SampleSink::spawn(
        Arc::new(StalledHistorical),
        Arc::new(InMemoryRealtimeStore::new()),
        SinkConfig {
            capacity: 1,
            batch_size: 1,
            ..config()
        },
        events,
    );

    sink.submit(Reading::ok("Line1", "A", TagValue::Integer(1), 1))
        .await
        .expect("first");
    // 让写入任务取走第一条并卡在存储上
    tokio::time::sleep(Duration::from_millis(1)).await;
    sink.submit(Reading::ok("Line1", "A", TagValue::Integer(2), 2))
        .await
        .expect("second fills queue");

    let err = sink
        .submit(Reading::ok("Line1", "A", TagValue::Integer(3), 3))
        .await
        .expect_err("overflow");
    assert_eq!(
        err,
        SinkError::Overflow {
            plc: "Line1".to_string(),
            tag: "A".to_string()
        }
    );

    let stats = sink.stats("Line1");
    assert_eq!(stats.overflows, 1);
    assert_eq!(
        stats.last_failure.map(|failure| failure.kind),
        Some(SinkFailureKind::Overflow)
    );
    assert_eq!(
        receiver.recv().await.expect("event"),
        CollectorEvent::SinkOverflow {
            plc: "Line1".to_string(),
            tag: "A".to_string()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried() {
    let historical = Arc::new(RecordingHistorical::default());
    historical.fail_first.store(2, Ordering::SeqCst);
    let (sink, handle) = SampleSink::spawn(
        historical.clone(),
        Arc::new(InMemoryRealtimeStore::new()),
        config(),
        EventBus::default(),
    );

    sink.submit(Reading::ok("Line1", "A", TagValue::Integer(1), 1))
        .await
        .expect("submit");
    handle.shutdown().await;

    assert_eq!(historical.inner.len(), 1);
    let stats = sink.stats("Line1");
    assert_eq!(stats.persisted_historical, 1);
    assert_eq!(stats.historical_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_report_each_reading() {
    let events = EventBus::default();
    let mut receiver = events.subscribe();
    let historical = Arc::new(InMemoryHistoricalStore::new());
    historical.set_failing(true);
    let realtime = Arc::new(InMemoryRealtimeStore::new());
    let (sink, handle) = SampleSink::spawn(
        historical.clone(),
        realtime.clone(),
        config(),
        events,
    );

    sink.submit(Reading::ok("Line1", "A", TagValue::Float(2.5), 10))
        .await
        .expect("submit");
    handle.shutdown().await;

    // 历史视图失败不影响实时视图的写入
    assert!(realtime.get_realtime("Line1", "A").await.unwrap().is_some());
    let stats = sink.stats("Line1");
    assert_eq!(stats.historical_failures, 1);
    assert_eq!(stats.persisted_realtime, 1);
    assert_eq!(
        stats.last_failure.map(|failure| failure.kind),
        Some(SinkFailureKind::PersistFailed)
    );

    match receiver.recv().await.expect("event") {
        CollectorEvent::PersistFailed { plc, tag, view, .. } => {
            assert_eq!(plc, "Line1");
            assert_eq!(tag, "A");
            assert_eq!(view, StorageView::Historical);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn concurrent_submissions_keep_latest_timestamp() {
    let historical = Arc::new(InMemoryHistoricalStore::new());
    let realtime = Arc::new(InMemoryRealtimeStore::new());
    let (sink, handle) = SampleSink::spawn(
        historical.clone(),
        realtime.clone(),
        SinkConfig {
            batch_size: 3,
            ..config()
        },
        EventBus::default(),
    );

    let mut tasks = Vec::new();
    for ts in [7_i64, 3, 10, 1, 9, 4, 2, 8, 6, 5] {
        let sink = sink.clone();
        tasks.push(tokio::spawn(async move {
            sink.submit(Reading::ok("Line1", "A", TagValue::Integer(ts), ts))
                .await
        }));
    }
    for task in tasks {
        task.await.expect("join").expect("submit");
    }
    handle.shutdown().await;

    assert_eq!(historical.len(), 10);
    assert_eq!(realtime.len(), 1);
    let record = realtime
        .get_realtime("Line1", "A")
        .await
        .expect("get")
        .expect("record");
    assert_eq!(record.ts_ms, 10);
    assert_eq!(record.value, TagValue::Integer(10));
}

#[tokio::test]
async fn submit_after_shutdown_is_rejected() {
    let (sink, handle) = SampleSink::spawn(
        Arc::new(InMemoryHistoricalStore::new()),
        Arc::new(InMemoryRealtimeStore::new()),
        config(),
        EventBus::default(),
    );
    handle.shutdown().await;
    let err = sink
        .submit(Reading::ok("Line1", "A", TagValue::Integer(1), 1))
        .await
        .expect_err("closed");
    assert_eq!(err, SinkError::Closed);
}

#[tokio::test(start_paused = true)]
async fn cancelled_submit_gives_up_without_waiting_out_timeout() {
    let events = EventBus::default();
    let (sink, _handle) = SampleSink::spawn(
        Arc::new(StalledHistorical),
        Arc::new(InMemoryRealtimeStore::new()),
        SinkConfig {
            capacity: 1,
            batch_size: 1,
            submit_timeout: Duration::from_secs(30),
            ..config()
        },
        events,
    );
    let cancel = CancellationToken::new();

    sink.submit_or_cancel(Reading::ok("Line1", "A", TagValue::Integer(1), 1), &cancel)
        .await
        .expect("first");
    tokio::time::sleep(Duration::from_millis(1)).await;
    sink.submit_or_cancel(Reading::ok("Line1", "A", TagValue::Integer(2), 2), &cancel)
        .await
        .expect("second fills queue");

    let stopper = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        stopper.cancel();
    });
    let started = tokio::time::Instant::now();
    let err = sink
        .submit_or_cancel(Reading::ok("Line1", "B", TagValue::Integer(3), 3), &cancel)
        .await
        .expect_err("cancelled");
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(
        err,
        SinkError::Overflow {
            plc: "Line1".to_string(),
            tag: "B".to_string()
        }
    );
    assert_eq!(sink.stats("Line1").overflows, 1);
}
