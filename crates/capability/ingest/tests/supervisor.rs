use domain::{
    ConnectionDescriptor, ControllerFamily, PlcConfig, TagConfig, TagValue, ValidationError,
};
use plc_ingest::{FailureClass, PollerSettings, PollerState, Supervisor, SupervisorError};
use plc_pipeline::{SampleSink, SinkConfig, SinkHandle};
use plc_protocol::{DriverRegistry, SessionTimeouts, SimulatedDriver, SimulatedPlc};
use plc_storage::{InMemoryHistoricalStore, InMemoryRealtimeStore};
use plc_telemetry::{CollectorEvent, EventBus};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn settings() -> PollerSettings {
    PollerSettings {
        timeouts: SessionTimeouts {
            connect: Duration::from_millis(500),
            read: Duration::from_millis(500),
            health_check: Duration::from_millis(200),
        },
        backoff_base: Duration::from_secs(1),
        backoff_cap: Duration::from_secs(60),
        backoff_jitter: 0.0,
        health_check_interval: Duration::from_secs(60),
        min_tick: Duration::from_millis(100),
    }
}

fn plc(name: &str, tags: &[(&str, f64)]) -> PlcConfig {
    PlcConfig::new(
        name,
        ConnectionDescriptor::new(format!("sim://{}", name), ControllerFamily::Simulated),
        tags.iter()
            .map(|(tag, secs)| TagConfig::new(*tag, *secs))
            .collect(),
    )
}

struct Harness {
    supervisor: Supervisor,
    sink_handle: SinkHandle,
    driver: Arc<SimulatedDriver>,
    historical: Arc<InMemoryHistoricalStore>,
}

fn harness_with(sink_config: SinkConfig) -> Harness {
    let driver = Arc::new(SimulatedDriver::generating());
    let registry = DriverRegistry::new().with(ControllerFamily::Simulated, driver.clone());
    let historical = Arc::new(InMemoryHistoricalStore::new());
    let events = EventBus::default();
    let (sink, sink_handle) = SampleSink::spawn(
        historical.clone(),
        Arc::new(InMemoryRealtimeStore::new()),
        sink_config,
        events.clone(),
    );
    Harness {
        supervisor: Supervisor::new(registry, sink, events, settings()),
        sink_handle,
        driver,
        historical,
    }
}

fn harness() -> Harness {
    harness_with(SinkConfig {
        max_wait: Duration::from_millis(50),
        ..SinkConfig::default()
    })
}

#[tokio::test(start_paused = true)]
async fn duplicate_tags_fail_before_any_poller_starts() {
    let h = harness();
    let configs = vec![
        plc("Line1", &[("A", 1.0)]),
        plc("Line2", &[("A", 1.0), ("A", 5.0)]),
    ];
    let err = h.supervisor.start(configs).await.expect_err("invalid");
    assert!(matches!(
        err,
        SupervisorError::Validation(ValidationError::DuplicateTag { .. })
    ));
    assert!(h.supervisor.running().await.is_empty());
    h.sink_handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn unregistered_family_is_rejected() {
    let h = harness();
    let mut modbus = plc("Press", &[("hr:0", 1.0)]);
    modbus.descriptor = ConnectionDescriptor::new("10.0.0.5", ControllerFamily::ModbusTcp);
    let err = h
        .supervisor
        .start(vec![plc("Line1", &[("A", 1.0)]), modbus])
        .await
        .expect_err("unsupported");
    assert!(matches!(
        err,
        SupervisorError::UnsupportedFamily {
            family: ControllerFamily::ModbusTcp,
            ..
        }
    ));
    assert!(h.supervisor.running().await.is_empty());
    h.sink_handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn running_name_cannot_start_twice() {
    let h = harness();
    h.supervisor
        .start(vec![plc("Line1", &[("A", 1.0)])])
        .await
        .expect("start");
    let err = h
        .supervisor
        .start(vec![plc("Line1", &[("B", 1.0)])])
        .await
        .expect_err("duplicate");
    assert!(matches!(err, SupervisorError::AlreadyRunning(name) if name == "Line1"));

    h.supervisor.stop_all().await;
    h.sink_handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn status_reports_every_plc_and_stop_all_waits() {
    let h = harness();
    let line2 = SimulatedPlc::new();
    line2.set_value("T", TagValue::Boolean(true));
    h.driver.attach("sim://Line2", line2.clone());

    h.supervisor
        .start(vec![plc("Line1", &[("A", 1.0)]), plc("Line2", &[("T", 0.5)])])
        .await
        .expect("start");
    sleep(Duration::from_millis(2_200)).await;

    let status = h.supervisor.status().await;
    assert_eq!(status.len(), 2);
    for entry in status.values() {
        assert_eq!(entry.state, PollerState::Polling);
        assert!(entry.last_success_ms.is_some());
        assert_eq!(entry.consecutive_failures, 0);
        assert!(entry.last_failure.is_none());
    }
    assert_eq!(status["Line1"].reads_ok, 3);
    assert_eq!(status["Line2"].reads_ok, 5);

    h.supervisor.stop_all().await;
    assert!(h.supervisor.running().await.is_empty());
    assert!(h.supervisor.status().await.is_empty());

    let batches_after_stop = line2.batches().len();
    sleep(Duration::from_secs(2)).await;
    assert_eq!(line2.batches().len(), batches_after_stop);

    h.sink_handle.shutdown().await;
    assert_eq!(h.historical.len(), 8);
}

#[tokio::test(start_paused = true)]
async fn reload_restarts_only_changed_plcs() {
    let h = harness();
    h.supervisor
        .start(vec![
            plc("Line1", &[("A", 1.0)]),
            plc("Line2", &[("B", 1.0)]),
            plc("Line3", &[("C", 1.0)]),
        ])
        .await
        .expect("start");
    sleep(Duration::from_millis(500)).await;

    let summary = h
        .supervisor
        .reload(vec![
            plc("Line1", &[("A", 1.0)]),
            plc("Line2", &[("B", 2.0)]),
            plc("Line4", &[("D", 1.0)]),
        ])
        .await
        .expect("reload");
    assert_eq!(summary.unchanged, vec!["Line1"]);
    assert_eq!(summary.stopped, vec!["Line2", "Line3"]);
    assert_eq!(summary.started, vec!["Line2", "Line4"]);
    assert_eq!(
        h.supervisor.running().await,
        vec!["Line1", "Line2", "Line4"]
    );

    let err = h
        .supervisor
        .reload(vec![plc("Line1", &[("A", 0.0)])])
        .await
        .expect_err("invalid interval");
    assert!(matches!(err, SupervisorError::Validation(_)));
    assert_eq!(h.supervisor.running().await.len(), 3);

    h.supervisor.stop_all().await;
    h.sink_handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn status_stays_available_while_reload_waits_for_stop() {
    let h = harness();
    let slow = SimulatedPlc::generating();
    slow.set_read_delay(Some(Duration::from_millis(400)));
    h.driver.attach("sim://Line1", slow);
    h.supervisor
        .start(vec![plc("Line1", &[("A", 1.0)]), plc("Line2", &[("B", 1.0)])])
        .await
        .expect("start");
    // Line1 的首次读取此时正在进行
    sleep(Duration::from_millis(50)).await;

    let (summary, snapshot) = tokio::join!(
        h.supervisor.reload(vec![
            plc("Line1", &[("A", 2.0)]),
            plc("Line2", &[("B", 1.0)]),
        ]),
        async {
            sleep(Duration::from_millis(10)).await;
            tokio::time::timeout(Duration::from_millis(50), h.supervisor.status()).await
        }
    );
    let snapshot = snapshot.expect("status must not wait for the stopping poller");
    assert!(snapshot.contains_key("Line2"));
    assert!(!snapshot.contains_key("Line1"));

    let summary = summary.expect("reload");
    assert_eq!(summary.stopped, vec!["Line1"]);
    assert_eq!(summary.started, vec!["Line1"]);
    assert_eq!(h.supervisor.running().await, vec!["Line1", "Line2"]);

    h.supervisor.stop_all().await;
    h.sink_handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn status_surfaces_storage_failures() {
    let h = harness_with(SinkConfig {
        max_wait: Duration::from_millis(50),
        max_retries: 0,
        ..SinkConfig::default()
    });
    h.historical.set_failing(true);
    h.supervisor
        .start(vec![plc("Line1", &[("A", 1.0)])])
        .await
        .expect("start");
    sleep(Duration::from_millis(1_500)).await;

    let status = h.supervisor.status().await;
    let line1 = &status["Line1"];
    assert_eq!(line1.state, PollerState::Polling);
    assert!(line1.persist_failures >= 1);
    assert_eq!(
        line1.last_failure.as_ref().map(|failure| failure.class),
        Some(FailureClass::PersistFailed)
    );

    h.supervisor.stop_all().await;
    h.sink_handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn subscribers_see_connection_events() {
    let h = harness();
    let mut events = h.supervisor.subscribe();
    h.supervisor
        .start(vec![plc("Line1", &[("A", 1.0)])])
        .await
        .expect("start");

    let first = events.recv().await.expect("event");
    assert_eq!(
        first,
        CollectorEvent::Connected {
            plc: "Line1".to_string()
        }
    );

    h.supervisor.stop_all().await;
    h.sink_handle.shutdown().await;
}
