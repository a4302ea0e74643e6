use plc_telemetry::{CollectorEvent, EventBus, metrics};

#[tokio::test]
async fn subscribers_receive_emitted_events() {
    let bus = EventBus::new(16);
    let mut rx = bus.subscribe();
    bus.emit(CollectorEvent::ReconnectAttempt {
        plc: "Line1".to_string(),
        attempt: 0,
        delay_ms: 1000,
    });
    let event = rx.recv().await.expect("event");
    assert_eq!(
        event,
        CollectorEvent::ReconnectAttempt {
            plc: "Line1".to_string(),
            attempt: 0,
            delay_ms: 1000,
        }
    );
}

#[test]
fn emit_without_subscribers_still_counts() {
    let bus = EventBus::default();
    let before = metrics().snapshot().sink_overflows;
    bus.emit(CollectorEvent::SinkOverflow {
        plc: "Line1".to_string(),
        tag: "A".to_string(),
    });
    assert!(metrics().snapshot().sink_overflows >= before + 1);
}
