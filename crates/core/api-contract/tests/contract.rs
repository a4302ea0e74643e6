use api_contract::{FailureDto, PlcStatusDto, RealtimeQuery, RealtimeValueDto};
use serde_json::{Value, json};

#[test]
fn plc_status_is_camel_case() {
    let status = PlcStatusDto {
        name: "Line1".to_string(),
        address: "192.168.1.10".to_string(),
        family: "control_logix".to_string(),
        state: "polling".to_string(),
        connection: "connected".to_string(),
        last_success_ms: Some(1_700_000_000_000),
        consecutive_failures: 0,
        last_failure: Some(FailureDto {
            class: "read_errors".to_string(),
            message: "1 of 2 tags failed (B: tag not found)".to_string(),
            at_ms: 1_700_000_000_000,
        }),
        reconnect_attempts: 2,
        reads_ok: 10,
        read_errors: 1,
        sink_overflows: 0,
        persisted_historical: 11,
        persisted_realtime: 10,
        persist_failures: 0,
    };
    let value = serde_json::to_value(status).expect("serialize");
    assert!(value.get("lastSuccessMs").is_some());
    assert!(value.get("consecutiveFailures").is_some());
    assert!(value.get("last_success_ms").is_none());
    assert_eq!(value["lastFailure"]["atMs"], 1_700_000_000_000_i64);
}

#[test]
fn realtime_value_keeps_raw_json() {
    let dto = RealtimeValueDto {
        plc_name: "Line1".to_string(),
        tag_name: "A".to_string(),
        value: json!([1, 2, 3]),
        value_type: "array".to_string(),
        ts_ms: 5_000,
        updated_at_ms: 5_010,
    };
    let value = serde_json::to_value(dto).expect("serialize");
    assert_eq!(value["plcName"], "Line1");
    assert_eq!(value["valueType"], "array");
    assert_eq!(value["value"], json!([1, 2, 3]));
    assert!(value.get("updatedAtMs").is_some_and(Value::is_i64));
}

#[test]
fn realtime_query_tag_is_optional() {
    let query: RealtimeQuery = serde_json::from_str(r#"{"plc":"Line1"}"#).expect("parse");
    assert_eq!(query.plc, "Line1");
    assert!(query.tag.is_none());
}
