use api_contract::ApiResponse;

#[test]
fn api_response_success() {
    let response = ApiResponse::success("ok");
    assert!(response.success);
    assert!(response.data.is_some());
    assert!(response.error.is_none());
}

#[test]
fn api_response_error() {
    let response = ApiResponse::<()>::error("PLC.NOT_FOUND", "plc not found");
    assert!(!response.success);
    assert!(response.data.is_none());
    let error = response.error.expect("error");
    assert_eq!(error.code, "PLC.NOT_FOUND");
}

#[test]
fn api_response_serializes_null_data_on_error() {
    let response = ApiResponse::<()>::error("INTERNAL.ERROR", "boom");
    let value = serde_json::to_value(response).expect("serialize");
    assert_eq!(value["success"], false);
    assert!(value["data"].is_null());
    assert_eq!(value["error"]["message"], "boom");
}
