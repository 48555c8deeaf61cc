//! Verify response classification against JSON test vectors stored in
//! `test-vectors/`.
//!
//! Each case describes a simulated response, the alert flag, and the expected
//! completion outcome plus the alert message (if any). Success values are
//! compared as parsed JSON so field order does not matter.

use std::collections::HashSet;
use std::time::Duration;

use netop_core::response::{resolve, AlertPolicy, Resolution};
use netop_core::{
    CodecError, HttpMethod, HttpRequest, HttpResponse, NetworkError, UnderlyingError,
};

fn request() -> HttpRequest {
    HttpRequest {
        method: HttpMethod::Post,
        url: "https://api.x/users".to_string(),
        headers: Vec::new(),
        body: Some(br#"{"name":"a"}"#.to_vec()),
        timeout: Duration::from_secs(25),
        multipart: false,
    }
}

#[test]
fn response_test_vectors() {
    let raw = include_str!("../../test-vectors/responses.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    let suppressed: HashSet<String> = serde_json::from_value(vectors["suppressed_keys"].clone()).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let sim = &case["response"];
        let response = HttpResponse {
            status: sim["status"].as_u64().map(|s| s as u16),
            headers: Vec::new(),
            body: sim["body"].as_str().unwrap().as_bytes().to_vec(),
        };
        let policy = AlertPolicy {
            enabled: case["alert_on_error"].as_bool().unwrap(),
            suppressed_keys: &suppressed,
        };

        let Resolution { result, alert } =
            resolve::<serde_json::Value>(&request(), Ok(response), policy);

        let expected = &case["expected"];
        assert_eq!(
            alert.as_ref().map(|e| e.message().to_string()),
            expected["alert"].as_str().map(str::to_string),
            "{name}: alert"
        );

        match expected["outcome"].as_str().unwrap() {
            "success" => {
                let value = result.unwrap_or_else(|e| panic!("{name}: unexpected error {e:?}"));
                assert_eq!(value, expected["value"], "{name}: value");
            }
            "service_error" => match result {
                Err(NetworkError::ServiceError(payload)) => assert_eq!(
                    payload.error_key.as_deref(),
                    expected["error_key"].as_str(),
                    "{name}: error key"
                ),
                other => panic!("{name}: expected service error, got {other:?}"),
            },
            "operation_failed" => {
                assert!(matches!(result, Err(NetworkError::OperationFailed)), "{name}: {result:?}")
            }
            "decode_error" => assert!(
                matches!(
                    result,
                    Err(NetworkError::Wrapped(UnderlyingError::Codec(CodecError::Decode(_))))
                ),
                "{name}: {result:?}"
            ),
            other => panic!("{name}: unknown outcome {other}"),
        }
    }
}
