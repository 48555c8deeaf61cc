//! Operations against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port and drives real requests through
//! `UreqTransport` and a `Dispatcher`, checking that classification, decoding
//! and alerting behave end-to-end the same way the unit tests assume.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use netop_core::codec;
use netop_core::response::diagnostic;
use netop_core::{
    Alert, ChannelAlertSink, CodecError, Dispatcher, DispatcherConfig, EmptyResponse, HttpMethod,
    HttpRequest, NetworkError, RequestDescriptor, ResponseModel, Session, Transport,
    TransportError, UnderlyingError, UreqTransport,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct User {
    id: Uuid,
    name: String,
    #[serde(with = "netop_core::codec::date_format")]
    created_at: DateTime<Utc>,
}

impl ResponseModel for User {}

#[derive(Debug, Serialize)]
struct CreateUser {
    name: String,
}

#[derive(Debug, Serialize)]
struct Tagged {
    name: String,
    n: Vec<u32>,
}

async fn start_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(mock_server::run(listener));
    format!("http://{addr}")
}

fn dispatcher(transport: UreqTransport) -> (Dispatcher, UnboundedReceiver<Alert>) {
    let (alerts, rx) = ChannelAlertSink::new();
    let session = Session::new(transport)
        .with_alert_sink(alerts)
        .with_suppressed_alert_keys([mock_server::DUPLICATE_KEY]);
    (Dispatcher::new(Arc::new(session), DispatcherConfig::default()), rx)
}

fn drain(rx: &mut UnboundedReceiver<Alert>) -> Vec<String> {
    let mut messages = Vec::new();
    while let Ok(alert) = rx.try_recv() {
        messages.push(alert.message);
    }
    messages
}

#[tokio::test(flavor = "multi_thread")]
async fn user_lifecycle() {
    let host = start_server().await;
    let (d, mut alerts) = dispatcher(UreqTransport::new());

    // Step 1: create, 201 with a body in the service's date layout.
    let op = d.operation::<User, _>(
        RequestDescriptor::new(&host, "/users"),
        Some(CreateUser {
            name: "Ada".to_string(),
        }),
    );
    let created = d.execute(op).await.unwrap();
    assert_eq!(created.name, "Ada");
    assert!(created.created_at <= Utc::now());

    // Step 2: duplicate, service error with a suppressed key, no alert.
    let op = d.operation::<User, _>(
        RequestDescriptor::new(&host, "/users"),
        Some(CreateUser {
            name: "Ada".to_string(),
        }),
    );
    let err = d.execute(op).await.unwrap_err();
    assert_eq!(
        err.service_payload().unwrap().error_key.as_deref(),
        Some(mock_server::DUPLICATE_KEY)
    );
    assert_eq!(err.service_payload().unwrap().status, Some(409));

    // Step 3: get the created user.
    let route = format!("/users/{}", created.id);
    let op = d.operation::<User, ()>(
        RequestDescriptor::new(&host, &route).with_method(HttpMethod::Get),
        None,
    );
    let fetched = d.execute(op).await.unwrap();
    assert_eq!(fetched.id, created.id);

    // Step 4: delete, 204 decodes to the empty response.
    let op = d.operation::<EmptyResponse, ()>(
        RequestDescriptor::new(&host, &route).with_method(HttpMethod::Delete),
        None,
    );
    assert_eq!(d.execute(op).await.unwrap(), EmptyResponse {});

    // Step 5: get after delete, not_found, shown to the user verbatim.
    let op = d.operation::<User, ()>(
        RequestDescriptor::new(&host, &route).with_method(HttpMethod::Get),
        None,
    );
    let err = d.execute(op).await.unwrap_err();
    assert_eq!(err.message(), "not_found");

    // Step 6: list, empty array.
    let op = d.operation::<Vec<User>, ()>(
        RequestDescriptor::new(&host, "/users").with_method(HttpMethod::Get),
        None,
    );
    assert!(d.execute(op).await.unwrap().is_empty());

    d.shutdown().await;
    assert_eq!(drain(&mut alerts), vec!["not_found".to_string()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn failure_shapes() {
    let host = start_server().await;
    let (d, mut alerts) = dispatcher(UreqTransport::new());
    let get = |route: &str| RequestDescriptor::new(&host, route).with_method(HttpMethod::Get);

    // 200 with an empty body.
    let op = d.operation::<EmptyResponse, ()>(get("/health"), None);
    assert_eq!(d.execute(op).await.unwrap(), EmptyResponse {});

    // 500 with an error body: payload kept, generic alert.
    let op = d.operation::<User, ()>(get("/broken"), None);
    let err = d.execute(op).await.unwrap_err();
    assert_eq!(
        err.service_payload().unwrap().error_key.as_deref(),
        Some("internal_error")
    );

    // 503 without a body.
    let op = d.operation::<User, ()>(get("/unavailable"), None);
    assert!(matches!(
        d.execute(op).await.unwrap_err(),
        NetworkError::OperationFailed
    ));

    // 200 with a body that is not JSON.
    let op = d.operation::<User, ()>(get("/garbage"), None);
    assert!(matches!(
        d.execute(op).await.unwrap_err(),
        NetworkError::Wrapped(UnderlyingError::Codec(CodecError::Decode(_)))
    ));

    d.shutdown().await;
    assert_eq!(
        drain(&mut alerts),
        vec![
            netop_core::error::DEFAULT_ERROR_MESSAGE.to_string(),
            netop_core::error::DEFAULT_ERROR_MESSAGE.to_string(),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn transport_timeout_is_wrapped() {
    let host = start_server().await;
    let (d, _alerts) = dispatcher(UreqTransport::new());

    let request = RequestDescriptor::new(&host, "/slow")
        .with_method(HttpMethod::Get)
        .with_timeout(Duration::from_millis(200));
    let op = d.operation::<EmptyResponse, ()>(request, None);

    let err = d.execute(op).await.unwrap_err();
    assert!(
        matches!(err, NetworkError::Wrapped(UnderlyingError::Transport(_))),
        "{err:?}"
    );
    d.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_host_sends_nothing() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport =
        UreqTransport::new().with_reachability_probe(addr.to_string(), Duration::from_millis(500));
    let (d, mut alerts) = dispatcher(transport);

    let op = d.operation::<User, ()>(RequestDescriptor::new(format!("http://{addr}"), "/users"), None);
    assert!(matches!(
        d.execute(op).await.unwrap_err(),
        NetworkError::ConnectionError
    ));

    d.shutdown().await;
    assert_eq!(
        drain(&mut alerts),
        vec![netop_core::error::DEFAULT_CONNECTION_ERROR_MESSAGE.to_string()]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn connection_refused_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (d, _alerts) = dispatcher(UreqTransport::new());
    let op = d.operation::<User, ()>(
        RequestDescriptor::new(format!("http://{addr}"), "/users").with_method(HttpMethod::Get),
        None,
    );

    let err = d.execute(op).await.unwrap_err();
    assert!(
        matches!(
            err,
            NetworkError::Wrapped(UnderlyingError::Transport(
                TransportError::Connect(_) | TransportError::Io(_) | TransportError::Other(_)
            ))
        ),
        "{err:?}"
    );
    d.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn diagnostic_reproduces_echoed_body_bytes() {
    let host = start_server().await;
    let descriptor = RequestDescriptor::new(&host, "/echo")
        .with_headers(vec![("Content-Type".to_string(), "application/json".to_string())]);
    let body = codec::encode(&Tagged {
        name: "ğüş".to_string(),
        n: vec![1, 2],
    })
    .unwrap();

    let request = HttpRequest {
        method: descriptor.method(),
        url: descriptor.url(),
        headers: descriptor.headers().to_vec(),
        body: Some(body.clone()),
        timeout: descriptor.effective_timeout(),
        multipart: descriptor.is_multipart(),
    };
    let outcome = UreqTransport::new().send(request.clone()).await;

    let response = outcome.as_ref().unwrap();
    assert_eq!(response.status, Some(422));
    assert_eq!(response.body, body);
    assert!(response
        .headers
        .iter()
        .any(|(name, value)| name.eq_ignore_ascii_case("content-type")
            && value == "application/octet-stream"));

    let report = diagnostic(&request, &outcome);
    let prefix = format!("{host}/echo#Content-Type=application/json#");
    assert!(report.starts_with(&prefix), "{report}");

    let rest = &report.as_bytes()[prefix.len()..];
    assert_eq!(&rest[..body.len()], body.as_slice());

    let tail = b"#result: custom error response: ";
    let tail_end = body.len() + tail.len();
    assert_eq!(&rest[body.len()..tail_end], tail.as_slice());
    assert_eq!(&rest[tail_end..], body.as_slice());
}
