//! Transport boundary and the default ureq-backed implementation.
//!
//! # Design
//! The operation only needs two things from the network: whether it is
//! reachable right now, and a single request/response round trip. Both live
//! on the `Transport` trait so tests can script them. `UreqTransport` runs
//! ureq's blocking agent on tokio's blocking pool; 4xx/5xx responses are
//! returned as data, never as errors, so status interpretation stays in the
//! operation.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use ureq::typestate::{WithBody, WithoutBody};
use ureq::RequestBuilder;

use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[async_trait]
pub trait Transport: Send + Sync {
    /// Current network availability.
    async fn is_reachable(&self) -> bool;

    /// Perform exactly one request. No retries.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Host used to answer `is_reachable`.
#[derive(Debug, Clone)]
pub struct ReachabilityProbe {
    pub address: String,
    pub timeout: Duration,
}

/// `Transport` over a shared `ureq::Agent`.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    probe: Option<ReachabilityProbe>,
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport")
            .field("probe", &self.probe)
            .finish_non_exhaustive()
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent, probe: None }
    }

    /// Answer reachability by opening a TCP connection to `address`
    /// (`host:port`). Without a probe the network is assumed reachable.
    pub fn with_reachability_probe(mut self, address: impl Into<String>, timeout: Duration) -> Self {
        self.probe = Some(ReachabilityProbe {
            address: address.into(),
            timeout,
        });
        self
    }
}

#[async_trait]
impl Transport for UreqTransport {
    async fn is_reachable(&self) -> bool {
        let Some(probe) = &self.probe else {
            return true;
        };
        let connect = tokio::net::TcpStream::connect(probe.address.as_str());
        match tokio::time::timeout(probe.timeout, connect).await {
            Ok(Ok(_)) => true,
            Ok(Err(err)) => {
                debug!(address = %probe.address, error = %err, "reachability probe failed");
                false
            }
            Err(_) => {
                debug!(address = %probe.address, "reachability probe timed out");
                false
            }
        }
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || execute(&agent, request))
            .await
            .map_err(|err| TransportError::Other(err.to_string()))?
    }
}

/// Execute `request` with ureq, returning 4xx/5xx responses as data.
fn execute(agent: &ureq::Agent, request: HttpRequest) -> Result<HttpResponse, TransportError> {
    let url = request.url.as_str();
    let outcome = match request.method {
        HttpMethod::Post => send_with_body(agent.post(url), &request),
        HttpMethod::Put => send_with_body(agent.put(url), &request),
        HttpMethod::Patch => send_with_body(agent.patch(url), &request),
        HttpMethod::Get => send_without_body(agent.get(url), &request),
        HttpMethod::Delete => send_without_body(agent.delete(url), &request),
        HttpMethod::Head => send_without_body(agent.head(url), &request),
        HttpMethod::Options => send_without_body(agent.options(url), &request),
        HttpMethod::Trace => send_without_body(agent.trace(url), &request),
        HttpMethod::Connect => send_without_body(agent.connect(url), &request),
    };

    let mut response = outcome.map_err(|err| map_error(err, request.timeout))?;

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();
    let body = response
        .body_mut()
        .read_to_vec()
        .map_err(|err| map_error(err, request.timeout))?;

    Ok(HttpResponse {
        status: Some(status),
        headers,
        body,
    })
}

fn prepare<B>(mut builder: RequestBuilder<B>, request: &HttpRequest) -> RequestBuilder<B> {
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder.config().timeout_global(Some(request.timeout)).build()
}

fn send_with_body(
    builder: RequestBuilder<WithBody>,
    request: &HttpRequest,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    let builder = prepare(builder, request);
    match &request.body {
        Some(body) => builder.send(body.as_slice()),
        None => builder.send_empty(),
    }
}

fn send_without_body(
    builder: RequestBuilder<WithoutBody>,
    request: &HttpRequest,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    let builder = prepare(builder, request);
    match &request.body {
        Some(body) => builder.force_send_body().send(body.as_slice()),
        None => builder.call(),
    }
}

fn map_error(err: ureq::Error, timeout: Duration) -> TransportError {
    match err {
        ureq::Error::Timeout(_) => TransportError::Timeout(timeout),
        ureq::Error::Io(err) => TransportError::Io(err),
        ureq::Error::HostNotFound | ureq::Error::ConnectionFailed => {
            TransportError::Connect(err.to_string())
        }
        ureq::Error::BadUri(uri) => TransportError::InvalidRequest(uri),
        other => TransportError::Other(other.to_string()),
    }
}
