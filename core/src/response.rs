//! Response classification and decoding.
//!
//! # Design
//! `resolve` is a pure function from one transport outcome to the result the
//! completion receives plus the alert (if any) the user should see. The
//! operation owns state and delivery; everything about status codes, bodies
//! and alert policy lives here so it can be tested without a transport.

use std::collections::HashSet;
use std::ops::Range;

use tracing::{debug, trace, warn};

use crate::codec::{self, ResponseModel};
use crate::error::{NetworkError, ServiceErrorPayload, TransportError};
use crate::http::{HttpRequest, HttpResponse};

/// Statuses routed to success decoding. 299 itself is not included.
pub const SUCCESS_STATUS: Range<u16> = 200..299;

/// Statuses for which an empty body is the expected success shape.
pub const EMPTY_RESPONSE_CODES: [u16; 3] = [201, 204, 205];

/// Status assumed when no response status is available.
pub const ABSENT_STATUS: u16 = 500;

pub const UNAUTHORIZED_STATUS: u16 = 401;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Success(u16),
    Failure(u16),
}

pub fn classify(status: Option<u16>) -> ResponseClass {
    let status = status.unwrap_or(ABSENT_STATUS);
    if SUCCESS_STATUS.contains(&status) {
        ResponseClass::Success(status)
    } else {
        ResponseClass::Failure(status)
    }
}

/// How failures of one request are surfaced to the user.
#[derive(Debug, Clone, Copy)]
pub struct AlertPolicy<'a> {
    pub enabled: bool,
    /// Error keys another part of the application already reports.
    pub suppressed_keys: &'a HashSet<String>,
}

/// Outcome of the pipeline for one request.
#[derive(Debug)]
pub struct Resolution<T> {
    pub result: Result<T, NetworkError>,
    /// Error whose message should be shown, already filtered by policy.
    pub alert: Option<NetworkError>,
}

impl<T> Resolution<T> {
    fn new(result: Result<T, NetworkError>, alert: Option<NetworkError>) -> Self {
        Self { result, alert }
    }
}

/// Turn one transport outcome into a completion result and alert decision.
pub fn resolve<T: ResponseModel>(
    request: &HttpRequest,
    outcome: Result<HttpResponse, TransportError>,
    policy: AlertPolicy<'_>,
) -> Resolution<T> {
    let status = outcome.as_ref().ok().and_then(|response| response.status);
    debug!(
        status = ?status,
        error = outcome.as_ref().err().map(tracing::field::display),
        "handle response"
    );

    match classify(status) {
        ResponseClass::Success(status) => {
            let body = match &outcome {
                Ok(response) => response.body.as_slice(),
                Err(_) => &[],
            };
            decode_success(status, body)
        }
        ResponseClass::Failure(status) => {
            let report = diagnostic(request, &outcome);
            warn!(status, diagnostic = %report, "request failed");
            decode_failure(status, outcome, policy)
        }
    }
}

fn decode_success<T: ResponseModel>(status: u16, body: &[u8]) -> Resolution<T> {
    if codec::is_blank(body) {
        if EMPTY_RESPONSE_CODES.contains(&status) {
            debug!(status, "result: empty success");
        } else {
            debug!(status, "result: empty success on status without declared empty body");
        }
    } else {
        trace!(body = %String::from_utf8_lossy(body), "result: success");
    }

    match codec::decode::<T>(body) {
        Ok(value) => Resolution::new(Ok(value), None),
        Err(err) => {
            warn!(error = %err, "result: success body could not be decoded");
            Resolution::new(Err(NetworkError::Wrapped(err.into())), None)
        }
    }
}

fn decode_failure<T>(
    status: u16,
    outcome: Result<HttpResponse, TransportError>,
    policy: AlertPolicy<'_>,
) -> Resolution<T> {
    let generic_alert = || policy.enabled.then_some(NetworkError::OperationFailed);

    let response = match outcome {
        Ok(response) => response,
        Err(err) => {
            return Resolution::new(Err(NetworkError::Wrapped(err.into())), generic_alert());
        }
    };

    if codec::is_blank(&response.body) {
        return Resolution::new(Err(NetworkError::OperationFailed), generic_alert());
    }

    match codec::decode_json::<ServiceErrorPayload>(&response.body) {
        Ok(payload) => {
            let alert = if !policy.enabled {
                None
            } else if status >= 500 {
                Some(NetworkError::OperationFailed)
            } else if payload
                .error_key
                .as_ref()
                .is_some_and(|key| policy.suppressed_keys.contains(key))
            {
                debug!(error_key = ?payload.error_key, "alert suppressed");
                None
            } else {
                Some(NetworkError::ServiceError(payload.clone()))
            };
            Resolution::new(Err(NetworkError::ServiceError(payload)), alert)
        }
        Err(err) => {
            warn!(error = %err, "result: error body could not be decoded");
            Resolution::new(Err(NetworkError::Wrapped(err.into())), None)
        }
    }
}

/// One-line description of a failed exchange for logs: url, headers and
/// request body, then the raw response body or the transport error, with
/// sections separated by `#`. Never parsed.
pub fn diagnostic(request: &HttpRequest, outcome: &Result<HttpResponse, TransportError>) -> String {
    let mut report = format!("{}#", request.url);

    let headers = request
        .headers
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(",");
    report.push_str(&headers);
    report.push('#');

    if let Some(body) = &request.body {
        report.push_str(&String::from_utf8_lossy(body));
        report.push('#');
    }

    match outcome {
        Ok(response) => {
            report.push_str("result: custom error response: ");
            report.push_str(&response.body_text());
        }
        Err(err) => {
            report.push_str("result: error: ");
            report.push_str(&err.to_string());
        }
    }
    report
}
