//! Error taxonomy for network operations.
//!
//! # Design
//! `NetworkError` is closed: every failure an operation can report lands in
//! exactly one of its four variants. Server-reported errors keep their decoded
//! payload; everything raised below the pipeline (transport, encoding,
//! decoding, configuration) is carried as an `UnderlyingError` inside
//! `Wrapped` so it can be logged, but users only ever see the default
//! message for it.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_ERROR_MESSAGE: &str = "A temporary problem occurred";
pub const DEFAULT_CONNECTION_ERROR_MESSAGE: &str = "No internet connection";
pub const DEFAULT_DISMISS_LABEL: &str = "OK";

/// Error body returned by the service. The server may omit any field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceErrorPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl fmt::Display for ServiceErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.error_key, self.status) {
            (Some(key), Some(status)) => write!(f, "{key} (status {status})"),
            (Some(key), None) => f.write_str(key),
            (None, Some(status)) => write!(f, "status {status}"),
            (None, None) => f.write_str("unspecified"),
        }
    }
}

/// Failures reported to an operation's completion.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Generic failure: server error without a usable body.
    #[error("operation failed")]
    OperationFailed,

    /// The network was unreachable when the operation started.
    #[error("no network connection")]
    ConnectionError,

    /// The server answered with a decodable error body.
    #[error("service error: {0}")]
    ServiceError(ServiceErrorPayload),

    /// A transport, codec or configuration failure below the pipeline.
    #[error(transparent)]
    Wrapped(#[from] UnderlyingError),
}

impl NetworkError {
    /// User-facing message, resolved against `messages`.
    pub fn message_in<'a>(&'a self, messages: &'a ErrorMessages) -> &'a str {
        match self {
            NetworkError::OperationFailed | NetworkError::Wrapped(_) => &messages.default_message,
            NetworkError::ConnectionError => &messages.connection_message,
            NetworkError::ServiceError(payload) => payload
                .error_key
                .as_deref()
                .unwrap_or(&messages.default_message),
        }
    }

    /// User-facing message with the built-in catalogue.
    pub fn message(&self) -> &str {
        match self {
            NetworkError::OperationFailed | NetworkError::Wrapped(_) => DEFAULT_ERROR_MESSAGE,
            NetworkError::ConnectionError => DEFAULT_CONNECTION_ERROR_MESSAGE,
            NetworkError::ServiceError(payload) => {
                payload.error_key.as_deref().unwrap_or(DEFAULT_ERROR_MESSAGE)
            }
        }
    }

    pub fn service_payload(&self) -> Option<&ServiceErrorPayload> {
        match self {
            NetworkError::ServiceError(payload) => Some(payload),
            _ => None,
        }
    }
}

/// Opaque causes carried by `NetworkError::Wrapped`.
#[derive(Debug, Error)]
pub enum UnderlyingError {
    #[error("transport failed: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// JSON encoding and decoding failures.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("request body could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("response body could not be decoded: {0}")]
    Decode(#[source] serde_json::Error),

    /// A 2xx response had no body and the target type has no empty value.
    #[error("`{type_name}` cannot be built from an empty response body")]
    EmptyBodyUnsupported { type_name: &'static str },
}

/// Failures raised by a `Transport` before any HTTP status was received.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("could not connect: {0}")]
    Connect(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Other(String),
}

/// Rejected state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid operation state transition {from:?} -> {to:?}")]
pub struct StateError {
    pub from: crate::operation::OperationState,
    pub to: crate::operation::OperationState,
}

/// Localised strings shown to the user through the alert sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessages {
    pub default_message: String,
    pub connection_message: String,
    pub dismiss_label: String,
}

impl Default for ErrorMessages {
    fn default() -> Self {
        Self {
            default_message: DEFAULT_ERROR_MESSAGE.to_string(),
            connection_message: DEFAULT_CONNECTION_ERROR_MESSAGE.to_string(),
            dismiss_label: DEFAULT_DISMISS_LABEL.to_string(),
        }
    }
}

impl ErrorMessages {
    /// Turkish catalogue.
    pub fn turkish() -> Self {
        Self {
            default_message: "Geçici bir sorun oldu".to_string(),
            connection_message: "internet baglantısı yok".to_string(),
            dismiss_label: "Tamam".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(key: Option<&str>) -> ServiceErrorPayload {
        ServiceErrorPayload {
            error_key: key.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn messages_resolve_per_variant() {
        assert_eq!(NetworkError::OperationFailed.message(), DEFAULT_ERROR_MESSAGE);
        assert_eq!(
            NetworkError::ConnectionError.message(),
            DEFAULT_CONNECTION_ERROR_MESSAGE
        );
        assert_eq!(
            NetworkError::ServiceError(payload(Some("not_found"))).message(),
            "not_found"
        );
        assert_eq!(
            NetworkError::ServiceError(payload(None)).message(),
            DEFAULT_ERROR_MESSAGE
        );
        let wrapped = NetworkError::from(UnderlyingError::from(TransportError::Other(
            "socket closed".to_string(),
        )));
        assert_eq!(wrapped.message(), DEFAULT_ERROR_MESSAGE);
    }

    #[test]
    fn messages_follow_catalogue() {
        let tr = ErrorMessages::turkish();
        assert_eq!(
            NetworkError::ConnectionError.message_in(&tr),
            "internet baglantısı yok"
        );
        assert_eq!(NetworkError::OperationFailed.message_in(&tr), "Geçici bir sorun oldu");
        assert_eq!(
            NetworkError::ServiceError(payload(Some("k"))).message_in(&tr),
            "k"
        );
    }

    #[test]
    fn payload_decodes_with_missing_fields() {
        let p: ServiceErrorPayload = serde_json::from_str(r#"{"errorKey":"not_found"}"#).unwrap();
        assert_eq!(p.error_key.as_deref(), Some("not_found"));
        assert!(p.title.is_none());
        assert!(p.status.is_none());
        assert!(p.path.is_none());

        let p: ServiceErrorPayload = serde_json::from_str("{}").unwrap();
        assert_eq!(p, ServiceErrorPayload::default());
    }

    #[test]
    fn payload_decodes_all_fields() {
        let p: ServiceErrorPayload = serde_json::from_str(
            r#"{"errorKey":"invalid","title":"Bad Request","status":400,"path":"/users"}"#,
        )
        .unwrap();
        assert_eq!(p.title.as_deref(), Some("Bad Request"));
        assert_eq!(p.status, Some(400));
        assert_eq!(p.path.as_deref(), Some("/users"));
    }

    #[test]
    fn wrapped_error_displays_cause() {
        let err = NetworkError::from(UnderlyingError::from(CodecError::EmptyBodyUnsupported {
            type_name: "User",
        }));
        assert_eq!(
            err.to_string(),
            "`User` cannot be built from an empty response body"
        );
    }
}
