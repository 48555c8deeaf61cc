//! Declarative JSON-over-HTTP operations.
//!
//! # Overview
//! A `RequestDescriptor` describes one call. An `Operation` runs it against a
//! `Transport`: it checks reachability, sends the request, classifies the
//! response by status, decodes the body into the caller's type or into a
//! `ServiceErrorPayload`, and reports exactly one `Result` to its completion,
//! optionally raising an alert through an `AlertSink`. A `Dispatcher` queues
//! operations on a small worker pool.
//!
//! # Design
//! - Status classification and decoding (`response`) are pure functions; the
//!   operation only owns state and delivery.
//! - Every failure is one of the four `NetworkError` variants.
//! - Collaborators (transport, alert sink) are injected through `Session`,
//!   so tests substitute scripted implementations.

pub mod alert;
pub mod codec;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod operation;
pub mod request;
pub mod response;
pub mod session;
pub mod transport;

pub use alert::{Alert, AlertSink, ChannelAlertSink, LogAlertSink, NoopAlertSink};
pub use codec::{EmptyResponse, ResponseModel};
pub use dispatcher::{CallbackContext, DispatchError, Dispatcher, DispatcherConfig};
pub use error::{
    CodecError, ErrorMessages, NetworkError, ServiceErrorPayload, StateError, TransportError,
    UnderlyingError,
};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use operation::{Operation, OperationId, OperationState, Runnable};
pub use request::{Endpoint, RequestDescriptor};
pub use session::Session;
pub use transport::{Transport, UreqTransport};
