//! Collaborators and settings shared by every operation of one client.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::alert::{AlertSink, LogAlertSink};
use crate::dispatcher::CallbackContext;
use crate::error::ErrorMessages;
use crate::transport::{Transport, UreqTransport};

/// Shared, read-only configuration for operations.
///
/// Built once with the `with_*` methods and then shared behind an `Arc`.
#[derive(Clone)]
pub struct Session {
    transport: Arc<dyn Transport>,
    alert_sink: Arc<dyn AlertSink>,
    messages: ErrorMessages,
    suppressed_alert_keys: HashSet<String>,
    token_request_available: bool,
    callbacks: Option<CallbackContext>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(UreqTransport::new())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("messages", &self.messages)
            .field("suppressed_alert_keys", &self.suppressed_alert_keys)
            .field("token_request_available", &self.token_request_available)
            .field("callbacks", &self.callbacks)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
            alert_sink: Arc::new(LogAlertSink),
            messages: ErrorMessages::default(),
            suppressed_alert_keys: HashSet::new(),
            token_request_available: false,
            callbacks: None,
        }
    }

    pub fn with_alert_sink(mut self, sink: impl AlertSink + 'static) -> Self {
        self.alert_sink = Arc::new(sink);
        self
    }

    pub fn with_shared_alert_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.alert_sink = sink;
        self
    }

    pub fn with_messages(mut self, messages: ErrorMessages) -> Self {
        self.messages = messages;
        self
    }

    /// Error keys for which 4xx responses never raise an alert because the
    /// caller reports them itself.
    pub fn with_suppressed_alert_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suppressed_alert_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the host application may issue a token request after a 401.
    /// Operations only report it; they never refresh tokens themselves.
    pub fn with_token_request_available(mut self, available: bool) -> Self {
        self.token_request_available = available;
        self
    }

    /// Deliver alerts and completions of operations started outside a
    /// dispatcher on `callbacks` instead of the caller's task.
    pub fn with_callback_context(mut self, callbacks: CallbackContext) -> Self {
        self.callbacks = Some(callbacks);
        self
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn alert_sink(&self) -> &Arc<dyn AlertSink> {
        &self.alert_sink
    }

    pub fn messages(&self) -> &ErrorMessages {
        &self.messages
    }

    pub fn suppressed_alert_keys(&self) -> &HashSet<String> {
        &self.suppressed_alert_keys
    }

    pub fn token_request_available(&self) -> bool {
        self.token_request_available
    }

    pub fn callback_context(&self) -> Option<&CallbackContext> {
        self.callbacks.as_ref()
    }
}
