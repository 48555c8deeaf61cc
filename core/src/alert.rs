//! User-facing alert presentation.
//!
//! Sinks are fire-and-forget: `present` must not block and its outcome is
//! never reported back to the operation.

use tokio::sync::mpsc;
use tracing::{debug, warn};

/// One message shown to the user with a single dismiss action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub message: String,
    pub dismiss_label: String,
}

pub trait AlertSink: Send + Sync {
    fn present(&self, alert: Alert);
}

/// Discards every alert.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAlertSink;

impl AlertSink for NoopAlertSink {
    fn present(&self, _alert: Alert) {}
}

/// Writes alerts to the log instead of a UI.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn present(&self, alert: Alert) {
        warn!(message = %alert.message, "alert");
    }
}

/// Forwards alerts to a single consumer, e.g. the UI thread's event loop.
#[derive(Debug, Clone)]
pub struct ChannelAlertSink {
    tx: mpsc::UnboundedSender<Alert>,
}

impl ChannelAlertSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Alert>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl AlertSink for ChannelAlertSink {
    fn present(&self, alert: Alert) {
        if self.tx.send(alert).is_err() {
            debug!("alert receiver dropped, alert discarded");
        }
    }
}
