//! The network operation state machine.
//!
//! # Design
//! An `Operation` owns one request and runs it to exactly one completion:
//! reachability check, dispatch, classification, decoding, completion. Its
//! state moves strictly forward through `None -> Ready -> Executing ->
//! Finished` and only the operation itself writes it; observers get a
//! read-only `watch` receiver. The completion is an `FnOnce` taken out of the
//! operation when it fires, so it can never run twice.
//!
//! Completions and alerts of dispatched operations run on the dispatcher's
//! serial callback context. Operations started directly use the session's
//! context when it has one and run them inline otherwise.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info_span, trace, warn, Instrument};
use uuid::Uuid;

use crate::alert::Alert;
use crate::codec::{self, ResponseModel};
use crate::dispatcher::CallbackContext;
use crate::error::{NetworkError, StateError};
use crate::http::HttpRequest;
use crate::request::RequestDescriptor;
use crate::response::{self, AlertPolicy, Resolution, UNAUTHORIZED_STATUS};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OperationState {
    None,
    Ready,
    Executing,
    Finished,
}

impl OperationState {
    /// Transitions only move forward; `Finished` is terminal.
    pub fn can_transition_to(self, next: OperationState) -> bool {
        next > self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationId(Uuid);

impl OperationId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

pub type Completion<T> = Box<dyn FnOnce(Result<T, NetworkError>) + Send>;

/// Unit of work accepted by the dispatcher.
#[async_trait]
pub trait Runnable: Send {
    fn id(&self) -> OperationId;

    fn state(&self) -> OperationState;

    /// Move to `Ready` and deliver future callbacks on `callbacks`.
    fn admit(&mut self, callbacks: CallbackContext) -> Result<(), StateError>;

    async fn start(&mut self);
}

/// One HTTP request lifecycle decoding into `T`, with optional body `M`.
pub struct Operation<T, M = ()> {
    id: OperationId,
    session: Arc<Session>,
    request: RequestDescriptor,
    model: Option<M>,
    completion: Option<Completion<T>>,
    state: watch::Sender<OperationState>,
    callbacks: Option<CallbackContext>,
}

impl<T, M> fmt::Debug for Operation<T, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("id", &self.id)
            .field("request", &self.request)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl<T, M> Operation<T, M>
where
    T: ResponseModel,
    M: Serialize + Send + Sync + 'static,
{
    pub fn new(session: Arc<Session>, request: RequestDescriptor, model: Option<M>) -> Self {
        let (state, _) = watch::channel(OperationState::None);
        Self {
            id: OperationId::new(),
            session,
            request,
            model,
            completion: None,
            state,
            callbacks: None,
        }
    }

    /// Set the callback receiving the single result, replacing any previous one.
    pub fn with_completion<F>(mut self, completion: F) -> Self
    where
        F: FnOnce(Result<T, NetworkError>) + Send + 'static,
    {
        self.completion = Some(Box::new(completion));
        self
    }

    pub fn id(&self) -> OperationId {
        self.id
    }

    pub fn request(&self) -> &RequestDescriptor {
        &self.request
    }

    pub fn model(&self) -> Option<&M> {
        self.model.as_ref()
    }

    pub fn state(&self) -> OperationState {
        *self.state.borrow()
    }

    /// Observe state changes without being able to write them.
    pub fn subscribe(&self) -> watch::Receiver<OperationState> {
        self.state.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == OperationState::Ready
    }

    pub fn is_executing(&self) -> bool {
        self.state() == OperationState::Executing
    }

    pub fn is_finished(&self) -> bool {
        self.state() == OperationState::Finished
    }

    fn transition(&self, next: OperationState) -> Result<(), StateError> {
        let from = self.state();
        if !from.can_transition_to(next) {
            return Err(StateError { from, to: next });
        }
        trace!(operation = %self.id, ?from, to = ?next, "state transition");
        self.state.send_replace(next);
        Ok(())
    }

    fn admit_on(&mut self, callbacks: Option<CallbackContext>) -> Result<(), StateError> {
        self.transition(OperationState::Ready)?;
        self.callbacks = callbacks;
        Ok(())
    }

    /// Mark the operation `Ready` without a dispatcher; callbacks go to the
    /// session's context, or run inline.
    pub fn mark_ready(&mut self) -> Result<(), StateError> {
        self.admit_on(None)
    }

    /// Run the operation to completion. Calling it on an operation that is
    /// already executing or finished does nothing.
    pub async fn start(&mut self) {
        if self.is_executing() || self.is_finished() {
            warn!(operation = %self.id, state = ?self.state(), "start ignored");
            return;
        }

        let span = info_span!("operation", id = %self.id, url = %self.request.url());
        async move {
            if !self.session.transport().is_reachable().await {
                debug!("network unreachable, request not sent");
                let alert = self
                    .request
                    .alert_on_error()
                    .then_some(NetworkError::ConnectionError);
                self.finish(Resolution {
                    result: Err(NetworkError::ConnectionError),
                    alert,
                });
                return;
            }

            if let Err(err) = self.transition(OperationState::Executing) {
                warn!(error = %err, "start rejected");
                return;
            }
            self.perform_request().await;
        }
        .instrument(span)
        .await
    }

    async fn perform_request(&mut self) {
        let body = match self.model().map(codec::encode).transpose() {
            Ok(body) => body,
            Err(err) => {
                warn!(error = %err, "request body could not be encoded");
                let alert = self
                    .request
                    .alert_on_error()
                    .then_some(NetworkError::OperationFailed);
                self.finish(Resolution {
                    result: Err(NetworkError::Wrapped(err.into())),
                    alert,
                });
                return;
            }
        };

        let request = HttpRequest {
            method: self.request.method(),
            url: self.request.url(),
            headers: self.request.headers().to_vec(),
            body,
            timeout: self.request.effective_timeout(),
            multipart: self.request.is_multipart(),
        };
        debug!(method = %request.method, url = %request.url, "performing request");
        if let Some(body) = &request.body {
            debug!(params = %String::from_utf8_lossy(body), "request params");
        }

        let outcome = self.session.transport().send(request.clone()).await;

        if outcome
            .as_ref()
            .is_ok_and(|response| response.status == Some(UNAUTHORIZED_STATUS))
        {
            debug!(
                token_request_available = self.session.token_request_available(),
                "unauthorized response"
            );
        }

        let policy = AlertPolicy {
            enabled: self.request.alert_on_error(),
            suppressed_keys: self.session.suppressed_alert_keys(),
        };
        let resolution = response::resolve::<T>(&request, outcome, policy);
        self.finish(resolution);
    }

    /// Deliver the alert and the completion, then move to `Finished`.
    fn finish(&mut self, resolution: Resolution<T>) {
        if self.is_finished() {
            warn!(operation = %self.id, "operation already finished, result dropped");
            return;
        }

        let Resolution { result, alert } = resolution;
        let alert = alert.map(|error| Alert {
            message: error.message_in(self.session.messages()).to_string(),
            dismiss_label: self.session.messages().dismiss_label.clone(),
        });
        let sink = Arc::clone(self.session.alert_sink());
        let completion = self.completion.take();

        let deliver = move || {
            if let Some(alert) = alert {
                sink.present(alert);
            }
            if let Some(completion) = completion {
                completion(result);
            }
        };

        match self.callbacks.as_ref().or(self.session.callback_context()) {
            Some(callbacks) => callbacks.post(Box::new(deliver)),
            None => deliver(),
        }

        if let Err(err) = self.transition(OperationState::Finished) {
            warn!(error = %err, "finish transition rejected");
        }
    }
}

#[async_trait]
impl<T, M> Runnable for Operation<T, M>
where
    T: ResponseModel,
    M: Serialize + Send + Sync + 'static,
{
    fn id(&self) -> OperationId {
        Operation::id(self)
    }

    fn state(&self) -> OperationState {
        Operation::state(self)
    }

    fn admit(&mut self, callbacks: CallbackContext) -> Result<(), StateError> {
        self.admit_on(Some(callbacks))
    }

    async fn start(&mut self) {
        Operation::start(self).await
    }
}
