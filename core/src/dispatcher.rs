//! FIFO dispatcher running operations on a pool of tokio workers.
//!
//! # Design
//! Admitted operations go into one unbounded queue that a fixed number of
//! worker tasks drain in order. There is no priority, dependency tracking or
//! cancellation. Completions and alerts of dispatched operations are posted
//! to a single `CallbackContext` task, so user-visible side effects never run
//! concurrently with each other.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::codec::ResponseModel;
use crate::error::{NetworkError, StateError};
use crate::operation::{Operation, OperationId, Runnable};
use crate::request::RequestDescriptor;
use crate::session::Session;

pub const DEFAULT_WORKERS: usize = 4;

pub type Callback = Box<dyn FnOnce() + Send>;
type Queue = Arc<Mutex<mpsc::UnboundedReceiver<Box<dyn Runnable>>>>;

/// Serial executor for completion callbacks and alerts.
#[derive(Clone)]
pub struct CallbackContext {
    tx: mpsc::UnboundedSender<Callback>,
}

impl std::fmt::Debug for CallbackContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackContext")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl CallbackContext {
    /// Spawn the context's task on the current tokio runtime.
    pub fn spawn() -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Callback>();
        let handle = tokio::spawn(async move {
            while let Some(callback) = rx.recv().await {
                callback();
            }
        });
        (Self { tx }, handle)
    }

    /// Queue `callback`. If the context is gone it runs on the caller instead,
    /// so a completion is never lost.
    pub fn post(&self, callback: Callback) {
        if let Err(mpsc::error::SendError(callback)) = self.tx.send(callback) {
            debug!("callback context closed, running callback inline");
            callback();
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Number of operations executed concurrently.
    pub workers: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
        }
    }
}

impl DispatcherConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("operation cannot be admitted: {0}")]
    NotAdmissible(#[from] StateError),

    #[error("dispatcher is shut down")]
    Closed,
}

/// Queue of operations sharing one `Session`.
pub struct Dispatcher {
    session: Arc<Session>,
    queue: mpsc::UnboundedSender<Box<dyn Runnable>>,
    callbacks: CallbackContext,
    workers: Vec<JoinHandle<()>>,
    callback_task: JoinHandle<()>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("session", &self.session)
            .field("workers", &self.workers.len())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Start the worker pool. Must be called inside a tokio runtime.
    pub fn new(session: Arc<Session>, config: DispatcherConfig) -> Self {
        let (queue, rx) = mpsc::unbounded_channel::<Box<dyn Runnable>>();
        let rx: Queue = Arc::new(Mutex::new(rx));
        let workers = (0..config.workers.max(1))
            .map(|worker| tokio::spawn(run_worker(worker, Arc::clone(&rx))))
            .collect();
        let (callbacks, callback_task) = CallbackContext::spawn();
        Self {
            session,
            queue,
            callbacks,
            workers,
            callback_task,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Build an operation bound to this dispatcher's session.
    pub fn operation<T, M>(&self, request: RequestDescriptor, model: Option<M>) -> Operation<T, M>
    where
        T: ResponseModel,
        M: Serialize + Send + Sync + 'static,
    {
        Operation::new(Arc::clone(&self.session), request, model)
    }

    /// Mark `operation` ready and queue it behind everything already admitted.
    pub fn add<R: Runnable + 'static>(&self, mut operation: R) -> Result<OperationId, DispatchError> {
        if self.queue.is_closed() {
            return Err(DispatchError::Closed);
        }
        operation.admit(self.callbacks.clone())?;
        let id = operation.id();
        self.queue
            .send(Box::new(operation))
            .map_err(|_| DispatchError::Closed)?;
        debug!(operation = %id, "operation queued");
        Ok(id)
    }

    /// Queue `operation` and wait for its result. Replaces any completion
    /// already set on the operation.
    pub async fn execute<T, M>(&self, operation: Operation<T, M>) -> Result<T, NetworkError>
    where
        T: ResponseModel,
        M: Serialize + Send + Sync + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let operation = operation.with_completion(move |result| {
            let _ = tx.send(result);
        });
        if let Err(err) = self.add(operation) {
            warn!(error = %err, "operation not dispatched");
            return Err(NetworkError::OperationFailed);
        }
        rx.await.unwrap_or(Err(NetworkError::OperationFailed))
    }

    /// Stop accepting work, let queued operations finish, then drain the
    /// callback context.
    pub async fn shutdown(self) {
        let Dispatcher {
            queue,
            callbacks,
            workers,
            callback_task,
            ..
        } = self;
        drop(queue);
        for worker in workers {
            if let Err(err) = worker.await {
                warn!(error = %err, "dispatcher worker failed");
            }
        }
        drop(callbacks);
        if let Err(err) = callback_task.await {
            warn!(error = %err, "callback context failed");
        }
    }
}

async fn run_worker(worker: usize, queue: Queue) {
    loop {
        let next = queue.lock().await.recv().await;
        let Some(mut operation) = next else {
            debug!(worker, "dispatcher queue closed");
            break;
        };
        debug!(worker, operation = %operation.id(), "operation started");
        operation.start().await;
    }
}
