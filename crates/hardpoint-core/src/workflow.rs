//! Two-phase asynchronous actions.
//!
//! [`EventSender::push_async`] queues a `SettingsUpdateAsync` event whose
//! action always commits, moving the machine into the busy state. Its
//! success continuation starts the operation as a tokio task bounded by the
//! sender's timeout. When the task settles, a `SettingsUpdateDone` event is
//! pushed exactly once, whatever the outcome:
//!
//! - success: the returned [`Effect`] is applied inside the completion
//!   action, so the document is still only mutated during a drain;
//! - failure or timeout: the error is logged and handed to `on_error`;
//! - task dropped or no runtime: a completion guard pushes the completion
//!   from its `Drop` impl with [`AsyncOperationError::Aborted`].
//!
//! The busy state therefore always ends, at the latest after the timeout.

use futures::future::BoxFuture;
use hardpoint_types::{Event, OperationId};
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::machine::{ActionOutcome, EventSender, OnFailure, QueuedEvent, Rejection};
use crate::session::SessionDocument;

/// Errors settling an asynchronous operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AsyncOperationError {
    /// The operation ran and reported failure.
    #[error("{operation} failed: {reason}")]
    Failed {
        /// Label of the operation.
        operation: String,
        /// Human-readable reason.
        reason: String,
    },

    /// The operation did not settle within the configured timeout.
    #[error("{operation} timed out after {after_ms}ms")]
    TimedOut {
        /// Label of the operation.
        operation: String,
        /// Timeout that elapsed, in milliseconds.
        after_ms: u64,
    },

    /// The operation was dropped before it settled.
    #[error("{operation} was aborted")]
    Aborted {
        /// Label of the operation.
        operation: String,
    },
}

impl AsyncOperationError {
    /// Shorthand for [`AsyncOperationError::Failed`].
    pub fn failed(operation: &str, reason: impl core::fmt::Display) -> Self {
        Self::Failed {
            operation: operation.to_owned(),
            reason: reason.to_string(),
        }
    }
}

/// Document mutation produced by a successful operation.
pub type Effect = Box<dyn FnOnce(&mut SessionDocument, &EventSender) + Send>;

/// The running operation.
pub type OperationFuture = BoxFuture<'static, Result<Effect, AsyncOperationError>>;

/// Builds the operation from a read-only view of the document at the moment
/// the busy state is entered.
pub type StartOperation = Box<dyn FnOnce(&SessionDocument) -> OperationFuture + Send>;

/// Called (inside the completion action) when the operation fails.
pub type OnAsyncError = Box<dyn FnOnce(&AsyncOperationError) + Send>;

/// A two-phase request.
pub struct AsyncRequest {
    label: String,
    operation: StartOperation,
    on_error: Option<OnAsyncError>,
    on_rejected: Option<OnFailure>,
}

impl AsyncRequest {
    /// A request labelled `label` (used in logs and errors).
    pub fn new<F>(label: impl Into<String>, operation: F) -> Self
    where
        F: FnOnce(&SessionDocument) -> OperationFuture + Send + 'static,
    {
        Self {
            label: label.into(),
            operation: Box::new(operation),
            on_error: None,
            on_rejected: None,
        }
    }

    /// Report operation failures.
    #[must_use]
    pub fn with_on_error<F>(mut self, on_error: F) -> Self
    where
        F: FnOnce(&AsyncOperationError) + Send + 'static,
    {
        self.on_error = Some(Box::new(on_error));
        self
    }

    /// Report a refused busy transition (e.g. already busy).
    #[must_use]
    pub fn with_on_rejected<F>(mut self, on_rejected: F) -> Self
    where
        F: FnOnce(Rejection) + Send + 'static,
    {
        self.on_rejected = Some(Box::new(on_rejected));
        self
    }
}

impl core::fmt::Debug for AsyncRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AsyncRequest")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl EventSender {
    /// Queue a two-phase request. Returns `false` if the engine is gone.
    pub fn push_async(&self, request: AsyncRequest) -> bool {
        let AsyncRequest {
            label,
            operation,
            on_error,
            on_rejected,
        } = request;

        let queued = QueuedEvent::unconditional(Event::SettingsUpdateAsync)
            .with_on_success(move |document, events| {
                let id = OperationId::new();
                debug!(operation = %label, operation_id = %id, "Starting async operation");
                let future = operation(document);
                let guard = CompletionGuard::new(events.clone(), id, label, on_error);
                spawn_operation(future, guard);
            })
            .with_boxed_on_failure(on_rejected);
        self.push(queued)
    }
}

fn spawn_operation(future: OperationFuture, guard: CompletionGuard) {
    let Ok(handle) = Handle::try_current() else {
        warn!(
            operation = %guard.label,
            operation_id = %guard.id,
            "No async runtime, aborting operation"
        );
        return;
    };
    let timeout = guard.events.async_timeout();
    handle.spawn(async move {
        let result = match tokio::time::timeout(timeout, future).await {
            Ok(result) => result,
            Err(_) => Err(AsyncOperationError::TimedOut {
                operation: guard.label.clone(),
                after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };
        guard.complete(result);
    });
}

/// Pushes the completion event exactly once.
struct CompletionGuard {
    events: EventSender,
    id: OperationId,
    label: String,
    on_error: Option<OnAsyncError>,
    completed: bool,
}

impl CompletionGuard {
    const fn new(
        events: EventSender,
        id: OperationId,
        label: String,
        on_error: Option<OnAsyncError>,
    ) -> Self {
        Self {
            events,
            id,
            label,
            on_error,
            completed: false,
        }
    }

    fn complete(mut self, result: Result<Effect, AsyncOperationError>) {
        self.completed = true;
        self.push_completion(result);
    }

    fn push_completion(&mut self, result: Result<Effect, AsyncOperationError>) {
        let label = self.label.clone();
        let id = self.id;
        let on_error = self.on_error.take();
        let queued = QueuedEvent::new(Event::SettingsUpdateDone, move |document, events| {
            match result {
                Ok(effect) => {
                    debug!(operation = %label, operation_id = %id, "Async operation completed");
                    effect(document, events);
                }
                Err(err) => {
                    warn!(
                        operation = %label,
                        operation_id = %id,
                        error = %err,
                        "Async operation failed"
                    );
                    if let Some(on_error) = on_error {
                        on_error(&err);
                    }
                }
            }
            Ok(ActionOutcome::Commit)
        });
        self.events.push(queued);
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if !self.completed {
            self.completed = true;
            let operation = self.label.clone();
            self.push_completion(Err(AsyncOperationError::Aborted { operation }));
        }
    }
}
