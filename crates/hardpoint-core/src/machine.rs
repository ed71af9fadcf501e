//! The state machine engine: a deferred event queue and a single drain point.
//!
//! Callers never touch the [`SessionDocument`] directly. They push a
//! [`QueuedEvent`] through an [`EventSender`]; the [`StateMachine`] drains the
//! queue on a fixed period and, for each item in insertion order:
//!
//! 1. Looks up `(current_state, event)` in the [`TransitionTable`].
//! 2. If absent, calls `on_failure` with [`Rejection::IllegalTransition`].
//! 3. Otherwise runs the action against the document. A commit moves the
//!    machine to the target state and then calls `on_success`; anything else
//!    (reject, error, panic) calls `on_failure` and leaves the state alone.
//!
//! Each drain first moves everything currently queued into a local batch.
//! Events pushed while that batch is being applied land in the channel and
//! are only seen by the next drain.
//!
//! `drain` takes `&mut self`, so two drains can never overlap. That exclusive
//! borrow is the only serialization point in the system.

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use hardpoint_types::{Event, State};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::session::SessionDocument;
use crate::table::{TableError, TransitionTable};

/// Shortest drain period [`StateMachine::run`] will tick at.
pub const MIN_DRAIN_PERIOD: Duration = Duration::from_millis(1);

// ---------------------------------------------------------------------------
// Action protocol
// ---------------------------------------------------------------------------

/// What an action decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Apply the transition and run `on_success`.
    Commit,
    /// Do not transition; run `on_failure`.
    Reject,
}

/// Errors an action can report instead of committing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// The named player is not on the roster.
    #[error("player doesn't exist [{name}]")]
    UnknownPlayer {
        /// The name that was looked up.
        name: String,
    },

    /// A game cannot start without a voice channel.
    #[error("can't start until the bot is attached to a voice channel")]
    NoVoiceChannel,

    /// A game cannot start without objectives.
    #[error("no hardpoints are configured")]
    NoObjectives,

    /// The scoring and rotation timers could not be started.
    #[error("game timers couldn't be started")]
    NoTimers,

    /// The active objective has no spawn graph or an empty option set.
    #[error("no spawn options for hardpoint [{objective}]")]
    NoSpawnOptions {
        /// The objective that was active.
        objective: String,
    },

    /// Any other precondition failure.
    #[error("{reason}")]
    Precondition {
        /// Human-readable reason.
        reason: String,
    },
}

/// Why a queued event did not commit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// The event is not legal in the current state.
    #[error("[{event}] is not allowed while {state}")]
    IllegalTransition {
        /// State the machine was in.
        state: State,
        /// Event that was drained.
        event: Event,
    },

    /// The action ran and returned [`ActionOutcome::Reject`].
    #[error("[{event}] was rejected")]
    ActionRejected {
        /// Event that was drained.
        event: Event,
    },

    /// The action ran and returned an error.
    #[error("{source}")]
    ActionFailed {
        /// Event that was drained.
        event: Event,
        /// The action's error.
        source: ActionError,
    },

    /// The action panicked; the panic was contained at the drain boundary.
    #[error("[{event}] failed unexpectedly")]
    ActionPanicked {
        /// Event that was drained.
        event: Event,
    },
}

/// Synchronous mutation attached to a queued event.
pub type Action =
    Box<dyn FnOnce(&mut SessionDocument, &EventSender) -> Result<ActionOutcome, ActionError> + Send>;

/// Continuation run after a committed transition.
pub type OnSuccess = Box<dyn FnOnce(&mut SessionDocument, &EventSender) + Send>;

/// Continuation run when an event does not commit.
pub type OnFailure = Box<dyn FnOnce(Rejection) + Send>;

/// An event tag plus the closures that give it meaning. Single use.
pub struct QueuedEvent {
    event: Event,
    action: Action,
    on_success: Option<OnSuccess>,
    on_failure: Option<OnFailure>,
}

impl QueuedEvent {
    /// Queue `event` with a synchronous `action`.
    pub fn new<F>(event: Event, action: F) -> Self
    where
        F: FnOnce(&mut SessionDocument, &EventSender) -> Result<ActionOutcome, ActionError>
            + Send
            + 'static,
    {
        Self {
            event,
            action: Box::new(action),
            on_success: None,
            on_failure: None,
        }
    }

    /// Queue `event` with an action that always commits.
    pub fn unconditional(event: Event) -> Self {
        Self::new(event, |_, _| Ok(ActionOutcome::Commit))
    }

    /// Attach a continuation for committed transitions.
    #[must_use]
    pub fn with_on_success<F>(mut self, on_success: F) -> Self
    where
        F: FnOnce(&mut SessionDocument, &EventSender) + Send + 'static,
    {
        self.on_success = Some(Box::new(on_success));
        self
    }

    /// Attach a continuation for rejected or illegal events.
    #[must_use]
    pub fn with_on_failure<F>(mut self, on_failure: F) -> Self
    where
        F: FnOnce(Rejection) + Send + 'static,
    {
        self.on_failure = Some(Box::new(on_failure));
        self
    }

    /// Attach an already boxed failure continuation, if any.
    #[must_use]
    pub fn with_boxed_on_failure(mut self, on_failure: Option<OnFailure>) -> Self {
        self.on_failure = on_failure;
        self
    }

    /// The event tag.
    pub const fn event(&self) -> Event {
        self.event
    }
}

impl core::fmt::Debug for QueuedEvent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("QueuedEvent")
            .field("event", &self.event)
            .field("on_success", &self.on_success.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Cloneable handle for pushing events onto the engine's queue.
///
/// Pushing never touches the current state or the document.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<QueuedEvent>,
    async_timeout: Duration,
}

impl EventSender {
    /// Enqueue an event. Returns `false` if the engine has been dropped.
    pub fn push(&self, queued: QueuedEvent) -> bool {
        let event = queued.event;
        if self.tx.send(queued).is_err() {
            debug!(event = %event, "Engine gone, event dropped");
            return false;
        }
        true
    }

    /// Upper bound on how long an asynchronous operation may hold the
    /// busy state.
    pub const fn async_timeout(&self) -> Duration {
        self.async_timeout
    }

    /// Whether the engine has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Per-drain counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Items taken off the queue.
    pub processed: usize,
    /// Items whose action committed.
    pub committed: usize,
    /// Items illegal in the state they met.
    pub illegal: usize,
    /// Items whose action rejected, failed or panicked.
    pub rejected: usize,
}

impl DrainReport {
    const fn bump(counter: &mut usize) {
        *counter = counter.saturating_add(1);
    }
}

/// Totals accumulated by [`StateMachine::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Drains performed.
    pub drains: u64,
    /// Items taken off the queue.
    pub processed: usize,
    /// Items whose action committed.
    pub committed: usize,
    /// Items that did not commit.
    pub failed: usize,
}

impl RunSummary {
    fn absorb(&mut self, report: &DrainReport) {
        self.drains = self.drains.saturating_add(1);
        self.processed = self.processed.saturating_add(report.processed);
        self.committed = self.committed.saturating_add(report.committed);
        self.failed = self
            .failed
            .saturating_add(report.illegal)
            .saturating_add(report.rejected);
    }
}

/// Owns the current state and the session document; the sole mutator.
#[derive(Debug)]
pub struct StateMachine {
    name: String,
    table: TransitionTable,
    current: State,
    document: SessionDocument,
    rx: mpsc::UnboundedReceiver<QueuedEvent>,
    sender: EventSender,
}

impl StateMachine {
    /// Build an engine in [`State::Disconnected`].
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] if the table fails validation.
    pub fn new(
        name: impl Into<String>,
        table: TransitionTable,
        document: SessionDocument,
        async_timeout: Duration,
    ) -> Result<Self, TableError> {
        table.validate()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let name = name.into();
        info!(
            machine = %name,
            initial_state = %State::Disconnected,
            "Created state machine\n{table}"
        );
        Ok(Self {
            name,
            table,
            current: State::Disconnected,
            document,
            rx,
            sender: EventSender { tx, async_timeout },
        })
    }

    /// The current state.
    pub const fn state(&self) -> State {
        self.current
    }

    /// Read-only view of the document.
    pub const fn document(&self) -> &SessionDocument {
        &self.document
    }

    /// A handle for pushing events.
    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Apply every event queued before this call, in insertion order.
    pub fn drain(&mut self) -> DrainReport {
        let mut batch = Vec::new();
        while let Ok(item) = self.rx.try_recv() {
            batch.push(item);
        }

        let mut report = DrainReport::default();
        for item in batch {
            DrainReport::bump(&mut report.processed);
            self.apply(item, &mut report);
        }
        report
    }

    fn apply(&mut self, item: QueuedEvent, report: &mut DrainReport) {
        let QueuedEvent {
            event,
            action,
            on_success,
            on_failure,
        } = item;
        let from = self.current;
        debug!(machine = %self.name, state = %from, event = %event, "Processing event");

        let Some(to) = self.table.next(from, event) else {
            warn!(
                machine = %self.name,
                state = %from,
                event = %event,
                allowed = ?self.table.legal_events(from),
                "Event not allowed in current state"
            );
            DrainReport::bump(&mut report.illegal);
            fail(on_failure, Rejection::IllegalTransition { state: from, event });
            return;
        };

        let document = &mut self.document;
        let sender = &self.sender;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| action(document, sender)));

        let rejection = match outcome {
            Ok(Ok(ActionOutcome::Commit)) => None,
            Ok(Ok(ActionOutcome::Reject)) => {
                debug!(machine = %self.name, event = %event, "Action rejected");
                Some(Rejection::ActionRejected { event })
            }
            Ok(Err(source)) => {
                warn!(machine = %self.name, event = %event, error = %source, "Action failed");
                Some(Rejection::ActionFailed { event, source })
            }
            Err(payload) => {
                error!(
                    machine = %self.name,
                    event = %event,
                    panic = panic_message(payload.as_ref()),
                    "Action panicked"
                );
                Some(Rejection::ActionPanicked { event })
            }
        };

        if let Some(rejection) = rejection {
            DrainReport::bump(&mut report.rejected);
            fail(on_failure, rejection);
            return;
        }

        self.current = to;
        DrainReport::bump(&mut report.committed);
        if from == to {
            debug!(machine = %self.name, state = %to, event = %event, "Transition committed");
        } else {
            info!(machine = %self.name, from = %from, event = %event, to = %to, "State transition");
        }

        if let Some(on_success) = on_success {
            let document = &mut self.document;
            let sender = &self.sender;
            if let Err(payload) =
                panic::catch_unwind(AssertUnwindSafe(|| on_success(document, sender)))
            {
                error!(
                    machine = %self.name,
                    event = %event,
                    panic = panic_message(payload.as_ref()),
                    "Success continuation panicked"
                );
            }
        }
    }

    /// Drain on a fixed period until `shutdown` resolves.
    ///
    /// Drains never overlap: a late tick is delayed rather than bunched.
    /// A zero period is raised to [`MIN_DRAIN_PERIOD`].
    pub async fn run<F>(&mut self, period: Duration, shutdown: F) -> RunSummary
    where
        F: Future<Output = ()>,
    {
        let period = if period.is_zero() {
            warn!(machine = %self.name, "Drain period is zero, using the minimum");
            MIN_DRAIN_PERIOD
        } else {
            period
        };
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut summary = RunSummary::default();
        info!(
            machine = %self.name,
            period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
            "Drain loop started"
        );
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => {
                    let report = self.drain();
                    summary.absorb(&report);
                }
            }
        }
        info!(
            machine = %self.name,
            state = %self.current,
            drains = summary.drains,
            committed = summary.committed,
            failed = summary.failed,
            "Drain loop stopped"
        );
        summary
    }
}

fn fail(on_failure: Option<OnFailure>, rejection: Rejection) {
    let Some(on_failure) = on_failure else {
        return;
    };
    if panic::catch_unwind(AssertUnwindSafe(|| on_failure(rejection))).is_err() {
        error!("Failure continuation panicked");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
