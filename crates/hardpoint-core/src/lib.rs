//! Session state machine, action protocol, and game simulation for the
//! Hardpoint game-master bot.
//!
//! Everything that mutates the session goes through one place: a
//! [`StateMachine`] that drains a deferred event queue on a fixed period
//! and applies each event's action against the [`SessionDocument`] it owns.
//! Commands, timer ticks and the completions of asynchronous work all reach
//! the document the same way, by pushing a [`QueuedEvent`].
//!
//! # Modules
//!
//! - [`table`] -- The static `(State, Event) -> State` table and its
//!   startup validation.
//! - [`machine`] -- Queue, drain loop, action protocol, rejections.
//! - [`workflow`] -- Two-phase asynchronous actions with guaranteed
//!   completion.
//! - [`session`] -- The session document and its typed accessors.
//! - [`tally`] -- Capture tally and objective ownership.
//! - [`spawn`] -- Respawn point selection.
//! - [`scoring`] -- The scoring tick.
//! - [`rotation`] -- The objective-rotation tick.
//! - [`simulation`] -- Timer lifecycle and the end of a game.
//! - [`command`] -- Text command parsing.
//! - [`voice`] -- Voice phrase interpretation.
//! - [`dispatch`] -- Commands to queued events.
//! - [`announce`] -- Outbound announcement queue and delivery pump.
//! - [`chat`] -- Chat-platform collaborator trait.
//! - [`speech`] -- Speech collaborator trait.
//! - [`config`] -- Configuration and game data loading.
//!
//! [`StateMachine`]: machine::StateMachine
//! [`SessionDocument`]: session::SessionDocument
//! [`QueuedEvent`]: machine::QueuedEvent

pub mod announce;
pub mod chat;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod machine;
pub mod rotation;
pub mod scoring;
pub mod session;
pub mod simulation;
pub mod spawn;
pub mod speech;
pub mod table;
pub mod tally;
pub mod voice;
pub mod workflow;
