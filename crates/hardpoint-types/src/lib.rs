//! Shared type definitions for the Hardpoint game-master bot.
//!
//! This crate is the single source of truth for data shared between the
//! session core and the engine binary.
//!
//! # Modules
//!
//! - [`command`] -- The closed command set and its origin
//! - [`ids`] -- Type-safe wrappers for chat-platform identifiers
//! - [`enums`] -- State machine alphabet, teams, objective owners
//! - [`structs`] -- Roster entries, spawn graphs, channel binding

pub mod command;
pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use command::{Command, CommandOrigin};
pub use enums::{ChannelKind, Event, Owner, State, Team};
pub use ids::{ChannelId, GuildId, OperationId, UserId};
pub use structs::{ChannelBinding, Player, SpawnGraph};
