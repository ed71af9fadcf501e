//! The closed set of commands and where they came from.
//!
//! Text and voice input are both reduced to a [`Command`] before anything
//! touches the session. Required fields are part of each variant, so a
//! command that exists is a command that is well formed.

use serde::{Deserialize, Serialize};

use crate::enums::{ChannelKind, Team};
use crate::ids::{ChannelId, GuildId, UserId};

/// Who issued a command, and from where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOrigin {
    /// Guild of the originating channel.
    pub guild_id: GuildId,
    /// Display name of that guild.
    pub guild_name: String,
    /// Channel the command arrived on.
    pub channel_id: ChannelId,
    /// Display name of that channel.
    pub channel_name: String,
    /// Identity of the sender.
    pub user_id: UserId,
    /// Display name of the sender; the default player name.
    pub user_name: String,
}

/// A fully parsed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Bind the session to the origin guild and text channel.
    Connect,
    /// Leave voice and reset the session.
    Disconnect,
    /// Attach a channel by name.
    Attach {
        /// Channel name.
        channel: String,
        /// Channel kind.
        kind: ChannelKind,
    },
    /// Leave the voice channel.
    Detach,
    /// Add a player after resolving their identity.
    AddPlayer {
        /// Member name.
        name: String,
        /// Team to join.
        team: Team,
        /// Spoken alias.
        alias: String,
    },
    /// Remove a player.
    RemovePlayer {
        /// Player name.
        name: String,
    },
    /// Remove every player.
    PurgePlayers,
    /// Move a player to the other team.
    SwitchTeam {
        /// Player name.
        name: String,
    },
    /// List the roster.
    ListPlayers,
    /// Change a player's team and/or alias.
    UpdatePlayer {
        /// Player name.
        name: String,
        /// New team, if given.
        team: Option<Team>,
        /// New alias, if given.
        alias: Option<String>,
    },
    /// Start a game.
    Start,
    /// Cancel the running game.
    Cancel,
    /// Mark a player as capturing.
    Capture {
        /// Player name; the sender when absent.
        name: Option<String>,
        /// Also release every opposing captor.
        seize: bool,
    },
    /// Clear a player's capturing flag.
    Release {
        /// Player name; the sender when absent.
        name: Option<String>,
    },
    /// Assign a respawn point.
    Respawn {
        /// Player name; the sender when absent.
        name: Option<String>,
    },
    /// Repeat a player's last respawn point.
    RepeatSpawn {
        /// Player name; the sender when absent.
        name: Option<String>,
    },
    /// Show the command list.
    Help,
}

impl Command {
    /// Short name used in logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Attach { .. } => "attach",
            Self::Detach => "detach",
            Self::AddPlayer { .. } => "player add",
            Self::RemovePlayer { .. } => "player remove",
            Self::PurgePlayers => "player purge",
            Self::SwitchTeam { .. } => "player switch",
            Self::ListPlayers => "player list",
            Self::UpdatePlayer { .. } => "player set",
            Self::Start => "start",
            Self::Cancel => "cancel",
            Self::Capture { .. } => "capture",
            Self::Release { .. } => "release",
            Self::Respawn { .. } => "respawn",
            Self::RepeatSpawn { .. } => "repeat",
            Self::Help => "help",
        }
    }
}
