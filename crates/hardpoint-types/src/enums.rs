//! Enumeration types for the Hardpoint session.
//!
//! [`State`] and [`Event`] are the closed alphabets of the session state
//! machine. [`Team`] and [`Owner`] describe the game itself.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// State machine alphabet
// ---------------------------------------------------------------------------

/// A state of the session state machine. Exactly one is active at a time
/// and it alone decides which events are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// Not bound to any guild; only `connect` is accepted.
    Disconnected,
    /// Bound to a guild text channel and accepting settings commands.
    Connected,
    /// An asynchronous settings operation is in flight.
    ConnectedBusy,
    /// A game is running.
    PlayingDefault,
}

impl State {
    /// Every state, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::Disconnected,
        Self::Connected,
        Self::ConnectedBusy,
        Self::PlayingDefault,
    ];

    /// Stable lowercase name used in logs and announcements.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::ConnectedBusy => "connected_busy",
            Self::PlayingDefault => "playing_default",
        }
    }
}

impl core::fmt::Display for State {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event tag. Events carry no payload; the attached action closure
/// captures whatever context it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    /// Bind the session to a guild text channel.
    Connect,
    /// Drop the session and return to defaults.
    Disconnect,
    /// Begin an asynchronous settings change (enters the busy state).
    SettingsUpdateAsync,
    /// A synchronous settings change.
    SettingsUpdate,
    /// Completion of an asynchronous settings change (leaves the busy state).
    SettingsUpdateDone,
    /// Start a game.
    Start,
    /// Any in-game mutation (capture, release, respawn, ticks).
    GameUpdate,
    /// End of a game, canceled or not.
    GameDone,
}

impl Event {
    /// Every event, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Connect,
        Self::Disconnect,
        Self::SettingsUpdateAsync,
        Self::SettingsUpdate,
        Self::SettingsUpdateDone,
        Self::Start,
        Self::GameUpdate,
        Self::GameDone,
    ];

    /// Stable lowercase name used in logs and announcements.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::SettingsUpdateAsync => "settings_update_async",
            Self::SettingsUpdate => "settings_update",
            Self::SettingsUpdateDone => "settings_update_done",
            Self::Start => "start",
            Self::GameUpdate => "game_update",
            Self::GameDone => "game_done",
        }
    }
}

impl core::fmt::Display for Event {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

/// One of the two competing teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    /// The red team.
    Red,
    /// The blue team.
    Blue,
}

impl Team {
    /// The opposing team.
    pub const fn other(self) -> Self {
        match self {
            Self::Red => Self::Blue,
            Self::Blue => Self::Red,
        }
    }

    /// Lowercase team name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Blue => "blue",
        }
    }

    /// Parse a team name, case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "red" => Some(Self::Red),
            "blue" => Some(Self::Blue),
            _ => None,
        }
    }
}

impl core::fmt::Display for Team {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who holds the active objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Owner {
    /// Red has the only captors.
    Red,
    /// Blue has the only captors.
    Blue,
    /// Nobody is capturing.
    #[default]
    Neutral,
    /// Both teams have at least one captor.
    Contested,
}

impl Owner {
    /// The team holding the objective, if any.
    pub const fn team(self) -> Option<Team> {
        match self {
            Self::Red => Some(Team::Red),
            Self::Blue => Some(Team::Blue),
            Self::Neutral | Self::Contested => None,
        }
    }

    /// Lowercase owner name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Blue => "blue",
            Self::Neutral => "neutral",
            Self::Contested => "contested",
        }
    }
}

impl From<Team> for Owner {
    fn from(team: Team) -> Self {
        match team {
            Team::Red => Self::Red,
            Team::Blue => Self::Blue,
        }
    }
}

impl core::fmt::Display for Owner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of chat channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// A text channel.
    Text,
    /// A voice channel.
    #[default]
    Voice,
}

impl ChannelKind {
    /// Lowercase channel kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Voice => "voice",
        }
    }

    /// Parse a channel kind, case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "voice" => Some(Self::Voice),
            _ => None,
        }
    }
}

impl core::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_other_is_an_involution() {
        for team in [Team::Red, Team::Blue] {
            assert_eq!(team.other().other(), team);
            assert_ne!(team.other(), team);
        }
    }

    #[test]
    fn team_parse_is_case_insensitive() {
        assert_eq!(Team::parse("RED"), Some(Team::Red));
        assert_eq!(Team::parse(" blue "), Some(Team::Blue));
        assert_eq!(Team::parse("green"), None);
    }

    #[test]
    fn owner_team_only_for_held_points() {
        assert_eq!(Owner::Red.team(), Some(Team::Red));
        assert_eq!(Owner::Blue.team(), Some(Team::Blue));
        assert_eq!(Owner::Neutral.team(), None);
        assert_eq!(Owner::Contested.team(), None);
    }

    #[test]
    fn state_serializes_snake_case() {
        let json = serde_json::to_string(&State::ConnectedBusy).ok();
        assert_eq!(json.as_deref(), Some("\"connected_busy\""));
    }
}
