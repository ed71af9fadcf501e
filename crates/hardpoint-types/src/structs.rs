//! Core data structs: roster entries, spawn graphs, and the channel binding.

use serde::{Deserialize, Serialize};

use crate::enums::Team;
use crate::ids::{ChannelId, GuildId, UserId};

/// A member of the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Resolved chat identity.
    pub id: UserId,
    /// Team the player is on.
    pub team: Team,
    /// Name used in announcements (spoken names are often nicer than handles).
    pub alias: String,
    /// Respawns requested this game.
    pub deaths: u32,
    /// The spawn point most recently assigned to this player.
    pub latest_spawn_point: Option<String>,
    /// Whether the player is standing on the objective.
    pub is_capturing: bool,
}

impl Player {
    /// A fresh roster entry with no deaths and no spawn history.
    pub const fn new(id: UserId, team: Team, alias: String) -> Self {
        Self {
            id,
            team,
            alias,
            deaths: 0,
            latest_spawn_point: None,
            is_capturing: false,
        }
    }

    /// Clear per-game state (deaths, capture flag, last spawn).
    pub fn reset_for_game(&mut self) {
        self.deaths = 0;
        self.is_capturing = false;
        self.latest_spawn_point = None;
    }
}

/// Respawn locations for one objective.
///
/// `capturing` serves the team holding the point, `other` serves the
/// opposing team, and `neutral` is a pair of alternative subsets used
/// while nobody (or everybody) holds it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpawnGraph {
    /// Spawns for the team that owns the objective.
    #[serde(default)]
    pub capturing: Vec<String>,
    /// Spawns for the team that does not own the objective.
    #[serde(default)]
    pub other: Vec<String>,
    /// Two alternative spawn subsets for a neutral or contested objective.
    #[serde(default)]
    pub neutral: (Vec<String>, Vec<String>),
}

impl SpawnGraph {
    /// Iterate over every spawn name mentioned by this graph.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.capturing
            .iter()
            .chain(&self.other)
            .chain(&self.neutral.0)
            .chain(&self.neutral.1)
            .map(String::as_str)
    }
}

/// Where the session is attached on the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelBinding {
    /// Guild the session is bound to.
    pub guild_id: Option<GuildId>,
    /// Display name of that guild.
    pub guild_name: Option<String>,
    /// Text channel announcements go to.
    pub text_channel_id: Option<ChannelId>,
    /// Display name of the text channel.
    pub text_channel_name: Option<String>,
    /// Voice channel the bot has joined.
    pub voice_channel_id: Option<ChannelId>,
    /// Display name of the voice channel.
    pub voice_channel_name: Option<String>,
}

impl ChannelBinding {
    /// Whether a voice channel is attached.
    pub const fn has_voice(&self) -> bool {
        self.voice_channel_id.is_some() && self.voice_channel_name.is_some()
    }

    /// Human-readable `guild: channel` label.
    pub fn label(&self) -> String {
        format!(
            "{}: {}",
            self.guild_name.as_deref().unwrap_or("?"),
            self.text_channel_name.as_deref().unwrap_or("?")
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn spawn_graph_parses_neutral_pair() {
        let json = r#"{
            "capturing": ["gazebo", "junk"],
            "other": ["garage"],
            "neutral": [["garage", "garden north"], ["garden south"]]
        }"#;
        let graph: SpawnGraph = serde_json::from_str(json).unwrap();
        assert_eq!(graph.neutral.0, vec!["garage", "garden north"]);
        assert_eq!(graph.neutral.1, vec!["garden south"]);
        assert_eq!(graph.names().count(), 6);
    }

    #[test]
    fn reset_for_game_clears_history() {
        let mut player = Player::new(UserId::new("1"), Team::Red, String::from("Swappy"));
        player.deaths = 4;
        player.is_capturing = true;
        player.latest_spawn_point = Some(String::from("hedge"));
        player.reset_for_game();
        assert_eq!(player.deaths, 0);
        assert!(!player.is_capturing);
        assert!(player.latest_spawn_point.is_none());
    }

    #[test]
    fn binding_requires_both_voice_fields() {
        let mut binding = ChannelBinding::default();
        assert!(!binding.has_voice());
        binding.voice_channel_id = Some(ChannelId::new("9"));
        assert!(!binding.has_voice());
        binding.voice_channel_name = Some(String::from("General"));
        assert!(binding.has_voice());
    }
}
