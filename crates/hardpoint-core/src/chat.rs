//! Chat-platform collaborator boundary.
//!
//! The core never talks to a chat platform directly. It calls through
//! [`ChatClient`] from the announcement pump and from the async halves of
//! two-phase commands. Voice audio flows back in as [`VoiceClip`]s on the
//! [`VoiceSink`] handed over at join time.

use std::collections::BTreeMap;

use hardpoint_types::{ChannelId, ChannelKind, GuildId, UserId};
use tokio::sync::mpsc;

/// Errors returned by a chat collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    /// The guild is unknown to the client.
    #[error("unknown guild [{guild}]")]
    UnknownGuild {
        /// The guild that was asked for.
        guild: GuildId,
    },

    /// The channel is unknown to the client.
    #[error("unknown channel [{channel}]")]
    UnknownChannel {
        /// The channel that was asked for.
        channel: String,
    },

    /// No voice connection exists for the guild.
    #[error("not connected to voice in guild [{guild}]")]
    NoVoiceConnection {
        /// The guild that was asked for.
        guild: GuildId,
    },

    /// The underlying transport failed.
    #[error("chat transport error: {reason}")]
    Transport {
        /// Human-readable reason.
        reason: String,
    },
}

/// One utterance captured from a voice channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceClip {
    /// Guild the audio came from.
    pub guild_id: GuildId,
    /// Voice channel the audio came from.
    pub channel_id: ChannelId,
    /// Display name of that channel.
    pub channel_name: String,
    /// Speaker identity.
    pub user_id: UserId,
    /// Speaker display name, used as the implicit player name.
    pub user_name: String,
    /// Raw audio.
    pub audio: Vec<u8>,
}

/// Where a voice connection delivers captured audio.
pub type VoiceSink = mpsc::UnboundedSender<VoiceClip>;

/// Operations the core needs from a chat platform.
#[async_trait::async_trait]
pub trait ChatClient: Send + Sync {
    /// Send `text` to a channel, optionally tagging a user.
    async fn send_message(
        &self,
        channel: &ChannelId,
        mention: Option<&UserId>,
        text: &str,
    ) -> Result<(), ChatError>;

    /// Resolve a member name to a stable identity. `Ok(None)` if the guild
    /// has no such member.
    async fn resolve_member(&self, guild: &GuildId, name: &str)
    -> Result<Option<UserId>, ChatError>;

    /// Channels of `kind` in `guild`, keyed by name.
    async fn channels(
        &self,
        guild: &GuildId,
        kind: ChannelKind,
    ) -> Result<BTreeMap<String, ChannelId>, ChatError>;

    /// Join a voice channel; captured audio is sent to `sink`.
    async fn join_voice(
        &self,
        guild: &GuildId,
        channel: &ChannelId,
        sink: VoiceSink,
    ) -> Result<(), ChatError>;

    /// Leave whatever voice channel is joined in `guild`.
    async fn leave_voice(&self, guild: &GuildId) -> Result<(), ChatError>;

    /// Play synthesized audio into the guild's voice channel. Returns once
    /// playback has finished.
    async fn play_audio(&self, guild: &GuildId, audio: Vec<u8>) -> Result<(), ChatError>;
}
