//! Console collaborators: a chat platform and a speech engine backed by
//! stdin and stdout.
//!
//! Members and channels come from the `chat` config section. Messages are
//! printed as `#channel @user text`, and spoken announcements are printed
//! again with a `(voice)` tag. A line of the form `say <words>` is treated
//! as speech from the operator in the joined voice channel, so the whole
//! voice path (capture, transcription, phrase interpretation) runs
//! without audio hardware.

use std::collections::BTreeMap;

use hardpoint_core::chat::{ChatClient, ChatError, VoiceClip, VoiceSink};
use hardpoint_core::command::ParsedMessage;
use hardpoint_core::config::ChatConfig;
use hardpoint_core::speech::{SpeechClient, SpeechError};
use hardpoint_types::{ChannelId, ChannelKind, CommandOrigin, GuildId, UserId};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Errors turning a console line into a message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsoleError {
    /// The line could not be split into words.
    #[error("unbalanced quotes in [{line}]")]
    UnbalancedQuotes {
        /// The offending line.
        line: String,
    },
}

/// Split a console line into a [`ParsedMessage`].
///
/// Returns `None` when the line does not start with `prefix`. Words
/// starting with `--` are named arguments: `--key value`, `--key=value`,
/// or a bare `--flag` (stored as `"true"`). Everything else is a
/// positional token.
pub fn parse_line(prefix: &str, line: &str) -> Option<Result<ParsedMessage, ConsoleError>> {
    let body = line.trim().strip_prefix(prefix)?;
    let Some(words) = shlex::split(body) else {
        return Some(Err(ConsoleError::UnbalancedQuotes {
            line: line.to_owned(),
        }));
    };

    let mut tokens = Vec::new();
    let mut args = BTreeMap::new();
    let mut words = words.into_iter().peekable();
    while let Some(word) = words.next() {
        let Some(key) = word.strip_prefix("--") else {
            tokens.push(word);
            continue;
        };
        if let Some((key, value)) = key.split_once('=') {
            args.insert(key.to_owned(), value.to_owned());
            continue;
        }
        let value = words
            .next_if(|next| !next.starts_with("--"))
            .unwrap_or_else(|| String::from("true"));
        args.insert(key.to_owned(), value);
    }
    Some(Ok(ParsedMessage::new(tokens, args)))
}

struct VoiceConnection {
    channel: ChannelId,
    channel_name: String,
    sink: VoiceSink,
}

/// A single-guild chat platform on the terminal.
pub struct ConsoleChat {
    guild_id: GuildId,
    guild_name: String,
    operator_id: UserId,
    operator_name: String,
    members: BTreeMap<String, UserId>,
    text_channels: BTreeMap<String, ChannelId>,
    voice_channels: BTreeMap<String, ChannelId>,
    voice: Mutex<Option<VoiceConnection>>,
}

impl ConsoleChat {
    /// Build the console guild from config. The operator is always a member.
    pub fn new(config: &ChatConfig) -> Self {
        let ids = |map: &BTreeMap<String, String>| {
            map.iter()
                .map(|(name, id)| (name.clone(), ChannelId::new(id.as_str())))
                .collect::<BTreeMap<_, _>>()
        };
        let mut members: BTreeMap<String, UserId> = config
            .members
            .iter()
            .map(|(name, id)| (name.clone(), UserId::new(id.as_str())))
            .collect();
        members
            .entry(config.operator_name.clone())
            .or_insert_with(|| UserId::new(config.operator_id.as_str()));

        Self {
            guild_id: GuildId::new(config.guild_id.as_str()),
            guild_name: config.guild_name.clone(),
            operator_id: UserId::new(config.operator_id.as_str()),
            operator_name: config.operator_name.clone(),
            members,
            text_channels: ids(&config.channels.text),
            voice_channels: ids(&config.channels.voice),
            voice: Mutex::new(None),
        }
    }

    /// Where console input comes from: the operator in the first text
    /// channel.
    pub fn origin(&self) -> CommandOrigin {
        let (channel_name, channel_id) = self
            .text_channels
            .iter()
            .next()
            .map_or_else(
                || (String::from("console"), ChannelId::new("console")),
                |(name, id)| (name.clone(), id.clone()),
            );
        CommandOrigin {
            guild_id: self.guild_id.clone(),
            guild_name: self.guild_name.clone(),
            channel_id,
            channel_name,
            user_id: self.operator_id.clone(),
            user_name: self.operator_name.clone(),
        }
    }

    /// Deliver `words` as operator speech in the joined voice channel.
    /// Returns `false` if no voice channel is joined.
    pub async fn speak(&self, words: &str) -> bool {
        let voice = self.voice.lock().await;
        let Some(connection) = voice.as_ref() else {
            return false;
        };
        let clip = VoiceClip {
            guild_id: self.guild_id.clone(),
            channel_id: connection.channel.clone(),
            channel_name: connection.channel_name.clone(),
            user_id: self.operator_id.clone(),
            user_name: self.operator_name.clone(),
            audio: words.as_bytes().to_vec(),
        };
        connection.sink.send(clip).is_ok()
    }

    fn check_guild(&self, guild: &GuildId) -> Result<(), ChatError> {
        if *guild == self.guild_id {
            Ok(())
        } else {
            Err(ChatError::UnknownGuild {
                guild: guild.clone(),
            })
        }
    }

    fn channel_name(&self, channel: &ChannelId) -> Option<&str> {
        self.text_channels
            .iter()
            .chain(&self.voice_channels)
            .find(|(_, id)| *id == channel)
            .map(|(name, _)| name.as_str())
    }
}

#[async_trait::async_trait]
impl ChatClient for ConsoleChat {
    async fn send_message(
        &self,
        channel: &ChannelId,
        mention: Option<&UserId>,
        text: &str,
    ) -> Result<(), ChatError> {
        let name = self.channel_name(channel).ok_or_else(|| ChatError::UnknownChannel {
            channel: channel.to_string(),
        })?;
        let tag = mention.map(|user| format!("@{user} ")).unwrap_or_default();
        println!("#{name} {tag}{text}");
        Ok(())
    }

    async fn resolve_member(
        &self,
        guild: &GuildId,
        name: &str,
    ) -> Result<Option<UserId>, ChatError> {
        self.check_guild(guild)?;
        Ok(self.members.get(name).cloned())
    }

    async fn channels(
        &self,
        guild: &GuildId,
        kind: ChannelKind,
    ) -> Result<BTreeMap<String, ChannelId>, ChatError> {
        self.check_guild(guild)?;
        Ok(match kind {
            ChannelKind::Text => self.text_channels.clone(),
            ChannelKind::Voice => self.voice_channels.clone(),
        })
    }

    async fn join_voice(
        &self,
        guild: &GuildId,
        channel: &ChannelId,
        sink: VoiceSink,
    ) -> Result<(), ChatError> {
        self.check_guild(guild)?;
        let channel_name = self
            .voice_channels
            .iter()
            .find(|(_, id)| *id == channel)
            .map(|(name, _)| name.clone())
            .ok_or_else(|| ChatError::UnknownChannel {
                channel: channel.to_string(),
            })?;
        info!(channel = %channel_name, "Joined voice channel, use `say <words>` to speak");
        *self.voice.lock().await = Some(VoiceConnection {
            channel: channel.clone(),
            channel_name,
            sink,
        });
        Ok(())
    }

    async fn leave_voice(&self, guild: &GuildId) -> Result<(), ChatError> {
        self.check_guild(guild)?;
        if let Some(connection) = self.voice.lock().await.take() {
            info!(channel = %connection.channel_name, "Left voice channel");
        }
        Ok(())
    }

    async fn play_audio(&self, guild: &GuildId, audio: Vec<u8>) -> Result<(), ChatError> {
        self.check_guild(guild)?;
        let voice = self.voice.lock().await;
        let connection = voice.as_ref().ok_or_else(|| ChatError::NoVoiceConnection {
            guild: guild.clone(),
        })?;
        println!(
            "({}) {}",
            connection.channel_name,
            String::from_utf8_lossy(&audio)
        );
        Ok(())
    }
}

/// Text stands in for audio in both directions. Words that match a hint
/// case-insensitively are rewritten to the hint's spelling.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSpeech;

#[async_trait::async_trait]
impl SpeechClient for ConsoleSpeech {
    async fn transcribe(&self, audio: &[u8], hints: &[&str]) -> Result<String, SpeechError> {
        let text = std::str::from_utf8(audio).map_err(|e| SpeechError::Transcription {
            reason: e.to_string(),
        })?;
        let transcript = text
            .split_whitespace()
            .map(|word| {
                hints
                    .iter()
                    .find(|hint| hint.eq_ignore_ascii_case(word))
                    .map_or(word, |hint| *hint)
            })
            .collect::<Vec<_>>()
            .join(" ");
        debug!(transcript = %transcript, hints = hints.len(), "Transcribed");
        Ok(transcript)
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechError> {
        Ok(text.as_bytes().to_vec())
    }
}
