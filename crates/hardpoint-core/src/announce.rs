//! Outbound announcements.
//!
//! Actions run inside a drain and must not block, so they never call the
//! chat collaborator themselves. They hand an [`Announcement`] to the
//! [`Announcer`], and [`deliver`] forwards the queue to the
//! [`ChatClient`] one message at a time. When an announcement is spoken,
//! its audio is synthesized and played before the next message is
//! handled, so voice playback is strictly sequential.

use std::sync::Arc;

use hardpoint_types::{ChannelBinding, ChannelId, CommandOrigin, GuildId, UserId};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::chat::ChatClient;
use crate::speech::SpeechClient;

/// One message bound for the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    /// Message body.
    pub text: String,
    /// Guild whose voice channel should speak it.
    pub guild_id: Option<GuildId>,
    /// Text channel to post to.
    pub channel_id: Option<ChannelId>,
    /// User to tag.
    pub mention: Option<UserId>,
    /// Whether to also speak it in the voice channel.
    pub speak: bool,
}

/// Cheap handle for queueing announcements.
#[derive(Debug, Clone)]
pub struct Announcer {
    tx: mpsc::UnboundedSender<Announcement>,
}

impl Announcer {
    /// Create an announcer and the receiving end for [`deliver`].
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Announcement>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Post to the bound text channel and speak it if voice is attached.
    pub fn announce(&self, binding: &ChannelBinding, text: impl Into<String>) {
        self.send(binding, None, binding.has_voice(), text.into());
    }

    /// Post to the bound text channel without speaking.
    pub fn text_only(&self, binding: &ChannelBinding, text: impl Into<String>) {
        self.send(binding, None, false, text.into());
    }

    /// Post to the bound text channel tagging `user`, and speak it if voice
    /// is attached.
    pub fn reply(&self, binding: &ChannelBinding, user: &UserId, text: impl Into<String>) {
        self.send(binding, Some(user.clone()), binding.has_voice(), text.into());
    }

    /// Answer on the channel a command came from. Used before the session
    /// is bound and for command-level errors; never spoken.
    pub fn reply_to(&self, origin: &CommandOrigin, text: impl Into<String>) {
        let text = text.into();
        info!(channel = %origin.channel_id, user = %origin.user_name, "{text}");
        self.push(Announcement {
            text,
            guild_id: Some(origin.guild_id.clone()),
            channel_id: Some(origin.channel_id.clone()),
            mention: Some(origin.user_id.clone()),
            speak: false,
        });
    }

    fn send(&self, binding: &ChannelBinding, mention: Option<UserId>, speak: bool, text: String) {
        info!(channel = %binding.label(), speak, "{text}");
        self.push(Announcement {
            text,
            guild_id: binding.guild_id.clone(),
            channel_id: binding.text_channel_id.clone(),
            mention,
            speak,
        });
    }

    fn push(&self, announcement: Announcement) {
        if self.tx.send(announcement).is_err() {
            debug!("Announcement pump stopped, message dropped");
        }
    }
}

/// Forward announcements to the chat platform until every [`Announcer`] is
/// dropped.
pub async fn deliver(
    mut rx: mpsc::UnboundedReceiver<Announcement>,
    chat: Arc<dyn ChatClient>,
    speech: Option<Arc<dyn SpeechClient>>,
) {
    let mut delivered: u64 = 0;
    while let Some(announcement) = rx.recv().await {
        let Some(channel) = announcement.channel_id.as_ref() else {
            debug!(text = %announcement.text, "No text channel bound, announcement skipped");
            continue;
        };

        if let Err(e) = chat
            .send_message(channel, announcement.mention.as_ref(), &announcement.text)
            .await
        {
            warn!(channel = %channel, error = %e, "Failed to send announcement");
            continue;
        }
        delivered = delivered.saturating_add(1);

        if !announcement.speak {
            continue;
        }
        let (Some(speech), Some(guild)) = (speech.as_ref(), announcement.guild_id.as_ref()) else {
            continue;
        };
        match speech.synthesize(&announcement.text).await {
            Ok(audio) => {
                if let Err(e) = chat.play_audio(guild, audio).await {
                    warn!(guild = %guild, error = %e, "Failed to play announcement");
                }
            }
            Err(e) => warn!(error = %e, "Failed to synthesize announcement"),
        }
    }
    info!(delivered, "Announcement pump stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use hardpoint_types::ChannelKind;

    use super::*;
    use crate::chat::{ChatError, VoiceSink};
    use crate::speech::SpeechError;

    #[derive(Default)]
    struct Recorder {
        log: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl ChatClient for Recorder {
        async fn send_message(
            &self,
            channel: &ChannelId,
            mention: Option<&UserId>,
            text: &str,
        ) -> Result<(), ChatError> {
            let tag = mention.map(|m| format!("@{m} ")).unwrap_or_default();
            self.log.lock().unwrap().push(format!("send {channel}: {tag}{text}"));
            Ok(())
        }

        async fn resolve_member(
            &self,
            _guild: &GuildId,
            _name: &str,
        ) -> Result<Option<UserId>, ChatError> {
            Ok(None)
        }

        async fn channels(
            &self,
            _guild: &GuildId,
            _kind: ChannelKind,
        ) -> Result<BTreeMap<String, ChannelId>, ChatError> {
            Ok(BTreeMap::new())
        }

        async fn join_voice(
            &self,
            _guild: &GuildId,
            _channel: &ChannelId,
            _sink: VoiceSink,
        ) -> Result<(), ChatError> {
            Ok(())
        }

        async fn leave_voice(&self, _guild: &GuildId) -> Result<(), ChatError> {
            Ok(())
        }

        async fn play_audio(&self, guild: &GuildId, audio: Vec<u8>) -> Result<(), ChatError> {
            let text = String::from_utf8(audio).unwrap();
            self.log.lock().unwrap().push(format!("play {guild}: {text}"));
            Ok(())
        }
    }

    struct Echo;

    #[async_trait::async_trait]
    impl SpeechClient for Echo {
        async fn transcribe(&self, audio: &[u8], _hints: &[&str]) -> Result<String, SpeechError> {
            Ok(String::from_utf8_lossy(audio).into_owned())
        }

        async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechError> {
            Ok(text.as_bytes().to_vec())
        }
    }

    fn bound(voice: bool) -> ChannelBinding {
        ChannelBinding {
            guild_id: Some(GuildId::new("g")),
            guild_name: Some(String::from("Guild")),
            text_channel_id: Some(ChannelId::new("t")),
            text_channel_name: Some(String::from("general")),
            voice_channel_id: voice.then(|| ChannelId::new("v")),
            voice_channel_name: voice.then(|| String::from("General")),
        }
    }

    #[tokio::test]
    async fn spoken_announcements_are_played_after_posting() {
        let chat = Arc::new(Recorder::default());
        let (announcer, rx) = Announcer::channel();
        announcer.announce(&bound(true), "hardpoint is red");
        announcer.text_only(&bound(true), "status");
        drop(announcer);

        deliver(rx, chat.clone(), Some(Arc::new(Echo))).await;

        assert_eq!(
            chat.log.lock().unwrap().as_slice(),
            &[
                String::from("send t: hardpoint is red"),
                String::from("play g: hardpoint is red"),
                String::from("send t: status"),
            ]
        );
    }

    #[tokio::test]
    async fn unbound_announcements_are_skipped() {
        let chat = Arc::new(Recorder::default());
        let (announcer, rx) = Announcer::channel();
        announcer.announce(&ChannelBinding::default(), "nobody hears this");
        drop(announcer);

        deliver(rx, chat.clone(), None).await;

        assert!(chat.log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn replies_tag_the_user() {
        let chat = Arc::new(Recorder::default());
        let (announcer, rx) = Announcer::channel();
        announcer.reply(&bound(false), &UserId::new("u1"), "player added");
        drop(announcer);

        deliver(rx, chat.clone(), Some(Arc::new(Echo))).await;

        assert_eq!(
            chat.log.lock().unwrap().as_slice(),
            &[String::from("send t: @u1 player added")]
        );
    }
}
