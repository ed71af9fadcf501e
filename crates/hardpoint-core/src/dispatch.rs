//! Command dispatch: every [`Command`] becomes exactly one queued event.
//!
//! The dispatcher never touches the session document. Each handler builds a
//! [`QueuedEvent`] (or a two-phase [`AsyncRequest`]) whose action does the
//! work during a drain, and attaches a failure continuation that answers
//! the sender with the reason.
//!
//! | Command                              | Event                   |
//! |--------------------------------------|-------------------------|
//! | connect                              | `connect`               |
//! | disconnect                           | `disconnect`            |
//! | attach, player add                   | `settings_update_async` |
//! | detach, player remove/purge/switch/list/set | `settings_update` |
//! | start                                | `start`                 |
//! | cancel                               | `game_done`             |
//! | capture, release, respawn, repeat    | `game_update`           |
//!
//! `help` and unparseable input are answered directly without queueing.

use std::sync::Arc;

use futures::FutureExt;
use hardpoint_types::{
    ChannelBinding, ChannelKind, Command, CommandOrigin, Event, GuildId, Player, Team, UserId,
};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::announce::Announcer;
use crate::chat::{ChatClient, VoiceClip, VoiceSink};
use crate::command::{HELP_TEXT, ParsedMessage, parse_command};
use crate::machine::{ActionError, ActionOutcome, EventSender, QueuedEvent, Rejection};
use crate::simulation::{SimulationTimers, game_over_event};
use crate::spawn;
use crate::speech::SpeechClient;
use crate::voice::{self, VoiceError};
use crate::workflow::{AsyncOperationError, AsyncRequest, Effect};

/// Turns commands into queued events.
pub struct Dispatcher {
    events: EventSender,
    announcer: Announcer,
    chat: Arc<dyn ChatClient>,
    speech: Option<Arc<dyn SpeechClient>>,
    voice_sink: VoiceSink,
}

impl Dispatcher {
    /// Build a dispatcher.
    ///
    /// `voice_sink` is handed to the chat client whenever a voice channel is
    /// joined; feed its receiving end to [`Dispatcher::listen`].
    pub fn new(
        events: EventSender,
        announcer: Announcer,
        chat: Arc<dyn ChatClient>,
        speech: Option<Arc<dyn SpeechClient>>,
        voice_sink: VoiceSink,
    ) -> Self {
        Self {
            events,
            announcer,
            chat,
            speech,
            voice_sink,
        }
    }

    /// Parse and dispatch a text message. Parse errors are answered on the
    /// origin channel and nothing is queued.
    pub fn handle_message(&self, origin: &CommandOrigin, message: &ParsedMessage) -> bool {
        match parse_command(message) {
            Ok(command) => self.handle(origin, command),
            Err(e) => {
                debug!(user = %origin.user_name, error = %e, "Command not understood");
                self.announcer.reply_to(origin, e.to_string());
                false
            }
        }
    }

    /// Dispatch a parsed command. Returns `false` if nothing was queued.
    pub fn handle(&self, origin: &CommandOrigin, command: Command) -> bool {
        info!(
            command = command.kind(),
            user = %origin.user_name,
            channel = %origin.channel_name,
            "Command received"
        );
        match command {
            Command::Connect => self.connect(origin),
            Command::Disconnect => self.disconnect(origin),
            Command::Attach { channel, kind } => self.attach(origin, channel, kind),
            Command::Detach => self.detach(origin),
            Command::AddPlayer { name, team, alias } => {
                self.add_player(origin, NewPlayer { name, team, alias })
            }
            Command::RemovePlayer { name } => self.remove_player(origin, name),
            Command::PurgePlayers => self.purge_players(origin),
            Command::SwitchTeam { name } => self.switch_team(origin, name),
            Command::ListPlayers => self.list_players(origin),
            Command::UpdatePlayer { name, team, alias } => {
                self.update_player(origin, name, team, alias)
            }
            Command::Start => self.start(origin),
            Command::Cancel => self.queue(origin, game_over_event(self.announcer.clone(), true)),
            Command::Capture { name, seize } => {
                self.capture(origin, player_name(origin, name), seize)
            }
            Command::Release { name } => self.release(origin, player_name(origin, name)),
            Command::Respawn { name } => self.queue(
                origin,
                respawn_event(self.announcer.clone(), player_name(origin, name)),
            ),
            Command::RepeatSpawn { name } => self.repeat_spawn(origin, player_name(origin, name)),
            Command::Help => {
                self.announcer.reply_to(origin, HELP_TEXT);
                false
            }
        }
    }

    /// Transcribe a voice clip and dispatch whatever command it contains.
    pub async fn handle_voice(&self, clip: VoiceClip) -> bool {
        let Some(speech) = self.speech.as_ref() else {
            debug!(user = %clip.user_name, "No speech client, voice clip ignored");
            return false;
        };
        let hints = voice::expected_words();
        let transcript = match speech.transcribe(&clip.audio, &hints).await {
            Ok(transcript) => transcript,
            Err(e) => {
                warn!(user = %clip.user_name, error = %e, "Failed to transcribe voice clip");
                return false;
            }
        };
        debug!(user = %clip.user_name, transcript = %transcript, "Heard");

        let origin = CommandOrigin {
            guild_id: clip.guild_id,
            guild_name: String::new(),
            channel_id: clip.channel_id,
            channel_name: clip.channel_name,
            user_id: clip.user_id,
            user_name: clip.user_name,
        };
        match voice::interpret(&transcript, &origin.user_name) {
            Ok(command) => self.handle(&origin, command),
            Err(e @ VoiceError::AliasMissing { .. }) => {
                self.announcer.reply_to(&origin, e.to_string());
                false
            }
            Err(e) => {
                debug!(user = %origin.user_name, error = %e, "No command in voice clip");
                false
            }
        }
    }

    /// Handle voice clips until every sender is dropped.
    pub async fn listen(&self, mut clips: mpsc::UnboundedReceiver<VoiceClip>) {
        while let Some(clip) = clips.recv().await {
            self.handle_voice(clip).await;
        }
        debug!("Voice listener stopped");
    }

    // -----------------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------------

    fn connect(&self, origin: &CommandOrigin) -> bool {
        let announcer = self.announcer.clone();
        let from = origin.clone();
        let queued = QueuedEvent::new(Event::Connect, move |document, _| {
            document.bind_guild(from.guild_id, from.guild_name, from.channel_id, from.channel_name);
            let binding = document.binding();
            announcer.reply(binding, &from.user_id, format!("connected to [{}]", binding.label()));
            Ok(ActionOutcome::Commit)
        });
        self.queue(origin, queued)
    }

    fn disconnect(&self, origin: &CommandOrigin) -> bool {
        let responder = self.responder(origin);
        let chat = Arc::clone(&self.chat);
        let queued = QueuedEvent::new(Event::Disconnect, move |document, _| {
            responder.say(document.binding(), "Ignoring this guild until connect command");
            if let (true, Some(guild)) = (
                document.binding().has_voice(),
                document.binding().guild_id.clone(),
            ) {
                leave_voice(chat, guild);
            }
            document.reset();
            Ok(ActionOutcome::Commit)
        });
        self.queue(origin, queued)
    }

    fn attach(&self, origin: &CommandOrigin, channel: String, kind: ChannelKind) -> bool {
        let chat = Arc::clone(&self.chat);
        let sink = self.voice_sink.clone();
        let responder = self.responder(origin);
        let request = AsyncRequest::new("attach", move |document| {
            let guild = document.binding().guild_id.clone();
            attach_channel(chat, guild, channel, kind, sink, responder).boxed()
        });
        self.queue_async(origin, request)
    }

    fn detach(&self, origin: &CommandOrigin) -> bool {
        let responder = self.responder(origin);
        let chat = Arc::clone(&self.chat);
        let queued = QueuedEvent::new(Event::SettingsUpdate, move |document, _| {
            let Some(name) = document.clear_voice_channel() else {
                return Err(ActionError::Precondition {
                    reason: String::from("not attached to a voice channel"),
                });
            };
            if let Some(guild) = document.binding().guild_id.clone() {
                leave_voice(chat, guild);
            }
            responder.say(document.binding(), format!("left voice channel: {name}"));
            Ok(ActionOutcome::Commit)
        });
        self.queue(origin, queued)
    }

    // -----------------------------------------------------------------------
    // Roster
    // -----------------------------------------------------------------------

    fn add_player(&self, origin: &CommandOrigin, new: NewPlayer) -> bool {
        let chat = Arc::clone(&self.chat);
        let responder = self.responder(origin);
        let request = AsyncRequest::new("player add", move |document| {
            if document.player(&new.name).is_some() {
                let err = AsyncOperationError::failed(
                    "player add",
                    format!("player already added [{}]", new.name),
                );
                return async move { Err(err) }.boxed();
            }
            let guild = document.binding().guild_id.clone();
            resolve_player(chat, guild, new, responder).boxed()
        });
        self.queue_async(origin, request)
    }

    fn remove_player(&self, origin: &CommandOrigin, name: String) -> bool {
        let responder = self.responder(origin);
        let queued = QueuedEvent::new(Event::SettingsUpdate, move |document, _| {
            if document.remove_player(&name).is_none() {
                return Err(unknown_player(&name));
            }
            responder.say(document.binding(), format!("player removed [{name}]"));
            Ok(ActionOutcome::Commit)
        });
        self.queue(origin, queued)
    }

    fn purge_players(&self, origin: &CommandOrigin) -> bool {
        let responder = self.responder(origin);
        let queued = QueuedEvent::new(Event::SettingsUpdate, move |document, _| {
            document.purge_players();
            responder.say(document.binding(), "all players purged");
            Ok(ActionOutcome::Commit)
        });
        self.queue(origin, queued)
    }

    fn switch_team(&self, origin: &CommandOrigin, name: String) -> bool {
        let responder = self.responder(origin);
        let queued = QueuedEvent::new(Event::SettingsUpdate, move |document, _| {
            let team = document
                .player(&name)
                .map(|p| p.team.other())
                .ok_or_else(|| unknown_player(&name))?;
            document.set_team(&name, team);
            responder.say(
                document.binding(),
                format!("player [{name}] switched teams to team [{team}]"),
            );
            Ok(ActionOutcome::Commit)
        });
        self.queue(origin, queued)
    }

    fn list_players(&self, origin: &CommandOrigin) -> bool {
        let announcer = self.announcer.clone();
        let queued = QueuedEvent::new(Event::SettingsUpdate, move |document, _| {
            let listing = serde_json::to_string_pretty(document.roster()).map_err(|e| {
                ActionError::Precondition {
                    reason: format!("failed to list players: {e}"),
                }
            })?;
            announcer.text_only(document.binding(), listing);
            Ok(ActionOutcome::Commit)
        });
        self.queue(origin, queued)
    }

    fn update_player(
        &self,
        origin: &CommandOrigin,
        name: String,
        team: Option<Team>,
        alias: Option<String>,
    ) -> bool {
        let responder = self.responder(origin);
        let queued = QueuedEvent::new(Event::SettingsUpdate, move |document, _| {
            if document.player(&name).is_none() {
                return Err(unknown_player(&name));
            }
            if let Some(team) = team {
                document.set_team(&name, team);
                responder.say(
                    document.binding(),
                    format!("player [{name}] is now on team [{team}]"),
                );
            }
            if let Some(alias) = alias {
                let text = format!("alias for player [{name}] is now [{alias}]");
                document.set_alias(&name, alias);
                responder.say(document.binding(), text);
            }
            Ok(ActionOutcome::Commit)
        });
        self.queue(origin, queued)
    }

    // -----------------------------------------------------------------------
    // Game
    // -----------------------------------------------------------------------

    fn start(&self, origin: &CommandOrigin) -> bool {
        let announcer = self.announcer.clone();
        let respawns = self.announcer.clone();
        let user = origin.user_id.clone();
        let queued = QueuedEvent::new(Event::Start, move |document, events| {
            if !document.binding().has_voice() {
                return Err(ActionError::NoVoiceChannel);
            }
            if document.objectives().is_empty() {
                return Err(ActionError::NoObjectives);
            }
            let timers = SimulationTimers::start(events, &announcer, document.rules())
                .ok_or(ActionError::NoTimers)?;
            let Some(first) = document.reset_for_start() else {
                return Err(ActionError::NoObjectives);
            };
            document.attach_timers(timers);
            announcer.reply(
                document.binding(),
                &user,
                format!("The first hard point is {first}"),
            );
            Ok(ActionOutcome::Commit)
        })
        .with_on_success(move |document, events| {
            for name in document.roster().keys() {
                events.push(respawn_event(respawns.clone(), name.clone()));
            }
        });
        self.queue(origin, queued)
    }

    fn capture(&self, origin: &CommandOrigin, name: String, seize: bool) -> bool {
        let announcer = self.announcer.clone();
        let queued = QueuedEvent::new(Event::GameUpdate, move |document, _| {
            let (team, alias) = document
                .player(&name)
                .map(|p| (p.team, p.alias.clone()))
                .ok_or_else(|| unknown_player(&name))?;
            if seize {
                document.release_team(team.other());
            }
            document.set_capturing(&name, true);
            let text = if seize {
                format!("{alias} seized the hardpoint")
            } else {
                format!("{alias} is capturing the hardpoint")
            };
            announcer.announce(document.binding(), text);
            Ok(ActionOutcome::Commit)
        });
        self.queue(origin, queued)
    }

    fn release(&self, origin: &CommandOrigin, name: String) -> bool {
        let announcer = self.announcer.clone();
        let queued = QueuedEvent::new(Event::GameUpdate, move |document, _| {
            let alias = document
                .player(&name)
                .map(|p| p.alias.clone())
                .ok_or_else(|| unknown_player(&name))?;
            document.set_capturing(&name, false);
            announcer.text_only(
                document.binding(),
                format!("{alias} is not capturing the hardpoint"),
            );
            Ok(ActionOutcome::Commit)
        });
        self.queue(origin, queued)
    }

    fn repeat_spawn(&self, origin: &CommandOrigin, name: String) -> bool {
        let announcer = self.announcer.clone();
        let queued = QueuedEvent::new(Event::GameUpdate, move |document, _| {
            let player = document.player(&name).ok_or_else(|| unknown_player(&name))?;
            let point = player.latest_spawn_point.as_deref().ok_or_else(|| {
                ActionError::Precondition {
                    reason: format!("player {} hasn't respawned yet", player.alias),
                }
            })?;
            announcer.reply(
                document.binding(),
                &player.id,
                format!("player {} last respawn was {point}", player.alias),
            );
            Ok(ActionOutcome::Commit)
        });
        self.queue(origin, queued)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn queue(&self, origin: &CommandOrigin, queued: QueuedEvent) -> bool {
        self.events.push(queued.with_on_failure(self.report_to(origin)))
    }

    fn queue_async(&self, origin: &CommandOrigin, request: AsyncRequest) -> bool {
        let announcer = self.announcer.clone();
        let from = origin.clone();
        self.events.push_async(
            request
                .with_on_error(move |err| announcer.reply_to(&from, err.to_string()))
                .with_on_rejected(self.report_to(origin)),
        )
    }

    fn report_to(&self, origin: &CommandOrigin) -> impl FnOnce(Rejection) + Send + 'static {
        let announcer = self.announcer.clone();
        let origin = origin.clone();
        move |rejection| announcer.reply_to(&origin, rejection.to_string())
    }

    fn responder(&self, origin: &CommandOrigin) -> Responder {
        Responder {
            announcer: self.announcer.clone(),
            user: origin.user_id.clone(),
        }
    }
}

impl core::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("speech", &self.speech.is_some())
            .finish_non_exhaustive()
    }
}

/// `game_update` assigning a respawn point to `name` and telling them.
pub fn respawn_event(announcer: Announcer, name: String) -> QueuedEvent {
    QueuedEvent::new(Event::GameUpdate, move |document, _| {
        let outcome = spawn::respawn(document, &name)?;
        let text = format!("player {} should respawn to {}", outcome.alias, outcome.point);
        match document.player(&name) {
            Some(player) => announcer.reply(document.binding(), &player.id, text),
            None => announcer.announce(document.binding(), text),
        }
        Ok(ActionOutcome::Commit)
    })
}

/// Announces on the bound channel, tagging whoever issued the command.
struct Responder {
    announcer: Announcer,
    user: UserId,
}

impl Responder {
    fn say(&self, binding: &ChannelBinding, text: impl Into<String>) {
        self.announcer.reply(binding, &self.user, text);
    }
}

struct NewPlayer {
    name: String,
    team: Team,
    alias: String,
}

fn player_name(origin: &CommandOrigin, name: Option<String>) -> String {
    name.unwrap_or_else(|| origin.user_name.clone())
}

fn unknown_player(name: &str) -> ActionError {
    ActionError::UnknownPlayer {
        name: name.to_owned(),
    }
}

fn not_connected(operation: &str) -> AsyncOperationError {
    AsyncOperationError::failed(operation, "not connected to a guild")
}

fn leave_voice(chat: Arc<dyn ChatClient>, guild: GuildId) {
    let Ok(handle) = Handle::try_current() else {
        warn!(guild = %guild, "No async runtime, voice channel not left");
        return;
    };
    handle.spawn(async move {
        if let Err(e) = chat.leave_voice(&guild).await {
            warn!(guild = %guild, error = %e, "Failed to leave voice channel");
        }
    });
}

async fn attach_channel(
    chat: Arc<dyn ChatClient>,
    guild: Option<GuildId>,
    channel: String,
    kind: ChannelKind,
    sink: VoiceSink,
    responder: Responder,
) -> Result<Effect, AsyncOperationError> {
    let guild = guild.ok_or_else(|| not_connected("attach"))?;
    let channels = chat
        .channels(&guild, kind)
        .await
        .map_err(|e| AsyncOperationError::failed("attach", e))?;
    let id = channels.get(&channel).cloned().ok_or_else(|| {
        AsyncOperationError::failed("attach", format!("{kind} channel doesn't exist [{channel}]"))
    })?;
    if kind == ChannelKind::Voice {
        chat.join_voice(&guild, &id, sink)
            .await
            .map_err(|e| AsyncOperationError::failed("attach", e))?;
    }

    let effect: Effect = Box::new(move |document, _| {
        let text = format!("attached to {kind} channel {channel}");
        document.bind_channel(kind, id, channel);
        responder.say(document.binding(), text);
    });
    Ok(effect)
}

async fn resolve_player(
    chat: Arc<dyn ChatClient>,
    guild: Option<GuildId>,
    new: NewPlayer,
    responder: Responder,
) -> Result<Effect, AsyncOperationError> {
    let guild = guild.ok_or_else(|| not_connected("player add"))?;
    let id = chat
        .resolve_member(&guild, &new.name)
        .await
        .map_err(|e| {
            AsyncOperationError::failed(
                "player add",
                format!("unable to fetch player [{}], got [{e}]", new.name),
            )
        })?
        .ok_or_else(|| {
            AsyncOperationError::failed("player add", format!("player wasn't found [{}]", new.name))
        })?;

    let effect: Effect = Box::new(move |document, _| {
        let NewPlayer { name, team, alias } = new;
        let text = format!("player [{name}] added to team [{team}] with alias [{alias}]");
        if document.add_player(name.clone(), Player::new(id, team, alias)) {
            responder.say(document.binding(), text);
        } else {
            responder.say(document.binding(), format!("player already added [{name}]"));
        }
    });
    Ok(effect)
}
