//! End-to-end scenarios: commands in, announcements out, with the engine,
//! the dispatcher and the simulation timers wired together on a paused
//! tokio clock.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use hardpoint_core::announce::{Announcement, Announcer};
use hardpoint_core::chat::{ChatClient, ChatError, VoiceClip, VoiceSink};
use hardpoint_core::dispatch::Dispatcher;
use hardpoint_core::machine::StateMachine;
use hardpoint_core::session::{GameRules, SessionDefaults, SessionDocument};
use hardpoint_core::table::TransitionTable;
use hardpoint_types::{
    ChannelId, ChannelKind, Command, CommandOrigin, GuildId, SpawnGraph, State, Team, UserId,
};
use tokio::sync::mpsc;

/// A guild with one voice channel; joining it takes 50ms.
struct SlowGuild;

#[async_trait::async_trait]
impl ChatClient for SlowGuild {
    async fn send_message(
        &self,
        _channel: &ChannelId,
        _mention: Option<&UserId>,
        _text: &str,
    ) -> Result<(), ChatError> {
        Ok(())
    }

    async fn resolve_member(
        &self,
        _guild: &GuildId,
        name: &str,
    ) -> Result<Option<UserId>, ChatError> {
        Ok(Some(UserId::new(format!("id-{name}"))))
    }

    async fn channels(
        &self,
        _guild: &GuildId,
        kind: ChannelKind,
    ) -> Result<BTreeMap<String, ChannelId>, ChatError> {
        Ok(match kind {
            ChannelKind::Voice => BTreeMap::from([(String::from("General"), ChannelId::new("v"))]),
            ChannelKind::Text => BTreeMap::new(),
        })
    }

    async fn join_voice(
        &self,
        _guild: &GuildId,
        _channel: &ChannelId,
        _sink: VoiceSink,
    ) -> Result<(), ChatError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(())
    }

    async fn leave_voice(&self, _guild: &GuildId) -> Result<(), ChatError> {
        Ok(())
    }

    async fn play_audio(&self, _guild: &GuildId, _audio: Vec<u8>) -> Result<(), ChatError> {
        Ok(())
    }
}

struct Session {
    sm: StateMachine,
    dispatcher: Dispatcher,
    said: mpsc::UnboundedReceiver<Announcement>,
    _clips: mpsc::UnboundedReceiver<VoiceClip>,
}

impl Session {
    fn new(rules: GameRules) -> Self {
        let names = |v: &[&str]| v.iter().map(|&s| s.to_owned()).collect::<Vec<_>>();
        let graph = SpawnGraph {
            capturing: names(&["gazebo", "junk"]),
            other: names(&["garage"]),
            neutral: (names(&["hedge"]), names(&["driveway"])),
        };
        let document = SessionDocument::new(SessionDefaults {
            objectives: names(&["orange", "yellow"]),
            spawn_graphs: BTreeMap::from([
                (String::from("orange"), graph.clone()),
                (String::from("yellow"), graph),
            ]),
            rules,
            seed: Some(9),
            ..SessionDefaults::default()
        });
        let sm = StateMachine::new(
            "scenario",
            TransitionTable::standard(),
            document,
            Duration::from_secs(10),
        )
        .unwrap();
        let (announcer, said) = Announcer::channel();
        let (sink, clips) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(sm.sender(), announcer, Arc::new(SlowGuild), None, sink);
        Self {
            sm,
            dispatcher,
            said,
            _clips: clips,
        }
    }

    fn command(&mut self, user: &str, command: Command) {
        self.dispatcher.handle(&origin(user), command);
        self.sm.drain();
    }

    async fn wait(&mut self, millis: u64) {
        tokio::time::sleep(Duration::from_millis(millis)).await;
        self.sm.drain();
    }

    fn heard(&mut self) -> Vec<String> {
        std::iter::from_fn(|| self.said.try_recv().ok())
            .map(|a| a.text)
            .collect()
    }
}

fn origin(user: &str) -> CommandOrigin {
    CommandOrigin {
        guild_id: GuildId::new("g"),
        guild_name: String::from("Guild"),
        channel_id: ChannelId::new("t"),
        channel_name: String::from("general"),
        user_id: UserId::new(format!("id-{user}")),
        user_name: user.to_owned(),
    }
}

fn attach_general() -> Command {
    Command::Attach {
        channel: String::from("General"),
        kind: ChannelKind::Voice,
    }
}

fn add(name: &str, team: Team) -> Command {
    Command::AddPlayer {
        name: name.to_owned(),
        team,
        alias: name.to_owned(),
    }
}

#[tokio::test(start_paused = true)]
async fn red_holding_for_ten_ticks_scores_ten() {
    let mut s = Session::new(GameRules {
        time_limit_secs: 300,
        rotation_secs: 60,
        ..GameRules::default()
    });
    s.command("host", Command::Connect);
    s.command("host", attach_general());
    s.wait(100).await;
    s.command("host", add("ace", Team::Red));
    s.wait(1).await;
    s.command("host", add("bee", Team::Blue));
    s.wait(1).await;
    assert_eq!(s.sm.document().roster().len(), 2);

    s.command("host", Command::Start);
    assert_eq!(s.sm.state(), State::PlayingDefault);
    s.sm.drain();
    s.command(
        "ace",
        Command::Capture {
            name: None,
            seize: false,
        },
    );
    s.heard();

    s.wait(10_500).await;

    let doc = s.sm.document();
    assert_eq!(doc.score(Team::Red), 10);
    assert_eq!(doc.score(Team::Blue), 0);
    assert_eq!(doc.game_clock(), 0);
    let heard = s.heard();
    let ownership: Vec<&String> = heard
        .iter()
        .filter(|t| t.starts_with("hardpoint is"))
        .collect();
    assert_eq!(ownership, vec!["hardpoint is red"]);
}

#[tokio::test(start_paused = true)]
async fn settings_command_during_async_attach_is_rejected() {
    let mut s = Session::new(GameRules::default());
    s.command("host", Command::Connect);
    s.heard();

    s.command("host", attach_general());
    assert_eq!(s.sm.state(), State::ConnectedBusy);

    // join is still in flight
    s.wait(10).await;
    assert_eq!(s.sm.state(), State::ConnectedBusy);
    s.command("host", Command::PurgePlayers);
    assert_eq!(s.sm.state(), State::ConnectedBusy);
    assert_eq!(
        s.heard(),
        vec![String::from(
            "[settings_update] is not allowed while connected_busy"
        )]
    );

    s.wait(100).await;
    assert_eq!(s.sm.state(), State::Connected);
    assert!(s.sm.document().binding().has_voice());
}

#[tokio::test(start_paused = true)]
async fn game_runs_to_the_time_limit() {
    let mut s = Session::new(GameRules {
        time_limit_secs: 5,
        rotation_secs: 3,
        warning_thresholds_secs: vec![2],
        countdown_secs: 0,
        ..GameRules::default()
    });
    s.command("host", Command::Connect);
    s.command("host", attach_general());
    s.wait(100).await;
    s.command("host", Command::Start);
    s.heard();

    // six un-held seconds pass the limit; the game-over event lands on the
    // drain after the tick that requested it
    s.wait(6_500).await;
    s.sm.drain();

    assert_eq!(s.sm.state(), State::Connected);
    assert!(!s.sm.document().timers_running());
    let heard = s.heard();
    assert!(heard.contains(&String::from("2 seconds remaining")));
    assert!(heard.contains(&String::from("the new hardpoint is [yellow]")));
    assert_eq!(heard.last().map(String::as_str), Some("Game over, tied at 0"));
}
