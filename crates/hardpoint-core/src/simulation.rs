//! Game simulation timers and the end of a game.
//!
//! Starting a game attaches two periodic timers (scoring and rotation) to
//! the session document. They never touch the document themselves: each
//! tick pushes a `GameUpdate` event whose action runs the tick during a
//! drain, so ticks and commands are ordered purely by enqueue order.
//!
//! Timer tasks are aborted when their [`TimerHandle`] is dropped, which
//! happens on game end, on disconnect (the whole document is replaced) and
//! when a new pair is attached over an old one.

use std::time::Duration;

use hardpoint_types::{Event, Team};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::announce::Announcer;
use crate::machine::{ActionOutcome, EventSender, QueuedEvent};
use crate::rotation;
use crate::scoring::{self, score_line};
use crate::session::{GameRules, SessionDocument};

/// A periodic task that stops when dropped.
#[derive(Debug)]
pub struct TimerHandle {
    name: &'static str,
    task: JoinHandle<()>,
}

impl TimerHandle {
    fn every<F>(handle: &Handle, name: &'static str, period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let task = handle.spawn(async move {
            let first = Instant::now().checked_add(period).unwrap_or_else(Instant::now);
            let mut ticker = tokio::time::interval_at(first, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !on_tick() {
                    break;
                }
            }
        });
        debug!(timer = name, period_ms = duration_ms(period), "Timer started");
        Self { name, task }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
        debug!(timer = self.name, "Timer stopped");
    }
}

/// The scoring and rotation timers of a running game.
#[derive(Debug)]
pub struct SimulationTimers {
    _scoring: TimerHandle,
    _rotation: TimerHandle,
}

impl SimulationTimers {
    /// Start both timers. Returns `None` outside a tokio runtime or if a
    /// configured period is zero.
    pub fn start(events: &EventSender, announcer: &Announcer, rules: &GameRules) -> Option<Self> {
        let Ok(handle) = Handle::try_current() else {
            warn!("No async runtime, simulation timers not started");
            return None;
        };
        let score_period = Duration::from_millis(rules.score_period_ms);
        let rotation_period = Duration::from_secs(rules.rotation_secs);
        if score_period.is_zero() || rotation_period.is_zero() {
            warn!(
                score_period_ms = rules.score_period_ms,
                rotation_secs = rules.rotation_secs,
                "Timer period is zero, simulation timers not started"
            );
            return None;
        }

        let scoring = {
            let events = events.clone();
            let announcer = announcer.clone();
            TimerHandle::every(&handle, "scoring", score_period, move || {
                events.push(scoring_event(announcer.clone()))
            })
        };
        let rotation = {
            let events = events.clone();
            let announcer = announcer.clone();
            TimerHandle::every(&handle, "rotation", rotation_period, move || {
                events.push(rotation_event(announcer.clone()))
            })
        };
        Some(Self {
            _scoring: scoring,
            _rotation: rotation,
        })
    }
}

/// `GameUpdate` running one scoring tick; queues the game end when the
/// clock runs out.
pub fn scoring_event(announcer: Announcer) -> QueuedEvent {
    QueuedEvent::new(Event::GameUpdate, move |document, events| {
        let tick = scoring::score_tick(document, &announcer);
        if tick.end_requested {
            info!(clock = document.game_clock(), "Time limit reached");
            events.push(game_over_event(announcer, false));
        }
        Ok(ActionOutcome::Commit)
    })
}

/// `GameUpdate` rotating to the next objective.
pub fn rotation_event(announcer: Announcer) -> QueuedEvent {
    QueuedEvent::new(Event::GameUpdate, move |document, _| {
        if let Some(next) = rotation::rotate(document, &announcer) {
            info!(objective = %next, "Hardpoint rotated");
        }
        Ok(ActionOutcome::Commit)
    })
}

/// `GameDone`: announce the result and stop both timers.
pub fn game_over_event(announcer: Announcer, canceled: bool) -> QueuedEvent {
    QueuedEvent::new(Event::GameDone, move |document, _| {
        finish_game(document, &announcer, canceled);
        Ok(ActionOutcome::Commit)
    })
}

/// Announce the end of the game and drop the timers.
pub fn finish_game(document: &mut SessionDocument, announcer: &Announcer, canceled: bool) {
    if canceled {
        announcer.announce(document.binding(), "the game was canceled early");
    }
    announcer.text_only(
        document.binding(),
        format!("Game complete. Summary:\n{}", score_line(document)),
    );

    let red = document.score(Team::Red);
    let blue = document.score(Team::Blue);
    let verdict = match red.cmp(&blue) {
        core::cmp::Ordering::Greater => {
            format!("Game over, red wins by {} points", red.saturating_sub(blue))
        }
        core::cmp::Ordering::Less => {
            format!("Game over, blue wins by {} points", blue.saturating_sub(red))
        }
        core::cmp::Ordering::Equal => format!("Game over, tied at {red}"),
    };
    announcer.announce(document.binding(), verdict);

    document.clear_timers();
    info!(canceled, red, blue, clock = document.game_clock(), "Game finished");
}

fn duration_ms(period: Duration) -> u64 {
    u64::try_from(period.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hardpoint_types::{ChannelId, GuildId, State};

    use super::*;
    use crate::machine::StateMachine;
    use crate::session::SessionDefaults;
    use crate::table::TransitionTable;

    fn playing(rules: GameRules) -> (StateMachine, Announcer) {
        let document = SessionDocument::new(SessionDefaults {
            objectives: vec![String::from("a"), String::from("b")],
            rules,
            seed: Some(2),
            ..SessionDefaults::default()
        });
        let mut sm = StateMachine::new(
            "test",
            TransitionTable::standard(),
            document,
            Duration::from_secs(10),
        )
        .unwrap();
        let (announcer, _rx) = Announcer::channel();
        let sender = sm.sender();
        sender.push(QueuedEvent::new(Event::Connect, |doc, _| {
            doc.bind_guild(
                GuildId::new("g"),
                String::from("Guild"),
                ChannelId::new("t"),
                String::from("general"),
            );
            Ok(ActionOutcome::Commit)
        }));
        let timer_announcer = announcer.clone();
        sender.push(QueuedEvent::new(Event::Start, move |doc, events| {
            doc.reset_for_start();
            if let Some(timers) = SimulationTimers::start(events, &timer_announcer, doc.rules()) {
                doc.attach_timers(timers);
            }
            Ok(ActionOutcome::Commit)
        }));
        sm.drain();
        (sm, announcer)
    }

    #[tokio::test(start_paused = true)]
    async fn timers_feed_the_queue() {
        let (mut sm, _announcer) = playing(GameRules {
            rotation_secs: 3,
            ..GameRules::default()
        });
        assert_eq!(sm.state(), State::PlayingDefault);
        assert!(sm.document().timers_running());

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        let report = sm.drain();

        // three scoring ticks and one rotation
        assert_eq!(report.committed, 4);
        assert_eq!(sm.document().game_clock(), 3);
        assert_eq!(sm.document().active_objective(), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn running_out_of_time_ends_the_game() {
        let (mut sm, _announcer) = playing(GameRules {
            time_limit_secs: 2,
            warning_thresholds_secs: Vec::new(),
            ..GameRules::default()
        });

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        sm.drain();
        sm.drain();

        assert_eq!(sm.state(), State::Connected);
        assert!(!sm.document().timers_running());
    }

    #[tokio::test(start_paused = true)]
    async fn game_over_stops_timers() {
        let (mut sm, announcer) = playing(GameRules::default());
        sm.sender().push(game_over_event(announcer, true));
        sm.drain();
        assert_eq!(sm.state(), State::Connected);
        assert!(!sm.document().timers_running());

        // aborted timers push nothing more
        tokio::time::sleep(Duration::from_secs(5)).await;
        let report = sm.drain();
        assert_eq!(report.committed, 0);
        assert_eq!(sm.document().game_clock(), 0);
    }

    #[test]
    fn timers_need_a_runtime() {
        let (announcer, _rx) = Announcer::channel();
        let document = SessionDocument::new(SessionDefaults::default());
        let sm = StateMachine::new(
            "test",
            TransitionTable::standard(),
            document,
            Duration::from_secs(1),
        )
        .unwrap();
        assert!(SimulationTimers::start(&sm.sender(), &announcer, &GameRules::default()).is_none());
    }

    #[test]
    fn finish_game_reports_winner() {
        let mut doc = SessionDocument::new(SessionDefaults::default());
        doc.bind_guild(
            GuildId::new("g"),
            String::from("Guild"),
            ChannelId::new("t"),
            String::from("general"),
        );
        doc.add_score(Team::Blue, 7);
        doc.add_score(Team::Red, 2);
        doc.advance_clock(65);
        let (announcer, mut rx) = Announcer::channel();

        finish_game(&mut doc, &announcer, false);

        let summary = rx.try_recv().unwrap();
        assert!(!summary.speak);
        assert!(summary.text.ends_with("[01:05] | Red 2 vs 7 Blue"));
        assert_eq!(rx.try_recv().unwrap().text, "Game over, blue wins by 5 points");
    }

    #[test]
    fn finish_game_reports_tie_and_cancel() {
        let mut doc = SessionDocument::new(SessionDefaults::default());
        let (announcer, mut rx) = Announcer::channel();
        finish_game(&mut doc, &announcer, true);
        let said: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|a| a.text)
            .collect();
        assert_eq!(said.first().map(String::as_str), Some("the game was canceled early"));
        assert_eq!(said.last().map(String::as_str), Some("Game over, tied at 0"));
    }
}
