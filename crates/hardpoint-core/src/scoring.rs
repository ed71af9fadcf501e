//! The scoring tick.
//!
//! Runs once per scoring period while a game is playing:
//!
//! 1. Periodic status summary (text only) and score-difference call-out.
//! 2. Re-tally captors and update the owner, announcing only on change.
//! 3. A held objective scores one point for its holder. Otherwise the game
//!    clock advances by one second and time warnings fire.
//! 4. Once the clock passes the time limit the end of the game is requested
//!    (once); the caller queues the game-over event.

use hardpoint_types::{Owner, Team};

use crate::announce::Announcer;
use crate::session::SessionDocument;
use crate::tally::CaptureTally;

/// What a scoring tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreTick {
    /// Tick number within the game, starting at 1.
    pub tick: u64,
    /// Owner after this tick.
    pub owner: Owner,
    /// Whether the owner changed on this tick.
    pub owner_changed: bool,
    /// Whether this tick asked for the game to end.
    pub end_requested: bool,
}

/// Apply one scoring tick to `document`.
pub fn score_tick(document: &mut SessionDocument, announcer: &Announcer) -> ScoreTick {
    let tick = document.advance_score_ticks();
    let rules = document.rules().clone();

    if every(tick, rules.status_every_ticks) {
        announcer.text_only(document.binding(), status_report(document));
    }
    if every(tick, rules.difference_every_ticks) {
        announcer.announce(document.binding(), score_difference(document));
    }

    let owner = CaptureTally::from_roster(document.roster()).owner();
    let owner_changed = document.set_owner(owner);
    if owner_changed {
        announcer.announce(document.binding(), format!("hardpoint is {owner}"));
    }

    if let Some(team) = owner.team() {
        document.add_score(team, 1);
    } else {
        document.advance_clock(1);
        let remaining = document.remaining_secs();
        for &threshold in &rules.warning_thresholds_secs {
            if remaining <= threshold && document.mark_warning(threshold) {
                announcer.announce(document.binding(), warning_text(threshold));
            }
        }
        if remaining > 0 && remaining <= rules.countdown_secs {
            announcer.announce(document.binding(), remaining.to_string());
        }
    }

    let end_requested = document.game_clock() > rules.time_limit_secs && document.request_end();

    ScoreTick {
        tick,
        owner,
        owner_changed,
        end_requested,
    }
}

fn every(tick: u64, period: u64) -> bool {
    tick.checked_rem(period) == Some(0)
}

fn warning_text(threshold: u64) -> String {
    if threshold == 60 {
        String::from("one minute remaining")
    } else {
        format!("{threshold} seconds remaining")
    }
}

/// `mm:ss` rendering of a clock in seconds.
pub fn format_clock(secs: u64) -> String {
    let mins = secs.checked_div(60).unwrap_or(0);
    let rest = secs.checked_rem(60).unwrap_or(0);
    format!("{mins:02}:{rest:02}")
}

/// `[mm:ss] | Red X vs Y Blue`.
pub fn score_line(document: &SessionDocument) -> String {
    format!(
        "[{}] | Red {} vs {} Blue",
        format_clock(document.game_clock()),
        document.score(Team::Red),
        document.score(Team::Blue)
    )
}

/// Multi-line status summary: score, objective, captors.
pub fn status_report(document: &SessionDocument) -> String {
    let mut lines = vec![
        score_line(document),
        format!(
            "Hardpoint: {} [{}]",
            document.active_objective().unwrap_or("none"),
            document.owner()
        ),
        String::from("Capturing:"),
    ];
    lines.extend(document.roster().iter().map(|(name, player)| {
        let verb = if player.is_capturing { "is" } else { "is not" };
        format!("  - {name} {verb} capturing")
    }));
    lines.join("\n")
}

/// Short spoken score call-out.
pub fn score_difference(document: &SessionDocument) -> String {
    let red = document.score(Team::Red);
    let blue = document.score(Team::Blue);
    match red.cmp(&blue) {
        core::cmp::Ordering::Greater => format!("{red} to {blue} red"),
        core::cmp::Ordering::Less => format!("{blue} to {red} blue"),
        core::cmp::Ordering::Equal => format!("tied at {red}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hardpoint_types::{ChannelId, GuildId, Player, UserId};
    use tokio::sync::mpsc;

    use super::*;
    use crate::announce::Announcement;
    use crate::session::{GameRules, SessionDefaults};

    fn document(rules: GameRules) -> SessionDocument {
        let mut doc = SessionDocument::new(SessionDefaults {
            objectives: vec![String::from("orange")],
            rules,
            seed: Some(5),
            ..SessionDefaults::default()
        });
        doc.bind_guild(
            GuildId::new("g"),
            String::from("Guild"),
            ChannelId::new("t"),
            String::from("general"),
        );
        doc.add_player(
            String::from("red1"),
            Player::new(UserId::new("1"), Team::Red, String::from("Red One")),
        );
        doc.add_player(
            String::from("blue1"),
            Player::new(UserId::new("2"), Team::Blue, String::from("Blue One")),
        );
        doc.reset_for_start();
        doc
    }

    fn quiet_rules() -> GameRules {
        GameRules {
            status_every_ticks: 0,
            difference_every_ticks: 0,
            ..GameRules::default()
        }
    }

    fn texts(rx: &mut mpsc::UnboundedReceiver<Announcement>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(a) = rx.try_recv() {
            out.push(a.text);
        }
        out
    }

    #[test]
    fn held_point_scores_and_freezes_clock() {
        let mut doc = document(quiet_rules());
        let (announcer, mut rx) = Announcer::channel();
        doc.set_capturing("red1", true);

        for _ in 0..3 {
            score_tick(&mut doc, &announcer);
        }

        assert_eq!(doc.score(Team::Red), 3);
        assert_eq!(doc.score(Team::Blue), 0);
        assert_eq!(doc.game_clock(), 0);
        assert_eq!(texts(&mut rx), vec![String::from("hardpoint is red")]);
    }

    #[test]
    fn contested_point_runs_the_clock() {
        let mut doc = document(quiet_rules());
        let (announcer, _rx) = Announcer::channel();
        doc.set_capturing("red1", true);
        doc.set_capturing("blue1", true);

        let tick = score_tick(&mut doc, &announcer);

        assert_eq!(tick.owner, Owner::Contested);
        assert_eq!(doc.game_clock(), 1);
        assert_eq!(doc.score(Team::Red), 0);
    }

    #[test]
    fn warnings_fire_once() {
        let mut doc = document(GameRules {
            time_limit_secs: 62,
            ..quiet_rules()
        });
        let (announcer, mut rx) = Announcer::channel();

        for _ in 0..3 {
            score_tick(&mut doc, &announcer);
        }

        let said = texts(&mut rx);
        assert_eq!(
            said.iter().filter(|t| *t == "one minute remaining").count(),
            1
        );
    }

    #[test]
    fn game_end_is_requested_once_past_the_limit() {
        let mut doc = document(GameRules {
            time_limit_secs: 2,
            countdown_secs: 0,
            warning_thresholds_secs: Vec::new(),
            ..quiet_rules()
        });
        let (announcer, _rx) = Announcer::channel();

        let ends: Vec<bool> = (0..5)
            .map(|_| score_tick(&mut doc, &announcer).end_requested)
            .collect();

        assert_eq!(ends, vec![false, false, true, false, false]);
    }

    #[test]
    fn final_countdown_is_spoken_and_pauses_while_held() {
        let mut doc = document(GameRules {
            time_limit_secs: 12,
            countdown_secs: 10,
            warning_thresholds_secs: Vec::new(),
            ..quiet_rules()
        });
        let (announcer, mut rx) = Announcer::channel();

        for _ in 0..6 {
            score_tick(&mut doc, &announcer);
        }
        assert_eq!(doc.game_clock(), 6);

        doc.set_capturing("red1", true);
        for _ in 0..3 {
            score_tick(&mut doc, &announcer);
        }
        assert_eq!(doc.game_clock(), 6);

        doc.set_capturing("red1", false);
        let mut ended = false;
        while !ended {
            ended = score_tick(&mut doc, &announcer).end_requested;
        }
        assert_eq!(doc.game_clock(), 13);

        let said = texts(&mut rx);
        let expected: Vec<String> = ["10", "9", "8", "7", "6"]
            .into_iter()
            .chain(["hardpoint is red", "hardpoint is neutral"])
            .chain(["5", "4", "3", "2", "1"])
            .map(String::from)
            .collect();
        assert_eq!(said, expected);
        assert!(!said.iter().any(|t| t == "0"));
    }

    #[test]
    fn status_is_text_only_and_periodic() {
        let mut doc = document(GameRules {
            status_every_ticks: 2,
            ..quiet_rules()
        });
        let (announcer, mut rx) = Announcer::channel();
        score_tick(&mut doc, &announcer);
        assert!(rx.try_recv().is_err());

        score_tick(&mut doc, &announcer);
        let status = rx.try_recv().unwrap();
        assert!(!status.speak);
        assert!(status.text.starts_with("[00:01] | Red 0 vs 0 Blue"));
        assert!(status.text.contains("red1 is not capturing"));
    }

    #[test]
    fn score_difference_wording() {
        let mut doc = document(quiet_rules());
        assert_eq!(score_difference(&doc), "tied at 0");
        doc.add_score(Team::Blue, 4);
        doc.add_score(Team::Red, 1);
        assert_eq!(score_difference(&doc), "4 to 1 blue");
    }

    #[test]
    fn clock_formatting() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(75), "01:15");
        assert_eq!(format_clock(600), "10:00");
    }

    #[test]
    fn owner_change_goes_to_the_bound_channel() {
        let mut doc = document(quiet_rules());
        let (announcer, mut rx) = Announcer::channel();
        doc.set_capturing("blue1", true);
        score_tick(&mut doc, &announcer);
        let a = rx.try_recv().unwrap();
        assert_eq!(a.text, "hardpoint is blue");
        assert_eq!(a.channel_id, Some(ChannelId::new("t")));
        assert!(!a.speak);
    }
}
