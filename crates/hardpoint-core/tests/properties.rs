//! Engine and simulation properties checked against the public API.
//!
//! Covers illegal transitions, FIFO draining with deferral, busy-state
//! exclusivity, objective ownership, spawn selection and rotation.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hardpoint_core::announce::Announcer;
use hardpoint_core::machine::{ActionOutcome, QueuedEvent, StateMachine};
use hardpoint_core::rotation;
use hardpoint_core::session::{SessionDefaults, SessionDocument};
use hardpoint_core::spawn::{self, choose_spawn, spawn_options};
use hardpoint_core::table::TransitionTable;
use hardpoint_core::tally::CaptureTally;
use hardpoint_types::{Event, Owner, Player, SpawnGraph, State, Team, UserId};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|&v| v.to_owned()).collect()
}

fn graph() -> SpawnGraph {
    SpawnGraph {
        capturing: names(&["gazebo", "cherry", "junk"]),
        other: names(&["garden north", "garden south", "garage"]),
        neutral: (names(&["garage", "garden north"]), names(&["garden south"])),
    }
}

fn defaults() -> SessionDefaults {
    SessionDefaults {
        objectives: names(&["A", "B", "C"]),
        spawn_graphs: BTreeMap::from([
            (String::from("A"), graph()),
            (String::from("B"), graph()),
            (String::from("C"), graph()),
        ]),
        seed: Some(42),
        ..SessionDefaults::default()
    }
}

fn machine_in(state: State) -> StateMachine {
    let mut sm = StateMachine::new(
        "props",
        TransitionTable::standard(),
        SessionDocument::new(defaults()),
        Duration::from_secs(10),
    )
    .unwrap();
    let path: &[Event] = match state {
        State::Disconnected => &[],
        State::Connected => &[Event::Connect],
        State::ConnectedBusy => &[Event::Connect, Event::SettingsUpdateAsync],
        State::PlayingDefault => &[Event::Connect, Event::Start],
    };
    let sender = sm.sender();
    for &event in path {
        sender.push(QueuedEvent::unconditional(event));
    }
    sm.drain();
    assert_eq!(sm.state(), state);
    sm
}

#[test]
fn illegal_events_change_nothing_and_fail_once() {
    let table = TransitionTable::standard();
    for state in State::ALL {
        for event in Event::ALL {
            if table.next(state, event).is_some() {
                continue;
            }
            let mut sm = machine_in(state);
            let before = sm.document().snapshot();
            let failures = Arc::new(Mutex::new(0_u32));
            let ran = Arc::new(Mutex::new(false));

            let counter = Arc::clone(&failures);
            let flag = Arc::clone(&ran);
            sm.sender().push(
                QueuedEvent::new(event, move |doc, _| {
                    *flag.lock().unwrap() = true;
                    doc.add_score(Team::Red, 5);
                    Ok(ActionOutcome::Commit)
                })
                .with_on_failure(move |_| {
                    let mut count = counter.lock().unwrap();
                    *count = count.saturating_add(1);
                }),
            );
            let report = sm.drain();

            assert_eq!(report.illegal, 1, "{state} + {event}");
            assert_eq!(sm.state(), state, "{state} + {event}");
            assert_eq!(sm.document().snapshot(), before, "{state} + {event}");
            assert_eq!(*failures.lock().unwrap(), 1, "{state} + {event}");
            assert!(!*ran.lock().unwrap(), "{state} + {event}");
        }
    }
}

#[test]
fn events_apply_in_enqueue_order_and_nested_pushes_wait() {
    let mut sm = machine_in(State::Connected);
    let order = Arc::new(Mutex::new(Vec::new()));
    let sender = sm.sender();

    for i in 0..3 {
        let log = Arc::clone(&order);
        sender.push(QueuedEvent::new(Event::SettingsUpdate, move |_, events| {
            log.lock().unwrap().push(i);
            if i == 0 {
                let nested = Arc::clone(&log);
                events.push(QueuedEvent::new(Event::SettingsUpdate, move |_, _| {
                    nested.lock().unwrap().push(99);
                    Ok(ActionOutcome::Commit)
                }));
            }
            Ok(ActionOutcome::Commit)
        }));
    }

    assert_eq!(sm.drain().processed, 3);
    assert_eq!(order.lock().unwrap().as_slice(), &[0, 1, 2]);

    assert_eq!(sm.drain().processed, 1);
    assert_eq!(order.lock().unwrap().as_slice(), &[0, 1, 2, 99]);
}

#[test]
fn busy_accepts_only_the_completion() {
    let mut sm = machine_in(State::ConnectedBusy);
    let sender = sm.sender();
    for event in Event::ALL {
        if event != Event::SettingsUpdateDone {
            sender.push(QueuedEvent::unconditional(event));
        }
    }
    let report = sm.drain();
    assert_eq!(report.illegal, 7);
    assert_eq!(sm.state(), State::ConnectedBusy);

    sender.push(QueuedEvent::unconditional(Event::SettingsUpdateDone));
    sm.drain();
    assert_eq!(sm.state(), State::Connected);
}

#[test]
fn ownership_follows_the_tally() {
    let owner = |red, blue| CaptureTally { red, blue }.owner();
    assert_eq!(owner(0, 0), Owner::Neutral);
    assert_eq!(owner(2, 0), Owner::Red);
    assert_eq!(owner(0, 3), Owner::Blue);
    assert_eq!(owner(1, 1), Owner::Contested);
}

#[test]
fn holders_always_spawn_from_capturing() {
    let graph = graph();
    for seed in 0..50 {
        let mut rng = StdRng::seed_from_u64(seed);
        let options = spawn_options(&graph, Owner::Blue, Team::Blue, None, Some("garage"));
        let pick = choose_spawn(&options, &mut rng).unwrap();
        assert!(graph.capturing.iter().any(|c| c == pick), "seed {seed}: {pick}");
    }
}

#[test]
fn seeded_respawns_are_reproducible() {
    let run = || {
        let mut doc = SessionDocument::new(defaults());
        doc.add_player(
            String::from("ace"),
            Player::new(UserId::new("1"), Team::Red, String::from("Ace")),
        );
        doc.reset_for_start();
        (0..10)
            .map(|_| spawn::respawn(&mut doc, "ace").unwrap().point)
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

#[test]
fn rotation_wraps_and_releases_captors() {
    let mut doc = SessionDocument::new(defaults());
    for (name, team) in [("r", Team::Red), ("b", Team::Blue)] {
        doc.add_player(
            name.to_owned(),
            Player::new(UserId::new(name), team, name.to_owned()),
        );
        doc.set_capturing(name, true);
    }
    doc.set_active_objective(String::from("C"));
    let (announcer, _said) = Announcer::channel();

    assert_eq!(rotation::rotate(&mut doc, &announcer).as_deref(), Some("A"));
    assert!(doc.roster().values().all(|p| !p.is_capturing));
}
