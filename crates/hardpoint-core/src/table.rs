//! Transition table: the static `(State, Event) -> State` mapping.
//!
//! The table is pure data. Pairs that are absent are illegal in that state.
//! [`TransitionTable::validate`] is run once at startup and rejects tables
//! with orphan target states or a busy state that can be left by anything
//! other than the asynchronous completion event.

use std::collections::BTreeMap;

use hardpoint_types::{Event, State};

/// Errors found while validating a transition table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    /// A transition targets a state that has no row of its own.
    #[error("transition {from} + {event} targets {target}, which has no transitions defined")]
    OrphanTarget {
        /// Source state of the offending transition.
        from: State,
        /// Event of the offending transition.
        event: Event,
        /// Target state missing from the key set.
        target: State,
    },

    /// The busy state must accept exactly the completion event.
    #[error("{busy} must accept only {completion}, found {found:?}")]
    BusyNotExclusive {
        /// The busy state.
        busy: State,
        /// The completion event it must accept.
        completion: Event,
        /// The events actually accepted.
        found: Vec<Event>,
    },
}

/// The session's transition table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionTable {
    rows: BTreeMap<State, BTreeMap<Event, State>>,
}

impl TransitionTable {
    /// Build a table from `(from, event, to)` triples.
    ///
    /// Every `from` state gets a row, even if it only appears once.
    pub fn from_transitions(transitions: &[(State, Event, State)]) -> Self {
        let mut rows: BTreeMap<State, BTreeMap<Event, State>> = BTreeMap::new();
        for &(from, event, to) in transitions {
            rows.entry(from).or_default().insert(event, to);
        }
        Self { rows }
    }

    /// The Hardpoint session table.
    ///
    /// ```text
    /// disconnected    + connect               -> connected
    /// connected       + disconnect            -> disconnected
    /// connected       + settings_update_async -> connected_busy
    /// connected       + settings_update       -> connected
    /// connected       + start                 -> playing_default
    /// connected_busy  + settings_update_done  -> connected
    /// playing_default + game_done             -> connected
    /// playing_default + game_update           -> playing_default
    /// ```
    pub fn standard() -> Self {
        Self::from_transitions(&[
            (State::Disconnected, Event::Connect, State::Connected),
            (State::Connected, Event::Disconnect, State::Disconnected),
            (State::Connected, Event::SettingsUpdateAsync, State::ConnectedBusy),
            (State::Connected, Event::SettingsUpdate, State::Connected),
            (State::Connected, Event::Start, State::PlayingDefault),
            (State::ConnectedBusy, Event::SettingsUpdateDone, State::Connected),
            (State::PlayingDefault, Event::GameDone, State::Connected),
            (State::PlayingDefault, Event::GameUpdate, State::PlayingDefault),
        ])
    }

    /// Look up the next state, or `None` if the event is illegal in `state`.
    pub fn next(&self, state: State, event: Event) -> Option<State> {
        self.rows.get(&state).and_then(|row| row.get(&event)).copied()
    }

    /// Events accepted in `state`, in a stable order.
    pub fn legal_events(&self, state: State) -> Vec<Event> {
        self.rows
            .get(&state)
            .map(|row| row.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Check the structural invariants of the table.
    ///
    /// - Every target state is also a key.
    /// - [`State::ConnectedBusy`], when present, accepts only
    ///   [`Event::SettingsUpdateDone`].
    pub fn validate(&self) -> Result<(), TableError> {
        for (&from, row) in &self.rows {
            for (&event, &target) in row {
                if !self.rows.contains_key(&target) {
                    return Err(TableError::OrphanTarget {
                        from,
                        event,
                        target,
                    });
                }
            }
        }

        if let Some(row) = self.rows.get(&State::ConnectedBusy) {
            let found: Vec<Event> = row.keys().copied().collect();
            if found != [Event::SettingsUpdateDone] {
                return Err(TableError::BusyNotExclusive {
                    busy: State::ConnectedBusy,
                    completion: Event::SettingsUpdateDone,
                    found,
                });
            }
        }

        Ok(())
    }
}

impl core::fmt::Display for TransitionTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (from, row) in &self.rows {
            writeln!(f, "{from}:")?;
            for (event, to) in row {
                writeln!(f, "  + {event} -> {to}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table_is_valid() {
        assert_eq!(TransitionTable::standard().validate(), Ok(()));
    }

    #[test]
    fn standard_table_lookups() {
        let table = TransitionTable::standard();
        assert_eq!(
            table.next(State::Disconnected, Event::Connect),
            Some(State::Connected)
        );
        assert_eq!(table.next(State::Disconnected, Event::Start), None);
        assert_eq!(
            table.next(State::PlayingDefault, Event::GameUpdate),
            Some(State::PlayingDefault)
        );
    }

    #[test]
    fn busy_accepts_only_completion() {
        let table = TransitionTable::standard();
        for event in Event::ALL {
            let next = table.next(State::ConnectedBusy, event);
            if event == Event::SettingsUpdateDone {
                assert_eq!(next, Some(State::Connected));
            } else {
                assert_eq!(next, None, "busy must reject {event}");
            }
        }
    }

    #[test]
    fn legal_events_per_state() {
        let table = TransitionTable::standard();
        assert_eq!(
            table.legal_events(State::ConnectedBusy),
            vec![Event::SettingsUpdateDone]
        );
        assert_eq!(
            table.legal_events(State::PlayingDefault),
            vec![Event::GameUpdate, Event::GameDone]
        );
    }

    #[test]
    fn orphan_target_is_rejected() {
        let table = TransitionTable::from_transitions(&[(
            State::Disconnected,
            Event::Connect,
            State::Connected,
        )]);
        assert_eq!(
            table.validate(),
            Err(TableError::OrphanTarget {
                from: State::Disconnected,
                event: Event::Connect,
                target: State::Connected,
            })
        );
    }

    #[test]
    fn busy_with_extra_exit_is_rejected() {
        let table = TransitionTable::from_transitions(&[
            (State::Connected, Event::SettingsUpdateAsync, State::ConnectedBusy),
            (State::ConnectedBusy, Event::SettingsUpdateDone, State::Connected),
            (State::ConnectedBusy, Event::Disconnect, State::Connected),
        ]);
        assert!(matches!(
            table.validate(),
            Err(TableError::BusyNotExclusive { .. })
        ));
    }

    #[test]
    fn display_lists_every_transition() {
        let rendered = TransitionTable::standard().to_string();
        assert_eq!(rendered.matches(" -> ").count(), 8);
        assert!(rendered.contains("connected_busy:\n  + settings_update_done -> connected"));
    }
}
