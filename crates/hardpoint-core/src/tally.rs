//! Capture tally and objective ownership.

use std::collections::BTreeMap;

use hardpoint_types::{Owner, Player, Team};

/// Number of capturing players per team.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureTally {
    /// Red captors.
    pub red: u32,
    /// Blue captors.
    pub blue: u32,
}

impl CaptureTally {
    /// Count the capturing players in `roster`, grouped by team.
    pub fn from_roster(roster: &BTreeMap<String, Player>) -> Self {
        roster
            .values()
            .filter(|p| p.is_capturing)
            .fold(Self::default(), |mut tally, p| {
                match p.team {
                    Team::Red => tally.red = tally.red.saturating_add(1),
                    Team::Blue => tally.blue = tally.blue.saturating_add(1),
                }
                tally
            })
    }

    /// Who holds the objective: both teams present is contested, nobody is
    /// neutral, otherwise the team with captors.
    pub const fn owner(self) -> Owner {
        match (self.red, self.blue) {
            (0, 0) => Owner::Neutral,
            (_, 0) => Owner::Red,
            (0, _) => Owner::Blue,
            _ => Owner::Contested,
        }
    }
}
