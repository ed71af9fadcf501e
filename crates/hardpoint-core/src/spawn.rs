//! Respawn point selection.
//!
//! The team holding the objective respawns from its `capturing` set and the
//! opposing team from `other`. While the objective is neutral or contested
//! the two `neutral` subsets are used to keep the teams apart: whichever
//! subset the requester (or the opposing team, mirrored) last used is
//! preferred, and with no history the two are pooled.

use hardpoint_types::{Owner, SpawnGraph, Team};
use rand::Rng;
use rand::seq::IndexedRandom;

use crate::machine::ActionError;
use crate::session::SessionDocument;

/// Candidate spawns for a player on `team`.
///
/// `latest_team` and `latest_other` are the most recent spawns handed to
/// the requester's team and to the opposing team.
pub fn spawn_options<'a>(
    graph: &'a SpawnGraph,
    owner: Owner,
    team: Team,
    latest_team: Option<&str>,
    latest_other: Option<&str>,
) -> Vec<&'a str> {
    let (first, second) = (graph.neutral.0.as_slice(), graph.neutral.1.as_slice());
    let contains = |set: &[String], name: Option<&str>| {
        name.is_some_and(|name| set.iter().any(|s| s == name))
    };

    let chosen: Vec<&String> = match owner.team() {
        Some(holder) if holder == team => graph.capturing.iter().collect(),
        Some(_) => graph.other.iter().collect(),
        None => {
            if contains(first, latest_team) || contains(second, latest_other) {
                first.iter().collect()
            } else if contains(second, latest_team) || contains(first, latest_other) {
                second.iter().collect()
            } else {
                first.iter().chain(second).collect()
            }
        }
    };
    chosen.into_iter().map(String::as_str).collect()
}

/// Pick one option uniformly at random.
pub fn choose_spawn<'a, R: Rng + ?Sized>(options: &[&'a str], rng: &mut R) -> Option<&'a str> {
    options.choose(rng).copied()
}

/// Result of a respawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RespawnOutcome {
    /// Player's spoken alias.
    pub alias: String,
    /// Chosen spawn point.
    pub point: String,
}

/// Choose a respawn for `name` and record it.
///
/// Records the point as the team's latest spawn and the player's last
/// spawn, clears the player's capturing flag and bumps their deaths.
///
/// # Errors
///
/// [`ActionError::UnknownPlayer`] if `name` is not on the roster and
/// [`ActionError::NoSpawnOptions`] if the active objective has nothing to
/// offer.
pub fn respawn(document: &mut SessionDocument, name: &str) -> Result<RespawnOutcome, ActionError> {
    let player = document
        .player(name)
        .ok_or_else(|| ActionError::UnknownPlayer {
            name: name.to_owned(),
        })?;
    let team = player.team;
    let alias = player.alias.clone();

    let objective = document.active_objective().unwrap_or_default().to_owned();
    let no_options = || ActionError::NoSpawnOptions {
        objective: objective.clone(),
    };
    let graph = document.spawn_graph(&objective).ok_or_else(no_options)?;
    let options: Vec<String> = spawn_options(
        graph,
        document.owner(),
        team,
        document.latest_spawn(team),
        document.latest_spawn(team.other()),
    )
    .into_iter()
    .map(str::to_owned)
    .collect();

    let point = options
        .choose(document.rng_mut())
        .cloned()
        .ok_or_else(no_options)?;

    document.set_latest_spawn(team, point.clone());
    document.record_respawn(name, point.clone());
    Ok(RespawnOutcome { alias, point })
}
