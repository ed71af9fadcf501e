//! The session document: the single mutable aggregate of a Hardpoint session.
//!
//! Exactly one [`SessionDocument`] exists per process and it is owned by the
//! [`StateMachine`](crate::machine::StateMachine). Every field is private;
//! reads go through accessors and writes through typed setters, so the only
//! way to mutate the document is from inside an action the engine is
//! currently applying.
//!
//! # Lifecycle
//!
//! - Built from [`SessionDefaults`] at startup.
//! - Wholesale replaced by [`SessionDocument::reset`] on disconnect.
//! - Per-game fields reset by [`SessionDocument::reset_for_start`].
//! - Simulation timers attached at start and dropped at game end.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use hardpoint_types::{
    ChannelBinding, ChannelId, ChannelKind, GuildId, Owner, Player, SpawnGraph, Team,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;

use crate::simulation::SimulationTimers;

/// Game parameters fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameRules {
    /// Game ends once the elapsed clock exceeds this many seconds.
    pub time_limit_secs: u64,
    /// Seconds between objective rotations.
    pub rotation_secs: u64,
    /// Milliseconds between scoring ticks.
    pub score_period_ms: u64,
    /// Emit a status summary every N scoring ticks (0 disables).
    pub status_every_ticks: u64,
    /// Emit a score-difference announcement every N scoring ticks (0 disables).
    pub difference_every_ticks: u64,
    /// Count down out loud once this many seconds remain.
    pub countdown_secs: u64,
    /// One-time "time remaining" warnings, in seconds.
    pub warning_thresholds_secs: Vec<u64>,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            time_limit_secs: 300,
            rotation_secs: 60,
            score_period_ms: 1000,
            status_every_ticks: 10,
            difference_every_ticks: 20,
            countdown_secs: 10,
            warning_thresholds_secs: vec![60, 30],
        }
    }
}

/// Everything needed to (re)build a fresh document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDefaults {
    /// Ordered objective names; rotation walks this list.
    pub objectives: Vec<String>,
    /// Every known spawn point name.
    pub spawn_points: Vec<String>,
    /// Spawn graph per objective.
    pub spawn_graphs: BTreeMap<String, SpawnGraph>,
    /// Game parameters.
    pub rules: GameRules,
    /// Seed for the spawn RNG; `None` draws from the OS.
    pub seed: Option<u64>,
}

/// Serializable view of the document, used for listings and for
/// "unchanged" assertions in tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    /// Channel binding.
    pub binding: ChannelBinding,
    /// Roster keyed by player name.
    pub roster: BTreeMap<String, Player>,
    /// Red team score.
    pub red_score: u64,
    /// Blue team score.
    pub blue_score: u64,
    /// Elapsed game clock in seconds.
    pub game_clock: u64,
    /// Current objective owner.
    pub owner: Owner,
    /// Active objective name.
    pub active_objective: Option<String>,
    /// Most recent spawn handed to each team.
    pub latest_spawns: BTreeMap<Team, String>,
    /// Scoring ticks observed this game.
    pub score_ticks: u64,
    /// Warning thresholds already announced.
    pub warnings_sent: BTreeSet<u64>,
    /// Whether game end has already been requested by the clock.
    pub end_requested: bool,
    /// When the current game started.
    pub started_at: Option<DateTime<Utc>>,
    /// Whether simulation timers are attached.
    pub timers_running: bool,
}

/// The mutable state of a Hardpoint session.
#[derive(Debug)]
pub struct SessionDocument {
    defaults: SessionDefaults,
    binding: ChannelBinding,
    roster: BTreeMap<String, Player>,
    red_score: u64,
    blue_score: u64,
    game_clock: u64,
    owner: Owner,
    active_objective: Option<String>,
    latest_spawns: BTreeMap<Team, String>,
    score_ticks: u64,
    warnings_sent: BTreeSet<u64>,
    end_requested: bool,
    started_at: Option<DateTime<Utc>>,
    timers: Option<SimulationTimers>,
    rng: StdRng,
}

impl SessionDocument {
    /// Build a fresh document from defaults.
    pub fn new(defaults: SessionDefaults) -> Self {
        let rng = defaults
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        Self {
            defaults,
            binding: ChannelBinding::default(),
            roster: BTreeMap::new(),
            red_score: 0,
            blue_score: 0,
            game_clock: 0,
            owner: Owner::Neutral,
            active_objective: None,
            latest_spawns: BTreeMap::new(),
            score_ticks: 0,
            warnings_sent: BTreeSet::new(),
            end_requested: false,
            started_at: None,
            timers: None,
            rng,
        }
    }

    /// Replace the whole document with a fresh one built from the same
    /// defaults. Attached timers are dropped (and therefore stopped).
    pub fn reset(&mut self) {
        let defaults = self.defaults.clone();
        *self = Self::new(defaults);
    }

    /// Reset per-game fields and activate the first objective.
    ///
    /// Returns the first objective, or `None` if none are configured.
    pub fn reset_for_start(&mut self) -> Option<String> {
        self.red_score = 0;
        self.blue_score = 0;
        self.game_clock = 0;
        self.owner = Owner::Neutral;
        self.latest_spawns.clear();
        self.score_ticks = 0;
        self.warnings_sent.clear();
        self.end_requested = false;
        self.started_at = Some(Utc::now());
        self.active_objective = self.defaults.objectives.first().cloned();
        for player in self.roster.values_mut() {
            player.reset_for_game();
        }
        self.active_objective.clone()
    }

    /// Capture a serializable view of the document.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            binding: self.binding.clone(),
            roster: self.roster.clone(),
            red_score: self.red_score,
            blue_score: self.blue_score,
            game_clock: self.game_clock,
            owner: self.owner,
            active_objective: self.active_objective.clone(),
            latest_spawns: self.latest_spawns.clone(),
            score_ticks: self.score_ticks,
            warnings_sent: self.warnings_sent.clone(),
            end_requested: self.end_requested,
            started_at: self.started_at,
            timers_running: self.timers.is_some(),
        }
    }

    // -----------------------------------------------------------------------
    // Configuration (read-only)
    // -----------------------------------------------------------------------

    /// Game parameters.
    pub const fn rules(&self) -> &GameRules {
        &self.defaults.rules
    }

    /// Ordered objective names.
    pub fn objectives(&self) -> &[String] {
        &self.defaults.objectives
    }

    /// Known spawn point names.
    pub fn spawn_points(&self) -> &[String] {
        &self.defaults.spawn_points
    }

    /// Spawn graph of the named objective.
    pub fn spawn_graph(&self, objective: &str) -> Option<&SpawnGraph> {
        self.defaults.spawn_graphs.get(objective)
    }

    // -----------------------------------------------------------------------
    // Channel binding
    // -----------------------------------------------------------------------

    /// Current channel binding.
    pub const fn binding(&self) -> &ChannelBinding {
        &self.binding
    }

    /// Bind the session to a guild and its text channel.
    pub fn bind_guild(
        &mut self,
        guild_id: GuildId,
        guild_name: String,
        text_channel_id: ChannelId,
        text_channel_name: String,
    ) {
        self.binding.guild_id = Some(guild_id);
        self.binding.guild_name = Some(guild_name);
        self.binding.text_channel_id = Some(text_channel_id);
        self.binding.text_channel_name = Some(text_channel_name);
    }

    /// Attach a text or voice channel by kind.
    pub fn bind_channel(&mut self, kind: ChannelKind, id: ChannelId, name: String) {
        match kind {
            ChannelKind::Text => {
                self.binding.text_channel_id = Some(id);
                self.binding.text_channel_name = Some(name);
            }
            ChannelKind::Voice => {
                self.binding.voice_channel_id = Some(id);
                self.binding.voice_channel_name = Some(name);
            }
        }
    }

    /// Forget the voice channel, returning its name if one was attached.
    pub fn clear_voice_channel(&mut self) -> Option<String> {
        self.binding.voice_channel_id = None;
        self.binding.voice_channel_name.take()
    }

    // -----------------------------------------------------------------------
    // Roster
    // -----------------------------------------------------------------------

    /// The roster keyed by player name.
    pub const fn roster(&self) -> &BTreeMap<String, Player> {
        &self.roster
    }

    /// Look up a player by name.
    pub fn player(&self, name: &str) -> Option<&Player> {
        self.roster.get(name)
    }

    /// Add a player. Returns `false` (and leaves the roster alone) if the
    /// name is already taken.
    pub fn add_player(&mut self, name: String, player: Player) -> bool {
        if self.roster.contains_key(&name) {
            return false;
        }
        self.roster.insert(name, player);
        true
    }

    /// Remove a player by name.
    pub fn remove_player(&mut self, name: &str) -> Option<Player> {
        self.roster.remove(name)
    }

    /// Remove every player.
    pub fn purge_players(&mut self) {
        self.roster.clear();
    }

    /// Move a player to `team`. Returns `false` for unknown players.
    pub fn set_team(&mut self, name: &str, team: Team) -> bool {
        self.roster.get_mut(name).is_some_and(|player| {
            player.team = team;
            true
        })
    }

    /// Change a player's alias. Returns `false` for unknown players.
    pub fn set_alias(&mut self, name: &str, alias: String) -> bool {
        self.roster.get_mut(name).is_some_and(|player| {
            player.alias = alias;
            true
        })
    }

    /// Set a player's capturing flag. Returns `false` for unknown players.
    pub fn set_capturing(&mut self, name: &str, capturing: bool) -> bool {
        self.roster.get_mut(name).is_some_and(|player| {
            player.is_capturing = capturing;
            true
        })
    }

    /// Clear the capturing flag of every player.
    pub fn release_all(&mut self) {
        for player in self.roster.values_mut() {
            player.is_capturing = false;
        }
    }

    /// Clear the capturing flag of every player on `team`.
    pub fn release_team(&mut self, team: Team) {
        for player in self.roster.values_mut().filter(|p| p.team == team) {
            player.is_capturing = false;
        }
    }

    /// Record a respawn: clears capturing, bumps deaths, stores the point.
    /// Returns `false` for unknown players.
    pub fn record_respawn(&mut self, name: &str, point: String) -> bool {
        self.roster.get_mut(name).is_some_and(|player| {
            player.is_capturing = false;
            player.deaths = player.deaths.saturating_add(1);
            player.latest_spawn_point = Some(point);
            true
        })
    }

    // -----------------------------------------------------------------------
    // Score and clock
    // -----------------------------------------------------------------------

    /// Score of `team`.
    pub const fn score(&self, team: Team) -> u64 {
        match team {
            Team::Red => self.red_score,
            Team::Blue => self.blue_score,
        }
    }

    /// Add `points` to `team`'s score.
    pub const fn add_score(&mut self, team: Team, points: u64) {
        match team {
            Team::Red => self.red_score = self.red_score.saturating_add(points),
            Team::Blue => self.blue_score = self.blue_score.saturating_add(points),
        }
    }

    /// Elapsed game clock in seconds.
    pub const fn game_clock(&self) -> u64 {
        self.game_clock
    }

    /// Advance the game clock by `secs`, returning the new value.
    pub const fn advance_clock(&mut self, secs: u64) -> u64 {
        self.game_clock = self.game_clock.saturating_add(secs);
        self.game_clock
    }

    /// Seconds left before the time limit.
    pub const fn remaining_secs(&self) -> u64 {
        self.defaults.rules.time_limit_secs.saturating_sub(self.game_clock)
    }

    /// Count one more scoring tick, returning the new count.
    pub const fn advance_score_ticks(&mut self) -> u64 {
        self.score_ticks = self.score_ticks.saturating_add(1);
        self.score_ticks
    }

    /// Mark a warning threshold as announced. Returns `true` the first time.
    pub fn mark_warning(&mut self, threshold_secs: u64) -> bool {
        self.warnings_sent.insert(threshold_secs)
    }

    /// Record that the clock has asked for the game to end. Returns `true`
    /// the first time.
    pub const fn request_end(&mut self) -> bool {
        let first = !self.end_requested;
        self.end_requested = true;
        first
    }

    /// When the current game started.
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    // -----------------------------------------------------------------------
    // Objective
    // -----------------------------------------------------------------------

    /// Current objective owner.
    pub const fn owner(&self) -> Owner {
        self.owner
    }

    /// Set the owner. Returns `true` if it changed.
    pub fn set_owner(&mut self, owner: Owner) -> bool {
        let changed = self.owner != owner;
        self.owner = owner;
        changed
    }

    /// Name of the active objective.
    pub fn active_objective(&self) -> Option<&str> {
        self.active_objective.as_deref()
    }

    /// Make `objective` the active one.
    pub fn set_active_objective(&mut self, objective: String) {
        self.active_objective = Some(objective);
    }

    /// Most recent spawn handed to `team`.
    pub fn latest_spawn(&self, team: Team) -> Option<&str> {
        self.latest_spawns.get(&team).map(String::as_str)
    }

    /// Record the most recent spawn handed to `team`.
    pub fn set_latest_spawn(&mut self, team: Team, point: String) {
        self.latest_spawns.insert(team, point);
    }

    // -----------------------------------------------------------------------
    // Timers and randomness
    // -----------------------------------------------------------------------

    /// Attach the simulation timers, replacing (and stopping) any old ones.
    pub fn attach_timers(&mut self, timers: SimulationTimers) {
        self.timers = Some(timers);
    }

    /// Drop the simulation timers. Returns `true` if any were attached.
    pub fn clear_timers(&mut self) -> bool {
        self.timers.take().is_some()
    }

    /// Whether simulation timers are attached.
    pub const fn timers_running(&self) -> bool {
        self.timers.is_some()
    }

    /// The spawn RNG.
    pub const fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}
