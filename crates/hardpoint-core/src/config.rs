//! Configuration loading and typed config structures for the Hardpoint bot.
//!
//! Runtime settings live in `hardpoint-config.yaml` at the project root and
//! are parsed with `serde_yml`; every field has a default so a partial (or
//! missing) file still yields a usable configuration.
//!
//! Game data (objective names, spawn point names and the per-objective
//! spawn graphs) is a separate JSON document, loaded once at startup and
//! validated before the session is built.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use hardpoint_types::SpawnGraph;
use serde::Deserialize;
use tracing::warn;

use crate::session::{GameRules, SessionDefaults};

/// Errors that can occur when loading configuration or game data.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// Failed to parse JSON content.
    #[error("failed to parse game data JSON: {source}")]
    Json {
        /// The underlying JSON parse error.
        source: serde_json::Error,
    },

    /// The content parsed but is not usable.
    #[error("invalid {what}: {reason}")]
    Invalid {
        /// Which document was rejected.
        what: &'static str,
        /// What is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(source: serde_json::Error) -> Self {
        Self::Json { source }
    }
}

/// Top-level configuration, mirroring `hardpoint-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HardpointConfig {
    /// Drain loop and async settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Game parameters.
    #[serde(default)]
    pub game: GameConfig,

    /// Where the game data lives.
    #[serde(default)]
    pub data: DataConfig,

    /// Console chat settings.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl HardpointConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a period or timeout is zero.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        config.data.apply_env_overrides();
        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first zero period or
    /// timeout found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let periods = [
            ("engine.drain_period_ms", self.engine.drain_period_ms),
            ("engine.async_timeout_ms", self.engine.async_timeout_ms),
            ("game.score_period_ms", self.game.score_period_ms),
            ("game.rotation_secs", self.game.rotation_secs),
        ];
        match periods.iter().find(|&&(_, value)| value == 0) {
            Some(&(field, _)) => Err(ConfigError::Invalid {
                what: "config",
                reason: format!("{field} must be greater than zero"),
            }),
            None => Ok(()),
        }
    }

    /// Defaults for building (and rebuilding) the session document.
    pub fn session_defaults(&self, data: GameData) -> SessionDefaults {
        SessionDefaults {
            objectives: data.hardpoint_names,
            spawn_points: data.spawn_point_names,
            spawn_graphs: data.spawn_config,
            rules: GameRules::from(&self.game),
            seed: self.engine.seed,
        }
    }
}

/// Drain loop and async operation settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Milliseconds between queue drains.
    #[serde(default = "default_drain_period_ms")]
    pub drain_period_ms: u64,

    /// Milliseconds an async operation may hold the busy state.
    #[serde(default = "default_async_timeout_ms")]
    pub async_timeout_ms: u64,

    /// Seed for spawn selection; omitted means seeded from the OS.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            drain_period_ms: default_drain_period_ms(),
            async_timeout_ms: default_async_timeout_ms(),
            seed: None,
        }
    }
}

/// Game parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GameConfig {
    /// Seconds of un-held time before the game ends.
    #[serde(default = "default_time_limit_secs")]
    pub time_limit_secs: u64,

    /// Seconds between objective rotations.
    #[serde(default = "default_rotation_secs")]
    pub rotation_secs: u64,

    /// Milliseconds between scoring ticks.
    #[serde(default = "default_score_period_ms")]
    pub score_period_ms: u64,

    /// Status summary every N scoring ticks (0 disables).
    #[serde(default = "default_status_every_ticks")]
    pub status_every_ticks: u64,

    /// Score call-out every N scoring ticks (0 disables).
    #[serde(default = "default_difference_every_ticks")]
    pub difference_every_ticks: u64,

    /// Count down out loud once this many seconds remain.
    #[serde(default = "default_countdown_secs")]
    pub countdown_secs: u64,

    /// One-time "time remaining" warnings, in seconds.
    #[serde(default = "default_warning_thresholds_secs")]
    pub warning_thresholds_secs: Vec<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            time_limit_secs: default_time_limit_secs(),
            rotation_secs: default_rotation_secs(),
            score_period_ms: default_score_period_ms(),
            status_every_ticks: default_status_every_ticks(),
            difference_every_ticks: default_difference_every_ticks(),
            countdown_secs: default_countdown_secs(),
            warning_thresholds_secs: default_warning_thresholds_secs(),
        }
    }
}

impl From<&GameConfig> for GameRules {
    fn from(config: &GameConfig) -> Self {
        Self {
            time_limit_secs: config.time_limit_secs,
            rotation_secs: config.rotation_secs,
            score_period_ms: config.score_period_ms,
            status_every_ticks: config.status_every_ticks,
            difference_every_ticks: config.difference_every_ticks,
            countdown_secs: config.countdown_secs,
            warning_thresholds_secs: config.warning_thresholds_secs.clone(),
        }
    }
}

/// Game data location.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DataConfig {
    /// Path of the game data JSON file.
    #[serde(default = "default_game_data_path")]
    pub game_data_path: PathBuf,
}

impl DataConfig {
    /// Override fields from environment variables when present.
    ///
    /// - `HARDPOINT_GAME_DATA` overrides `game_data_path`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("HARDPOINT_GAME_DATA") {
            self.game_data_path = PathBuf::from(val);
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            game_data_path: default_game_data_path(),
        }
    }
}

/// Console chat settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatConfig {
    /// Lines must start with this prefix to be treated as commands.
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,

    /// Guild identifier reported for console input.
    #[serde(default = "default_guild_id")]
    pub guild_id: String,

    /// Guild display name reported for console input.
    #[serde(default = "default_guild_name")]
    pub guild_name: String,

    /// Name of the console operator.
    #[serde(default = "default_operator_name")]
    pub operator_name: String,

    /// Identity of the console operator.
    #[serde(default = "default_operator_id")]
    pub operator_id: String,

    /// Known members, name to identity.
    #[serde(default)]
    pub members: BTreeMap<String, String>,

    /// Known channels.
    #[serde(default)]
    pub channels: ChannelsConfig,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
            guild_id: default_guild_id(),
            guild_name: default_guild_name(),
            operator_name: default_operator_name(),
            operator_id: default_operator_id(),
            members: BTreeMap::new(),
            channels: ChannelsConfig::default(),
        }
    }
}

/// Channels by kind, name to identity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelsConfig {
    /// Text channels.
    #[serde(default = "default_text_channels")]
    pub text: BTreeMap<String, String>,

    /// Voice channels.
    #[serde(default = "default_voice_channels")]
    pub voice: BTreeMap<String, String>,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            text: default_text_channels(),
            voice: default_voice_channels(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Game data
// ---------------------------------------------------------------------------

/// Objectives and spawn graphs, loaded from JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GameData {
    /// Objective names in rotation order.
    #[serde(default)]
    pub hardpoint_names: Vec<String>,

    /// Every spawn point name on the field.
    #[serde(default)]
    pub spawn_point_names: Vec<String>,

    /// Spawn graph per objective.
    #[serde(default)]
    pub spawn_config: BTreeMap<String, SpawnGraph>,
}

impl GameData {
    /// Load and validate game data from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`], [`ConfigError::Json`] or
    /// [`ConfigError::Invalid`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate game data from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] or [`ConfigError::Invalid`].
    pub fn parse(json: &str) -> Result<Self, ConfigError> {
        let data: Self = serde_json::from_str(json)?;
        data.validate()?;
        for name in data.unknown_spawn_names() {
            warn!(spawn = %name, "Spawn graph names a spawn point that is not listed");
        }
        Ok(data)
    }

    /// Check that every objective has a usable spawn graph.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hardpoint_names.is_empty() {
            return Err(invalid("hardpoint_names is empty"));
        }
        for objective in &self.hardpoint_names {
            let graph = self
                .spawn_config
                .get(objective)
                .ok_or_else(|| invalid(format!("no spawn_config for hardpoint [{objective}]")))?;
            if graph.capturing.is_empty() {
                return Err(invalid(format!("[{objective}] has no capturing spawns")));
            }
            if graph.other.is_empty() {
                return Err(invalid(format!("[{objective}] has no other spawns")));
            }
            if graph.neutral.0.is_empty() && graph.neutral.1.is_empty() {
                return Err(invalid(format!("[{objective}] has no neutral spawns")));
            }
        }
        Ok(())
    }

    /// Spawn names used by a graph but missing from `spawn_point_names`.
    pub fn unknown_spawn_names(&self) -> Vec<String> {
        let mut unknown: Vec<String> = self
            .spawn_config
            .values()
            .flat_map(SpawnGraph::names)
            .filter(|name| !self.spawn_point_names.iter().any(|known| known == name))
            .map(str::to_owned)
            .collect();
        unknown.sort();
        unknown.dedup();
        unknown
    }
}

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        what: "game data",
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_drain_period_ms() -> u64 {
    10
}

const fn default_async_timeout_ms() -> u64 {
    10_000
}

const fn default_time_limit_secs() -> u64 {
    300
}

const fn default_rotation_secs() -> u64 {
    60
}

const fn default_score_period_ms() -> u64 {
    1000
}

const fn default_status_every_ticks() -> u64 {
    10
}

const fn default_difference_every_ticks() -> u64 {
    20
}

const fn default_countdown_secs() -> u64 {
    10
}

fn default_warning_thresholds_secs() -> Vec<u64> {
    vec![60, 30]
}

fn default_game_data_path() -> PathBuf {
    PathBuf::from("data/game_data.json")
}

fn default_command_prefix() -> String {
    "$".to_owned()
}

fn default_guild_id() -> String {
    "console".to_owned()
}

fn default_guild_name() -> String {
    "Console".to_owned()
}

fn default_operator_name() -> String {
    "operator".to_owned()
}

fn default_operator_id() -> String {
    "0".to_owned()
}

fn default_text_channels() -> BTreeMap<String, String> {
    BTreeMap::from([("general".to_owned(), "text-general".to_owned())])
}

fn default_voice_channels() -> BTreeMap<String, String> {
    BTreeMap::from([("General".to_owned(), "voice-general".to_owned())])
}

fn default_log_level() -> String {
    "info".to_owned()
}
