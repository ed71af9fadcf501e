//! Text command parsing.
//!
//! The chat collaborator hands over a [`ParsedMessage`]: lowercase
//! positional tokens plus named `--key value` arguments. [`parse_command`]
//! turns it into a [`Command`] or a [`CommandError`] that is reported back
//! to the sender without queueing anything.
//!
//! Keywords are checked in a fixed priority order, so `player start` is a
//! player command, not a start.

use std::collections::BTreeMap;

use hardpoint_types::{ChannelKind, Command, Team};

/// Sub-commands accepted after `player`.
pub const PLAYER_SUBCOMMANDS: [&str; 6] = ["add", "remove", "purge", "switch", "list", "set"];

/// Reply for `help`.
pub const HELP_TEXT: &str = "\
Available commands:
- connect: bind to this channel and start accepting commands
- disconnect: forget everything and ignore this guild until connect
- attach [--name N] [--type voice|text]: attach a channel (default voice \"General\")
- detach: leave the voice channel
- player add --name N --team red|blue [--alias A]
- player remove --name N
- player purge
- player switch --name N
- player list
- player set --name N [--team red|blue] [--alias A]
- start: start a game (needs a voice channel)
- cancel: end the running game
- capture [--name N] [--seize]
- release [--name N]
- respawn [--name N]
- repeat [--name N]: repeat the last respawn point
- help";

/// Errors turning a message into a command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// A required named argument is missing.
    #[error("missing arg [{arg}]")]
    MissingArgument {
        /// Name of the argument.
        arg: &'static str,
    },

    /// A team argument is neither red nor blue.
    #[error("team must be blue or red [{value}]")]
    InvalidTeam {
        /// The value supplied.
        value: String,
    },

    /// No known keyword in the message.
    #[error("invalid command: {input}")]
    UnknownCommand {
        /// The tokens received.
        input: String,
    },

    /// A known command with no recognised sub-command.
    #[error("{command} command must be followed by one of: {expected}")]
    UnknownSubcommand {
        /// The parent command.
        command: &'static str,
        /// Accepted sub-commands.
        expected: String,
    },

    /// An argument has a value outside its domain.
    #[error("invalid value for [{arg}]: {value}")]
    InvalidValue {
        /// Name of the argument.
        arg: &'static str,
        /// The value supplied.
        value: String,
    },
}

/// A tokenized chat message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMessage {
    /// Positional tokens, lowercased.
    pub tokens: Vec<String>,
    /// Named arguments. Bare flags are stored with the value `"true"`.
    pub args: BTreeMap<String, String>,
}

impl ParsedMessage {
    /// Build a message, lowercasing the tokens.
    pub fn new<I, S>(tokens: I, args: BTreeMap<String, String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tokens: tokens
                .into_iter()
                .map(|t| t.as_ref().to_lowercase())
                .collect(),
            args,
        }
    }

    fn has(&self, keyword: &str) -> bool {
        self.tokens.iter().any(|t| t == keyword)
    }

    fn arg(&self, name: &str) -> Option<&str> {
        self.args.get(name).map(String::as_str)
    }

    fn required(&self, name: &'static str) -> Result<&str, CommandError> {
        self.arg(name)
            .ok_or(CommandError::MissingArgument { arg: name })
    }

    fn optional_name(&self) -> Option<String> {
        self.arg("name").map(str::to_owned)
    }
}

/// Turn a message into a command.
pub fn parse_command(message: &ParsedMessage) -> Result<Command, CommandError> {
    if message.has("connect") {
        return Ok(Command::Connect);
    }
    if message.has("disconnect") {
        return Ok(Command::Disconnect);
    }
    if message.has("attach") {
        return parse_attach(message);
    }
    if message.has("detach") {
        return Ok(Command::Detach);
    }
    if message.has("player") {
        return parse_player(message);
    }
    if message.has("start") {
        return Ok(Command::Start);
    }
    if message.has("cancel") {
        return Ok(Command::Cancel);
    }
    if message.has("capture") {
        return Ok(Command::Capture {
            name: message.optional_name(),
            seize: parse_flag(message, "seize")?,
        });
    }
    if message.has("release") {
        return Ok(Command::Release {
            name: message.optional_name(),
        });
    }
    if message.has("respawn") {
        return Ok(Command::Respawn {
            name: message.optional_name(),
        });
    }
    if message.has("repeat") {
        return Ok(Command::RepeatSpawn {
            name: message.optional_name(),
        });
    }
    if message.has("help") {
        return Ok(Command::Help);
    }
    Err(CommandError::UnknownCommand {
        input: message.tokens.join(" "),
    })
}

fn parse_attach(message: &ParsedMessage) -> Result<Command, CommandError> {
    let channel = message.arg("name").unwrap_or("General").to_owned();
    let kind = match message.arg("type") {
        None => ChannelKind::Voice,
        Some(raw) => ChannelKind::parse(raw).ok_or_else(|| CommandError::InvalidValue {
            arg: "type",
            value: raw.to_owned(),
        })?,
    };
    Ok(Command::Attach { channel, kind })
}

fn parse_player(message: &ParsedMessage) -> Result<Command, CommandError> {
    if message.has("add") {
        let name = message.required("name")?.to_owned();
        let team = parse_team(message.required("team")?)?;
        let alias = message.arg("alias").map_or_else(|| name.clone(), str::to_owned);
        return Ok(Command::AddPlayer { name, team, alias });
    }
    if message.has("remove") {
        return Ok(Command::RemovePlayer {
            name: message.required("name")?.to_owned(),
        });
    }
    if message.has("purge") {
        return Ok(Command::PurgePlayers);
    }
    if message.has("switch") {
        return Ok(Command::SwitchTeam {
            name: message.required("name")?.to_owned(),
        });
    }
    if message.has("list") {
        return Ok(Command::ListPlayers);
    }
    if message.has("set") {
        let name = message.required("name")?.to_owned();
        let team = message.arg("team").map(parse_team).transpose()?;
        let alias = message.arg("alias").map(str::to_owned);
        if team.is_none() && alias.is_none() {
            return Err(CommandError::MissingArgument {
                arg: "team or alias",
            });
        }
        return Ok(Command::UpdatePlayer { name, team, alias });
    }
    Err(CommandError::UnknownSubcommand {
        command: "player",
        expected: PLAYER_SUBCOMMANDS.join(", "),
    })
}

fn parse_team(raw: &str) -> Result<Team, CommandError> {
    Team::parse(raw).ok_or_else(|| CommandError::InvalidTeam {
        value: raw.to_owned(),
    })
}

fn parse_flag(message: &ParsedMessage, name: &'static str) -> Result<bool, CommandError> {
    match message.arg(name).map(str::to_ascii_lowercase).as_deref() {
        None | Some("false" | "no" | "0") => Ok(false),
        Some("" | "true" | "yes" | "1") => Ok(true),
        Some(other) => Err(CommandError::InvalidValue {
            arg: name,
            value: other.to_owned(),
        }),
    }
}
