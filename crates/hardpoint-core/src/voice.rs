//! Voice phrase interpretation.
//!
//! A transcript becomes a [`Command`] when it contains at least one word
//! from each keyword group of a phrase, in any order. Every phrase needs the
//! wake word group ([`GM`]). The speaker is the implicit player.

use hardpoint_types::{Command, Team};

/// Wake words.
pub const GM: &[&str] = &["gm", "g.m.", "gem", "jim"];
/// "game".
pub const GAME: &[&str] = &["game", "match"];
/// "start".
pub const START: &[&str] = &["start", "begin", "go"];
/// "cancel".
pub const CANCEL: &[&str] = &["cancel", "stop", "abort"];
/// "dead".
pub const DEAD: &[&str] = &["dead", "died", "killed"];
/// "respawn".
pub const RESPAWN: &[&str] = &["respawn", "spawn"];
/// "last".
pub const LAST: &[&str] = &["last", "previous", "repeat"];
/// "point".
pub const POINT: &[&str] = &["point", "hardpoint", "objective"];
/// "capture".
pub const CAPTURE: &[&str] = &["capture", "capturing", "on"];
/// "seize".
pub const SEIZE: &[&str] = &["seize", "seized", "take"];
/// "release".
pub const RELEASE: &[&str] = &["release", "off", "leaving"];
/// "add".
pub const ADD: &[&str] = &["add", "join"];
/// Team names.
pub const TEAM_NAME: &[&str] = &["red", "blue"];
/// "alias".
pub const ALIAS: &[&str] = &["alias", "call"];
/// "switch".
pub const SWITCH: &[&str] = &["switch", "swap", "change"];
/// "team".
pub const TEAM: &[&str] = &["team", "teams", "side"];

/// Why a transcript produced no command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoiceError {
    /// Nothing matched.
    #[error("no command in [{transcript}]")]
    NoCommand {
        /// The normalized transcript.
        transcript: String,
    },

    /// An alias phrase without a usable `to X`.
    #[error("couldn't determine alias from [{transcript}]")]
    AliasMissing {
        /// The normalized transcript.
        transcript: String,
    },
}

/// Every word the interpreter listens for, passed to the speech
/// collaborator as recognition hints.
pub fn expected_words() -> Vec<&'static str> {
    [
        GM, GAME, START, CANCEL, DEAD, RESPAWN, LAST, POINT, CAPTURE, SEIZE, RELEASE, ADD,
        TEAM_NAME, ALIAS, SWITCH, TEAM,
    ]
    .concat()
}

/// Interpret a transcript spoken by `speaker`.
pub fn interpret(transcript: &str, speaker: &str) -> Result<Command, VoiceError> {
    let tokens = normalize(transcript);
    let heard = |groups: &[&[&str]; 3]| matches_all(&tokens, groups);
    let name = || Some(speaker.to_owned());

    if heard(&[GM, GAME, START]) {
        return Ok(Command::Start);
    }
    if heard(&[GM, GAME, CANCEL]) {
        return Ok(Command::Cancel);
    }
    if heard(&[GM, DEAD, RESPAWN]) {
        return Ok(Command::Respawn { name: name() });
    }
    if heard(&[GM, LAST, RESPAWN]) {
        return Ok(Command::RepeatSpawn { name: name() });
    }
    if heard(&[GM, POINT, CAPTURE]) {
        return Ok(Command::Capture {
            name: name(),
            seize: false,
        });
    }
    if heard(&[GM, SEIZE, POINT]) {
        return Ok(Command::Capture {
            name: name(),
            seize: true,
        });
    }
    if heard(&[GM, POINT, RELEASE]) {
        return Ok(Command::Release { name: name() });
    }
    if heard(&[GM, ADD, TEAM_NAME]) {
        let team = if tokens.iter().any(|t| t == "blue") {
            Team::Blue
        } else {
            Team::Red
        };
        return Ok(Command::AddPlayer {
            name: speaker.to_owned(),
            team,
            alias: speaker.to_owned(),
        });
    }
    if matches_all(&tokens, &[GM, ALIAS]) {
        let alias = tokens
            .iter()
            .position(|t| t == "to")
            .and_then(|i| i.checked_add(1))
            .and_then(|i| tokens.get(i))
            .ok_or_else(|| VoiceError::AliasMissing {
                transcript: tokens.join(" "),
            })?;
        return Ok(Command::UpdatePlayer {
            name: speaker.to_owned(),
            team: None,
            alias: Some(alias.clone()),
        });
    }
    if heard(&[GM, SWITCH, TEAM]) {
        return Ok(Command::SwitchTeam {
            name: speaker.to_owned(),
        });
    }

    Err(VoiceError::NoCommand {
        transcript: tokens.join(" "),
    })
}

fn matches_all(tokens: &[String], groups: &[&[&str]]) -> bool {
    groups
        .iter()
        .all(|group| tokens.iter().any(|t| group.contains(&t.as_str())))
}

fn normalize(transcript: &str) -> Vec<String> {
    transcript
        .split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| matches!(c, ',' | '!' | '?' | ';' | ':'))
                .to_lowercase()
        })
        .map(|word| {
            // keep "g.m." intact, drop a sentence-final period elsewhere
            if word == "g.m." {
                word
            } else {
                word.trim_end_matches('.').to_owned()
            }
        })
        .filter(|word| !word.is_empty())
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::unreachable)]
mod tests {
    use super::*;

    #[test]
    fn start_and_cancel() {
        assert_eq!(interpret("GM, start the game.", "a"), Ok(Command::Start));
        assert_eq!(interpret("gm cancel game", "a"), Ok(Command::Cancel));
    }

    #[test]
    fn speaker_is_the_implicit_player() {
        assert_eq!(
            interpret("gm I'm dead, respawn me", "swappy"),
            Ok(Command::Respawn {
                name: Some(String::from("swappy"))
            })
        );
        assert_eq!(
            interpret("gm what was my last respawn", "swappy"),
            Ok(Command::RepeatSpawn {
                name: Some(String::from("swappy"))
            })
        );
    }

    #[test]
    fn capture_seize_and_release() {
        assert_eq!(
            interpret("gm capturing the point", "a"),
            Ok(Command::Capture {
                name: Some(String::from("a")),
                seize: false,
            })
        );
        assert_eq!(
            interpret("gm seize point", "a"),
            Ok(Command::Capture {
                name: Some(String::from("a")),
                seize: true,
            })
        );
        assert_eq!(
            interpret("gm release point", "a"),
            Ok(Command::Release {
                name: Some(String::from("a"))
            })
        );
    }

    #[test]
    fn add_defaults_to_red_unless_blue_heard() {
        let added = |text| match interpret(text, "a").unwrap() {
            Command::AddPlayer { team, .. } => team,
            other => unreachable!("{other:?}"),
        };
        assert_eq!(added("gm add me to red"), Team::Red);
        assert_eq!(added("gm add me to blue"), Team::Blue);
    }

    #[test]
    fn alias_needs_a_target() {
        assert_eq!(
            interpret("gm alias me to ace", "a"),
            Ok(Command::UpdatePlayer {
                name: String::from("a"),
                team: None,
                alias: Some(String::from("ace")),
            })
        );
        assert!(matches!(
            interpret("gm alias me", "a"),
            Err(VoiceError::AliasMissing { .. })
        ));
    }

    #[test]
    fn wake_word_is_required() {
        assert!(matches!(
            interpret("start the game", "a"),
            Err(VoiceError::NoCommand { .. })
        ));
    }

    #[test]
    fn switch_team() {
        assert_eq!(
            interpret("gm switch my team", "a"),
            Ok(Command::SwitchTeam {
                name: String::from("a")
            })
        );
    }

    #[test]
    fn expected_words_cover_every_group() {
        let words = expected_words();
        assert!(words.contains(&"gm"));
        assert!(words.contains(&"seize"));
    }
}
