//! Control protocol
//!
//! Commands travel as UTF-8 text messages of the form `<verb>|<payload>`:
//!
//! ```text
//! play|<name>
//! play-multi|<name>:<start>-<end>,<name>:<start>-<end>,...
//! stop
//! ```
//!
//! Start and end are milliseconds into the sound.

use std::fmt;
use std::str::FromStr;

/// Verb for playing a single sound
pub const VERB_PLAY: &str = "play";
/// Verb for playing several snippets back to back
pub const VERB_PLAY_MULTI: &str = "play-multi";
/// Verb for stopping playback
pub const VERB_STOP: &str = "stop";

const VERB_SEPARATOR: char = '|';
const SPEC_SEPARATOR: char = ',';

/// One snippet of a multi-play command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaySoundSpec {
    pub name: String,
    /// Start offset in milliseconds
    pub start: u64,
    /// End offset in milliseconds, never before `start`
    pub end: u64,
}

impl PlaySoundSpec {
    pub fn new(name: impl Into<String>, start: u64, end: u64) -> Self {
        Self {
            name: name.into(),
            start,
            end,
        }
    }
}

impl fmt::Display for PlaySoundSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.name, self.start, self.end)
    }
}

/// Errors from parsing snippet text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpecParseError {
    #[error("snippet '{0}' has no sound name")]
    MissingName(String),

    #[error("snippet '{0}' is not of the form <name>:<start>-<end>")]
    Malformed(String),

    #[error("snippet '{0}' has an invalid offset")]
    InvalidOffset(String),

    #[error("snippet '{0}' ends before it starts")]
    EndBeforeStart(String),
}

impl FromStr for PlaySoundSpec {
    type Err = SpecParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let (name, range) = text
            .rsplit_once(':')
            .ok_or_else(|| SpecParseError::Malformed(text.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(SpecParseError::MissingName(text.to_string()));
        }
        let (start, end) = range
            .split_once('-')
            .ok_or_else(|| SpecParseError::Malformed(text.to_string()))?;
        let start: u64 = start
            .trim()
            .parse()
            .map_err(|_| SpecParseError::InvalidOffset(text.to_string()))?;
        let end: u64 = end
            .trim()
            .parse()
            .map_err(|_| SpecParseError::InvalidOffset(text.to_string()))?;
        if end < start {
            return Err(SpecParseError::EndBeforeStart(text.to_string()));
        }
        Ok(Self::new(name, start, end))
    }
}

/// Parse a comma separated snippet list such as `boom:0-500,zap:100-300`
pub fn parse_spec_list(text: &str) -> Result<Vec<PlaySoundSpec>, SpecParseError> {
    text.split(SPEC_SEPARATOR)
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// `play|<name>`
pub fn play(name: &str) -> String {
    format!("{}{}{}", VERB_PLAY, VERB_SEPARATOR, name)
}

/// `play-multi|<spec>,<spec>,...`, order preserved
pub fn play_multiple(specs: &[PlaySoundSpec]) -> String {
    let list = specs
        .iter()
        .map(PlaySoundSpec::to_string)
        .collect::<Vec<_>>()
        .join(",");
    play_multiple_instruction(&list)
}

/// `play-multi|<raw>`; the text is passed through untouched
pub fn play_multiple_instruction(raw: &str) -> String {
    format!("{}{}{}", VERB_PLAY_MULTI, VERB_SEPARATOR, raw)
}

/// `stop`
pub fn stop() -> String {
    VERB_STOP.to_string()
}

/// Structured form of a control message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Play(String),
    PlayMulti(Vec<PlaySoundSpec>),
    /// Free-form snippet text, left for the server to interpret
    PlayInstruction(String),
    Stop,
}

impl Command {
    /// Wire representation
    pub fn to_wire(&self) -> String {
        match self {
            Command::Play(name) => play(name),
            Command::PlayMulti(specs) => play_multiple(specs),
            Command::PlayInstruction(raw) => play_multiple_instruction(raw),
            Command::Stop => stop(),
        }
    }

    /// Parse a received message the way the server reads it.
    ///
    /// The verb ends at the first `|`. `play-multi` payloads are returned as
    /// [`Command::PlayInstruction`] since the client never validates them.
    /// Unknown verbs and missing payloads yield `None`.
    pub fn parse(message: &str) -> Option<Self> {
        let (verb, payload) = match message.split_once(VERB_SEPARATOR) {
            Some((verb, payload)) => (verb, Some(payload)),
            None => (message, None),
        };
        match (verb, payload) {
            (VERB_PLAY, Some(name)) => Some(Command::Play(name.to_string())),
            (VERB_PLAY_MULTI, Some(raw)) => Some(Command::PlayInstruction(raw.to_string())),
            (VERB_STOP, _) => Some(Command::Stop),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play() {
        assert_eq!(play("airhorn"), "play|airhorn");
    }

    #[test]
    fn test_play_multiple() {
        let specs = vec![
            PlaySoundSpec::new("boom", 0, 500),
            PlaySoundSpec::new("zap", 100, 300),
        ];
        assert_eq!(play_multiple(&specs), "play-multi|boom:0-500,zap:100-300");
        assert_eq!(play_multiple(&[]), "play-multi|");
    }

    #[test]
    fn test_instruction_passthrough() {
        assert_eq!(
            play_multiple_instruction("boom:0-500, not valid at all"),
            "play-multi|boom:0-500, not valid at all"
        );
    }

    #[test]
    fn test_stop() {
        assert_eq!(stop(), "stop");
        assert_eq!(Command::Stop.to_string(), "stop");
    }

    #[test]
    fn test_parse_spec() {
        let spec: PlaySoundSpec = " boom : 0-500 ".parse().unwrap();
        assert_eq!(spec, PlaySoundSpec::new("boom", 0, 500));

        assert!(matches!("boom".parse::<PlaySoundSpec>(), Err(SpecParseError::Malformed(_))));
        assert!(matches!(":0-5".parse::<PlaySoundSpec>(), Err(SpecParseError::MissingName(_))));
        assert!(matches!("a:x-5".parse::<PlaySoundSpec>(), Err(SpecParseError::InvalidOffset(_))));
        assert!(matches!("a:9-5".parse::<PlaySoundSpec>(), Err(SpecParseError::EndBeforeStart(_))));
    }

    #[test]
    fn test_parse_spec_list() {
        let specs = parse_spec_list("boom:0-500,zap:100-300,").unwrap();
        assert_eq!(play_multiple(&specs), "play-multi|boom:0-500,zap:100-300");
        assert!(parse_spec_list("boom:0-500,zap").is_err());
    }

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("play|boom"), Some(Command::Play("boom".into())));
        assert_eq!(
            Command::parse("play-multi|a:0-1"),
            Some(Command::PlayInstruction("a:0-1".into()))
        );
        assert_eq!(Command::parse("stop"), Some(Command::Stop));
        assert_eq!(Command::parse("play"), None);
        assert_eq!(Command::parse("dance|now"), None);

        let cmd = Command::PlayMulti(vec![PlaySoundSpec::new("a", 1, 2)]);
        assert_eq!(Command::parse(&cmd.to_wire()), Some(Command::PlayInstruction("a:1-2".into())));
    }
}
