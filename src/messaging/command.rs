// Commandes texte - stdin → boucle de session

use crate::bass;
use crate::sequencer::drums;
use crate::sequencer::Voice;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Toggle a cell; `step` is 0-based
    Toggle { voice: Voice, step: usize },
    Play,
    Stop,
    TogglePlay,
    Generate,
    Random,
    Clear,
    SetBpm(f64),
    Show,
    Quit,
    /// Routed to the bass sequencer
    Bass(BassCommand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BassCommand {
    Toggle { voice: Voice, step: usize },
    TogglePlay,
    Random,
    Markov,
    Clear,
    Show,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("Invalid argument: {0}")]
    BadArgument(String),
}

impl Command {
    /// Parse one input line
    ///
    /// `toggle <drum> <step>` takes 1-based steps, as presets do.
    pub fn parse(line: &str) -> Result<Command, ParseError> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or(ParseError::Empty)?;

        let command = match verb.to_ascii_lowercase().as_str() {
            "t" | "toggle" => {
                let drum = words
                    .next()
                    .ok_or_else(|| ParseError::BadArgument("missing drum".into()))?;
                let voice = drums::voice_for(drum)
                    .map_err(|e| ParseError::BadArgument(e.to_string()))?;
                Command::Toggle {
                    voice,
                    step: parse_step(words.next())?,
                }
            }
            "b" | "bass" => Command::Bass(BassCommand::parse(&mut words)?),
            "play" => Command::Play,
            "stop" => Command::Stop,
            "p" => Command::TogglePlay,
            "g" | "generate" => Command::Generate,
            "r" | "random" => Command::Random,
            "c" | "clear" => Command::Clear,
            "bpm" | "tempo" => {
                let value = words
                    .next()
                    .and_then(|s| s.parse::<f64>().ok())
                    .ok_or_else(|| ParseError::BadArgument("bpm needs a number".into()))?;
                Command::SetBpm(value)
            }
            "s" | "show" => Command::Show,
            "q" | "quit" | "exit" => Command::Quit,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

impl BassCommand {
    fn parse<'a>(words: &mut impl Iterator<Item = &'a str>) -> Result<BassCommand, ParseError> {
        let verb = words
            .next()
            .ok_or_else(|| ParseError::BadArgument("missing bass command".into()))?;

        let command = match verb.to_ascii_lowercase().as_str() {
            "t" | "toggle" => {
                let note = words
                    .next()
                    .ok_or_else(|| ParseError::BadArgument("missing note".into()))?;
                let voice =
                    bass::note_for(note).map_err(|e| ParseError::BadArgument(e.to_string()))?;
                BassCommand::Toggle {
                    voice,
                    step: parse_step(words.next())?,
                }
            }
            "p" | "play" => BassCommand::TogglePlay,
            "r" | "random" => BassCommand::Random,
            "m" | "markov" => BassCommand::Markov,
            "c" | "clear" => BassCommand::Clear,
            "s" | "show" => BassCommand::Show,
            other => return Err(ParseError::Unknown(format!("bass {}", other))),
        };
        Ok(command)
    }
}

/// 1-based step argument, returned 0-based
fn parse_step(word: Option<&str>) -> Result<usize, ParseError> {
    word.and_then(|s| s.parse::<usize>().ok())
        .filter(|s| *s > 0)
        .map(|s| s - 1)
        .ok_or_else(|| ParseError::BadArgument("step must be 1..16".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse("toggle snare 5"),
            Ok(Command::Toggle { voice: 38, step: 4 })
        );
        assert_eq!(Command::parse("  P "), Ok(Command::TogglePlay));
        assert_eq!(Command::parse("bpm 120"), Ok(Command::SetBpm(120.0)));
        assert_eq!(Command::parse("q"), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Command::parse(""), Err(ParseError::Empty));
        assert!(matches!(Command::parse("dance"), Err(ParseError::Unknown(_))));
        assert!(matches!(Command::parse("t kick 0"), Err(ParseError::BadArgument(_))));
        assert!(matches!(Command::parse("t cowbell 1"), Err(ParseError::BadArgument(_))));
        assert!(matches!(Command::parse("bpm fast"), Err(ParseError::BadArgument(_))));
    }

    #[test]
    fn test_parse_bass_commands() {
        assert_eq!(
            Command::parse("bass toggle e 3"),
            Ok(Command::Bass(BassCommand::Toggle { voice: 52, step: 2 }))
        );
        assert_eq!(Command::parse("b m"), Ok(Command::Bass(BassCommand::Markov)));
        assert_eq!(Command::parse("b P"), Ok(Command::Bass(BassCommand::TogglePlay)));
        assert!(matches!(Command::parse("b"), Err(ParseError::BadArgument(_))));
        assert!(matches!(Command::parse("b t C# 1"), Err(ParseError::BadArgument(_))));
        assert!(matches!(Command::parse("b dance"), Err(ParseError::Unknown(_))));
    }
}
