//! Console commands and command-line arguments

use std::path::PathBuf;

use somnus_core::loader::Selection;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command: {0} (try \"help\")")]
    Unknown(String),

    #[error("{command} needs a number, got {value:?}")]
    BadNumber { command: String, value: String },

    #[error("{0} needs a value")]
    MissingValue(String),

    #[error("Missing required argument {0}")]
    MissingArgument(&'static str),
}

/// A line typed into the player console
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    Play,
    Stop,
    Blend(i64),
    Intensity(u32),
    Timer(u32),
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  play              start the session
  stop              stop playback
  blend <0-100>     soundscape share of the mix
  intensity <n>     loop length in phrase-segments
  timer <minutes>   countdown length (0 = off; only while stopped)
  status            show the session state
  quit              leave";

/// Parse one console line; blank lines yield `None`
pub fn parse_command(line: &str) -> Result<Option<PlayerCommand>, CommandError> {
    let mut words = line.split_whitespace();
    let Some(word) = words.next() else {
        return Ok(None);
    };
    let word = word.to_ascii_lowercase();

    let command = match word.as_str() {
        "play" | "start" => PlayerCommand::Play,
        "stop" | "pause" => PlayerCommand::Stop,
        "status" | "s" => PlayerCommand::Status,
        "help" | "?" => PlayerCommand::Help,
        "quit" | "exit" | "q" => PlayerCommand::Quit,
        "blend" => PlayerCommand::Blend(number(&word, words.next())?),
        "intensity" | "i" => PlayerCommand::Intensity(number(&word, words.next())?),
        "timer" | "t" => PlayerCommand::Timer(number(&word, words.next())?),
        _ => return Err(CommandError::Unknown(word)),
    };
    Ok(Some(command))
}

fn number<T: std::str::FromStr>(command: &str, value: Option<&str>) -> Result<T, CommandError> {
    let value = value.ok_or_else(|| CommandError::MissingValue(command.to_string()))?;
    value.parse().map_err(|_| CommandError::BadNumber {
        command: command.to_string(),
        value: value.to_string(),
    })
}

/// Command-line arguments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliArgs {
    pub session: Option<String>,
    pub instructor: Option<String>,
    pub soundscape: Option<String>,
    pub blend: Option<i64>,
    pub timer: Option<u32>,
    pub intensity: Option<u32>,
    pub config: Option<PathBuf>,
    pub list_devices: bool,
    pub help: bool,
}

pub const USAGE: &str = "\
Usage: somnus-player --session <id> --instructor <id> --soundscape <id> [options]

Options:
  --blend <0-100>     soundscape share of the mix
  --timer <minutes>   countdown length (0 = off)
  --intensity <n>     loop length in phrase-segments
  --config <path>     config file (default ~/.config/somnus/config.yaml)
  --list-devices      list audio output devices and exit
  --help              show this message";

impl CliArgs {
    /// Parse arguments (without the program name)
    pub fn parse<I>(args: I) -> Result<Self, CommandError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = CliArgs::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
                None => (arg, None),
            };
            let mut value = || {
                inline
                    .clone()
                    .or_else(|| args.next())
                    .ok_or_else(|| CommandError::MissingValue(flag.clone()))
            };

            match flag.as_str() {
                "--session" => parsed.session = Some(value()?),
                "--instructor" => parsed.instructor = Some(value()?),
                "--soundscape" => parsed.soundscape = Some(value()?),
                "--config" => parsed.config = Some(PathBuf::from(value()?)),
                "--blend" => parsed.blend = Some(number(&flag, Some(&value()?))?),
                "--timer" => parsed.timer = Some(number(&flag, Some(&value()?))?),
                "--intensity" => parsed.intensity = Some(number(&flag, Some(&value()?))?),
                "--list-devices" => parsed.list_devices = true,
                "--help" | "-h" => parsed.help = true,
                _ => return Err(CommandError::Unknown(flag.clone())),
            }
        }
        Ok(parsed)
    }

    /// The selection named on the command line
    pub fn selection(&self) -> Result<Selection, CommandError> {
        Ok(Selection::new(
            self.session.clone().ok_or(CommandError::MissingArgument("--session"))?,
            self.instructor.clone().ok_or(CommandError::MissingArgument("--instructor"))?,
            self.soundscape.clone().ok_or(CommandError::MissingArgument("--soundscape"))?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("play"), Ok(Some(PlayerCommand::Play)));
        assert_eq!(parse_command("  STOP "), Ok(Some(PlayerCommand::Stop)));
        assert_eq!(parse_command("blend 80"), Ok(Some(PlayerCommand::Blend(80))));
        assert_eq!(parse_command("blend -5"), Ok(Some(PlayerCommand::Blend(-5))));
        assert_eq!(parse_command("i 3"), Ok(Some(PlayerCommand::Intensity(3))));
        assert_eq!(parse_command("timer 0"), Ok(Some(PlayerCommand::Timer(0))));
        assert_eq!(parse_command(""), Ok(None));
    }

    #[test]
    fn test_parse_command_errors() {
        assert_eq!(parse_command("dance"), Err(CommandError::Unknown("dance".into())));
        assert_eq!(parse_command("timer"), Err(CommandError::MissingValue("timer".into())));
        assert_eq!(
            parse_command("intensity lots"),
            Err(CommandError::BadNumber {
                command: "intensity".into(),
                value: "lots".into()
            })
        );
        assert!(parse_command("intensity -1").is_err());
    }

    #[test]
    fn test_cli_args() {
        let parsed = CliArgs::parse(args(&[
            "--session",
            "body-scan",
            "--instructor=maya",
            "--soundscape",
            "rain",
            "--blend",
            "70",
            "--timer=45",
        ]))
        .unwrap();

        assert_eq!(parsed.blend, Some(70));
        assert_eq!(parsed.timer, Some(45));
        assert_eq!(parsed.intensity, None);
        assert_eq!(parsed.selection().unwrap(), Selection::new("body-scan", "maya", "rain"));
    }

    #[test]
    fn test_cli_args_errors() {
        assert_eq!(
            CliArgs::parse(args(&["--session"])),
            Err(CommandError::MissingValue("--session".into()))
        );
        assert!(matches!(CliArgs::parse(args(&["--volume", "3"])), Err(CommandError::Unknown(_))));

        let parsed = CliArgs::parse(args(&["--session", "a", "--soundscape", "b"])).unwrap();
        assert_eq!(parsed.selection(), Err(CommandError::MissingArgument("--instructor")));
    }

    #[test]
    fn test_list_devices_needs_no_selection() {
        let parsed = CliArgs::parse(args(&["--list-devices"])).unwrap();
        assert!(parsed.list_devices);
    }
}
