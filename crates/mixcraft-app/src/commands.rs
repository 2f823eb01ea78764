//! Line commands accepted on stdin.

use kurbo::Point;
use std::str::FromStr;
use thiserror::Error;

/// A parsed command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Spawn a palette item centred at a point.
    Spawn { label: String, at: Point },
    /// Press at `from`, move to `to`, release.
    Drag { from: Point, to: Point },
    /// Ask the server to combine two tokens, by label.
    Combine { first: String, second: String },
    /// Change the display name.
    Name(String),
    /// Click a bingo cell.
    Bingo(usize),
    /// Remove every token.
    Clear,
    /// Print the surface and palette.
    List,
    Help,
    Quit,
}

/// Why a line could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,
    #[error("Unknown command: {0} (try `help`)")]
    Unknown(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error("Not a number: {0}")]
    BadNumber(String),
}

/// A command's usage line and description.
#[derive(Debug, Clone)]
pub struct CommandHelp {
    pub usage: &'static str,
    pub description: &'static str,
}

const SPAWN_USAGE: &str = "spawn <label> <x> <y>";
const DRAG_USAGE: &str = "drag <x> <y> <x2> <y2>";
const COMBINE_USAGE: &str = "combine <label> <label>";
const NAME_USAGE: &str = "name <new name>";
const BINGO_USAGE: &str = "bingo <index>";

/// Every command with its usage.
pub fn help() -> Vec<CommandHelp> {
    vec![
        CommandHelp { usage: SPAWN_USAGE, description: "Spawn a palette item" },
        CommandHelp { usage: DRAG_USAGE, description: "Drag whatever is under the first point" },
        CommandHelp { usage: COMBINE_USAGE, description: "Combine two tokens" },
        CommandHelp { usage: NAME_USAGE, description: "Change your display name" },
        CommandHelp { usage: BINGO_USAGE, description: "Toggle a bingo cell" },
        CommandHelp { usage: "clear", description: "Remove all tokens" },
        CommandHelp { usage: "list", description: "Show tokens and palette" },
        CommandHelp { usage: "help", description: "Show this help" },
        CommandHelp { usage: "quit", description: "Exit" },
    ]
}

fn number(s: &str) -> Result<f64, CommandError> {
    s.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| CommandError::BadNumber(s.to_string()))
}

fn point(x: &str, y: &str) -> Result<Point, CommandError> {
    Ok(Point::new(number(x)?, number(y)?))
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(CommandError::Empty);
        };
        let args: Vec<&str> = words.collect();

        match verb.to_lowercase().as_str() {
            "spawn" => match args.as_slice() {
                // Labels may contain spaces; the last two words are coordinates
                [label @ .., x, y] if !label.is_empty() => Ok(Command::Spawn {
                    label: label.join(" "),
                    at: point(x, y)?,
                }),
                _ => Err(CommandError::Usage(SPAWN_USAGE)),
            },
            "drag" => match args.as_slice() {
                [x, y, x2, y2] => Ok(Command::Drag { from: point(x, y)?, to: point(x2, y2)? }),
                _ => Err(CommandError::Usage(DRAG_USAGE)),
            },
            "combine" => match args.as_slice() {
                [first, second] => Ok(Command::Combine {
                    first: first.to_string(),
                    second: second.to_string(),
                }),
                _ => Err(CommandError::Usage(COMBINE_USAGE)),
            },
            "name" if !args.is_empty() => Ok(Command::Name(args.join(" "))),
            "name" => Err(CommandError::Usage(NAME_USAGE)),
            "bingo" => match args.as_slice() {
                [index] => index
                    .parse()
                    .map(Command::Bingo)
                    .map_err(|_| CommandError::BadNumber(index.to_string())),
                _ => Err(CommandError::Usage(BINGO_USAGE)),
            },
            "clear" => Ok(Command::Clear),
            "list" | "ls" => Ok(Command::List),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}
