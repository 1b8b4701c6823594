use std::fmt;

use thiserror::Error;

/// A direction of travel relative to the local NED frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down
}

impl Direction {
    /// Maps a single letter direction token (`f`, `b`, `l`, `r`, `u`, `d`).
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "f" => Some(Direction::Forward),
            "b" => Some(Direction::Backward),
            "l" => Some(Direction::Left),
            "r" => Some(Direction::Right),
            "u" => Some(Direction::Up),
            "d" => Some(Direction::Down),
            _ => None
        }
    }

    /// NED unit vector for this direction, down-positive.
    pub fn unit_ned(&self) -> (f64, f64, f64) {
        match self {
            Direction::Forward => (1.0, 0.0, 0.0),
            Direction::Backward => (-1.0, 0.0, 0.0),
            Direction::Right => (0.0, 1.0, 0.0),
            Direction::Left => (0.0, -1.0, 0.0),
            Direction::Up => (0.0, 0.0, -1.0),
            Direction::Down => (0.0, 0.0, 1.0)
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Forward => "F",
            Direction::Backward => "B",
            Direction::Left => "L",
            Direction::Right => "R",
            Direction::Up => "U",
            Direction::Down => "D"
        };
        f.write_str(s)
    }
}

/// Why a manual control line could not be understood.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command `{0}`")]
    UnknownCommand(String),

    #[error("unknown direction `{0}`")]
    UnknownDirection(String),

    #[error("`{command}` needs an argument")]
    MissingArgument { command: String },

    #[error("`{command}` takes no more than {expected} argument(s)")]
    UnexpectedArgument { command: String, expected: usize },

    #[error("`{value}` is not a number")]
    InvalidNumber { command: String, value: String },

    #[error("`{value}` is not a finite number")]
    NonFinite { command: String, value: String },

    #[error("turn angle must not be negative, got {value}")]
    NegativeAngle { command: String, value: f64 },
}

impl ParseError {
    /// The format hint to show the operator for this failure.
    pub fn usage(&self) -> &'static str {
        let command = match self {
            ParseError::MissingArgument { command }
            | ParseError::UnexpectedArgument { command, .. }
            | ParseError::InvalidNumber { command, .. }
            | ParseError::NonFinite { command, .. }
            | ParseError::NegativeAngle { command, .. } => command.as_str(),
            ParseError::UnknownDirection(_) => "move",
            ParseError::Empty | ParseError::UnknownCommand(_) => ""
        };

        match command {
            "turn_r" => "Format: turn_r <angle>",
            "turn_l" => "Format: turn_l <angle>",
            "move" => "Format: <f|b|l|r|u|d> <distance>",
            "" => USAGE,
            _ => "Format: exit | land | rth | debug | turn_b"
        }
    }
}

/// Help for the whole manual control language.
pub const USAGE: &str = "Commands: <f|b|l|r|u|d> <distance>, turn_r <angle>, turn_l <angle>, turn_b, land, rth, debug, exit";

/// One line of manual control input, parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum ManualCommand {
    Move { direction: Direction, distance: f64 },
    TurnRight(f64),
    TurnLeft(f64),
    TurnAbout,
    Land,
    ReturnToLaunch,
    DebugTelemetry,
    Exit,
    Invalid(ParseError)
}

impl ManualCommand {
    /// Parses an operator input line. Never fails, bad input becomes
    /// `ManualCommand::Invalid` carrying the reason.
    pub fn parse(line: &str) -> ManualCommand {
        match Self::try_parse(line) {
            Ok(command) => command,
            Err(err) => ManualCommand::Invalid(err)
        }
    }

    pub fn try_parse(line: &str) -> Result<ManualCommand, ParseError> {
        let line = line.trim().to_lowercase();
        let tokens: Vec<&str> = line.split_whitespace().collect();

        let (&head, args) = tokens.split_first().ok_or(ParseError::Empty)?;

        let literal = match head {
            "exit" => Some(ManualCommand::Exit),
            "land" => Some(ManualCommand::Land),
            "rth" => Some(ManualCommand::ReturnToLaunch),
            "debug" => Some(ManualCommand::DebugTelemetry),
            "turn_b" => Some(ManualCommand::TurnAbout),
            _ => None
        };
        if let Some(command) = literal {
            if !args.is_empty() {
                return Err(ParseError::UnexpectedArgument { command: head.to_string(), expected: 0 });
            }
            return Ok(command);
        }

        match head {
            "turn_r" => Ok(ManualCommand::TurnRight(angle_argument(head, args)?)),
            "turn_l" => Ok(ManualCommand::TurnLeft(angle_argument(head, args)?)),
            _ => {
                // anything else has to be a two token move
                if args.is_empty() {
                    return Err(match Direction::from_token(head) {
                        Some(_) => ParseError::MissingArgument { command: "move".to_string() },
                        None => ParseError::UnknownCommand(head.to_string())
                    });
                }
                let distance = number_argument("move", args)?;
                let direction = Direction::from_token(head)
                    .ok_or_else(|| ParseError::UnknownDirection(head.to_string()))?;
                Ok(ManualCommand::Move { direction, distance })
            }
        }
    }
}

fn number_argument(command: &str, args: &[&str]) -> Result<f64, ParseError> {
    let value = match args {
        [] => return Err(ParseError::MissingArgument { command: command.to_string() }),
        [value] => *value,
        _ => return Err(ParseError::UnexpectedArgument { command: command.to_string(), expected: 1 })
    };

    let n = value.parse::<f64>().map_err(|_| ParseError::InvalidNumber {
        command: command.to_string(),
        value: value.to_string()
    })?;

    if !n.is_finite() {
        return Err(ParseError::NonFinite { command: command.to_string(), value: value.to_string() });
    }

    Ok(n)
}

fn angle_argument(command: &str, args: &[&str]) -> Result<f64, ParseError> {
    let deg = number_argument(command, args)?;
    if deg < 0.0 {
        return Err(ParseError::NegativeAngle { command: command.to_string(), value: deg });
    }
    Ok(deg)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_literals() {
        assert_eq!(ManualCommand::parse("exit"), ManualCommand::Exit);
        assert_eq!(ManualCommand::parse("  LAND "), ManualCommand::Land);
        assert_eq!(ManualCommand::parse("rth"), ManualCommand::ReturnToLaunch);
        assert_eq!(ManualCommand::parse("debug"), ManualCommand::DebugTelemetry);
        assert_eq!(ManualCommand::parse("turn_b"), ManualCommand::TurnAbout);
    }

    #[test]
    fn test_turns() {
        assert_eq!(ManualCommand::parse("turn_r 90"), ManualCommand::TurnRight(90.0));
        assert_eq!(ManualCommand::parse("turn_l 45.5"), ManualCommand::TurnLeft(45.5));
        assert_eq!(ManualCommand::parse("turn_r\t720"), ManualCommand::TurnRight(720.0));

        assert_eq!(
            ManualCommand::try_parse("turn_r"),
            Err(ParseError::MissingArgument { command: "turn_r".to_string() })
        );
        assert!(matches!(
            ManualCommand::try_parse("turn_l abc"),
            Err(ParseError::InvalidNumber { .. })
        ));
        assert!(matches!(
            ManualCommand::try_parse("turn_r -10"),
            Err(ParseError::NegativeAngle { .. })
        ));
        assert!(matches!(
            ManualCommand::try_parse("turn_b 10"),
            Err(ParseError::UnexpectedArgument { expected: 0, .. })
        ));
    }

    #[test]
    fn test_moves() {
        assert_eq!(
            ManualCommand::parse("f 3"),
            ManualCommand::Move { direction: Direction::Forward, distance: 3.0 }
        );
        assert_eq!(
            ManualCommand::parse("U 0.5"),
            ManualCommand::Move { direction: Direction::Up, distance: 0.5 }
        );
        // clamping is done by the motion planner, not the parser
        assert_eq!(
            ManualCommand::parse("b -2"),
            ManualCommand::Move { direction: Direction::Backward, distance: -2.0 }
        );

        assert_eq!(
            ManualCommand::try_parse("x 1"),
            Err(ParseError::UnknownDirection("x".to_string()))
        );
        assert!(matches!(
            ManualCommand::try_parse("f nan"),
            Err(ParseError::NonFinite { .. })
        ));
        assert!(matches!(
            ManualCommand::try_parse("f 1 2"),
            Err(ParseError::UnexpectedArgument { expected: 1, .. })
        ));
        assert!(matches!(
            ManualCommand::try_parse("f"),
            Err(ParseError::MissingArgument { .. })
        ));
    }

    #[test]
    fn test_garbage() {
        assert_eq!(
            ManualCommand::parse("xyz"),
            ManualCommand::Invalid(ParseError::UnknownCommand("xyz".to_string()))
        );
        assert_eq!(ManualCommand::parse("   "), ManualCommand::Invalid(ParseError::Empty));
        assert_eq!(ParseError::Empty.usage(), USAGE);
        assert_eq!(
            ParseError::MissingArgument { command: "turn_r".to_string() }.usage(),
            "Format: turn_r <angle>"
        );
    }
}
