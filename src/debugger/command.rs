use thiserror::Error;

use crate::asm::parse_immediate;

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Help,
    Step { count: usize },
    /// `None` runs with the configured step bound.
    Run { max_steps: Option<usize> },
    BreakList,
    BreakAdd { location: Location },
    BreakRemove { location: Location },
    Registers,
    Memory { location: Location, count: u16 },
    Reset,
    Reload,
    Quit,
}

/// Memory address, given literally or by label.
#[derive(Debug, PartialEq, Eq)]
pub enum Location {
    Address(u16),
    Label(String),
}

/// Error parsing a command.
#[derive(Debug, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Not a command: `{0}`")]
    InvalidCommand(String),
    #[error("Missing subcommand for `{0}`")]
    MissingSubcommand(&'static str),
    #[error("Invalid subcommand `{subcommand}` for command `{command}`")]
    InvalidSubcommand {
        command: &'static str,
        subcommand: String,
    },
    #[error("Missing argument `{argument}` for command `{command}`")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    #[error("Too many arguments for command `{0}`")]
    TooManyArguments(&'static str),
    #[error("Invalid value `{value}` for argument `{argument}`")]
    InvalidValue {
        argument: &'static str,
        value: String,
    },
}

impl TryFrom<&str> for Command {
    type Error = CommandError;

    /// Assumes line is non-empty.
    fn try_from(line: &str) -> Result<Self, Self::Error> {
        let mut args = line.split_whitespace();
        let name = args.next().unwrap_or_default();

        let (command_name, command) = match name.to_lowercase().as_str() {
            "h" | "help" => return Ok(Self::Help),
            "s" | "step" => {
                let count = optional_count(args.next(), "count")?.unwrap_or(1);
                ("step", Self::Step { count })
            }
            "r" | "run" => {
                let max_steps = optional_count(args.next(), "count")?;
                ("run", Self::Run { max_steps })
            }
            "b" | "break" => {
                let subcommand = args
                    .next()
                    .ok_or(CommandError::MissingSubcommand("break"))?;
                match subcommand.to_lowercase().as_str() {
                    "l" | "list" => ("break list", Self::BreakList),
                    "a" | "add" => {
                        let location = location(args.next(), "break add")?;
                        ("break add", Self::BreakAdd { location })
                    }
                    "r" | "remove" => {
                        let location = location(args.next(), "break remove")?;
                        ("break remove", Self::BreakRemove { location })
                    }
                    _ => {
                        return Err(CommandError::InvalidSubcommand {
                            command: "break",
                            subcommand: subcommand.to_string(),
                        })
                    }
                }
            }
            "reg" | "registers" => ("registers", Self::Registers),
            "m" | "mem" | "memory" => {
                let location = location(args.next(), "memory")?;
                let count = match optional_count(args.next(), "count")? {
                    Some(count) => u16::try_from(count).map_err(|_| CommandError::InvalidValue {
                        argument: "count",
                        value: count.to_string(),
                    })?,
                    None => 1,
                };
                ("memory", Self::Memory { location, count })
            }
            "reset" => ("reset", Self::Reset),
            "reload" => ("reload", Self::Reload),
            "q" | "quit" | "exit" => ("quit", Self::Quit),
            _ => return Err(CommandError::InvalidCommand(name.to_string())),
        };

        if args.next().is_some() {
            return Err(CommandError::TooManyArguments(command_name));
        }
        Ok(command)
    }
}

/// Positive integer argument, if present.
fn optional_count(arg: Option<&str>, argument: &'static str) -> Result<Option<usize>, CommandError> {
    let Some(arg) = arg else {
        return Ok(None);
    };
    match parse_immediate(arg) {
        Ok(count) if count > 0 => usize::try_from(count).map(Some).map_err(|_| invalid(argument, arg)),
        _ => Err(invalid(argument, arg)),
    }
}

fn location(arg: Option<&str>, command: &'static str) -> Result<Location, CommandError> {
    let arg = arg.ok_or(CommandError::MissingArgument {
        command,
        argument: "location",
    })?;
    if arg.starts_with(|c: char| c.is_ascii_digit() || c == '#' || c == '-') {
        let value = parse_immediate(arg).map_err(|_| invalid("location", arg))?;
        let address = u16::try_from(value).map_err(|_| invalid("location", arg))?;
        return Ok(Location::Address(address));
    }
    Ok(Location::Label(arg.to_string()))
}

fn invalid(argument: &'static str, value: &str) -> CommandError {
    CommandError::InvalidValue {
        argument,
        value: value.to_string(),
    }
}
