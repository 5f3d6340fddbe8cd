use clap::{builder::ValueParser, Arg, ArgAction, ArgMatches, Command};
use tracing::Level;

pub const ARG_VERBOSITY: &str = "verbosity";

const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Accept `-v` counts as well as `AUTHBRIDGE_LOG_LEVEL=info` or `=2`.
fn log_level(value: &str) -> Result<u8, String> {
    let value = value.trim().to_lowercase();

    if let Ok(count) = value.parse::<u8>() {
        return if usize::from(count) < LEVELS.len() {
            Ok(count)
        } else {
            Err(format!("log level must be 0-{}", LEVELS.len() - 1))
        };
    }

    LEVELS
        .iter()
        .position(|level| *level == value)
        .and_then(|index| u8::try_from(index).ok())
        .ok_or_else(|| format!("invalid log level '{value}', expected one of {}", LEVELS.join(", ")))
}

/// Map a verbosity count to a tracing level; 0 keeps the default (ERROR).
#[must_use]
pub const fn level_for(verbosity: u8) -> Option<Level> {
    match verbosity {
        0 => None,
        1 => Some(Level::WARN),
        2 => Some(Level::INFO),
        3 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub level: Option<Level>,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            level: level_for(matches.get_one::<u8>(ARG_VERBOSITY).copied().unwrap_or(0)),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Log more: -v warn, -vv info (logins, logouts, issued tokens), -vvv debug, -vvvv trace")
            .env("AUTHBRIDGE_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(ValueParser::from(log_level)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_names_and_counts() {
        assert_eq!(log_level("error"), Ok(0));
        assert_eq!(log_level(" INFO "), Ok(2));
        assert_eq!(log_level("trace"), Ok(4));
        assert_eq!(log_level("3"), Ok(3));
        assert!(log_level("5").is_err());
        assert!(log_level("loud").is_err());
    }

    #[test]
    fn verbosity_to_level() {
        assert_eq!(level_for(0), None);
        assert_eq!(level_for(1), Some(Level::WARN));
        assert_eq!(level_for(2), Some(Level::INFO));
        assert_eq!(level_for(3), Some(Level::DEBUG));
        assert_eq!(level_for(4), Some(Level::TRACE));
        assert_eq!(level_for(9), Some(Level::TRACE));
    }
}
