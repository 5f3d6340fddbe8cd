use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

pub const ARG_USERS_FILE: &str = "users-file";
pub const ARG_DIRECTORY_URL: &str = "directory-url";
pub const ARG_VERIFIER_TIMEOUT_SECONDS: &str = "verifier-timeout-seconds";

/// Where users are verified and looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    UsersFile(PathBuf),
    Remote(String),
}

#[derive(Debug, Clone)]
pub struct Options {
    pub source: Source,
    pub timeout_seconds: u64,
}

impl Options {
    /// Parse directory arguments from matches.
    ///
    /// # Errors
    /// Returns an error if neither a users file nor a directory URL is given.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let source = match (get_non_empty(ARG_USERS_FILE), get_non_empty(ARG_DIRECTORY_URL)) {
            (Some(path), None) => Source::UsersFile(PathBuf::from(path)),
            (None, Some(url)) => Source::Remote(url),
            (Some(_), Some(_)) => anyhow::bail!(
                "--{ARG_USERS_FILE} and --{ARG_DIRECTORY_URL} cannot be used together"
            ),
            (None, None) => anyhow::bail!(
                "missing required argument: --{ARG_USERS_FILE} or --{ARG_DIRECTORY_URL}"
            ),
        };

        Ok(Self {
            source,
            timeout_seconds: matches
                .get_one::<u64>(ARG_VERIFIER_TIMEOUT_SECONDS)
                .copied()
                .unwrap_or(5),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_USERS_FILE)
                .long(ARG_USERS_FILE)
                .help("JSON file of users with argon2 password hashes")
                .env("AUTHBRIDGE_USERS_FILE"),
        )
        .arg(
            Arg::new(ARG_DIRECTORY_URL)
                .long(ARG_DIRECTORY_URL)
                .help("Base URL of an HTTP user directory")
                .long_help(
                    "Base URL of an HTTP user directory. Credentials are checked with\n`POST {url}/verify` and users are resolved with `GET {url}/users/{username}`.",
                )
                .env("AUTHBRIDGE_DIRECTORY_URL"),
        )
        .arg(
            Arg::new(ARG_VERIFIER_TIMEOUT_SECONDS)
                .long(ARG_VERIFIER_TIMEOUT_SECONDS)
                .help("Maximum time to wait for the user directory")
                .env("AUTHBRIDGE_VERIFIER_TIMEOUT_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
