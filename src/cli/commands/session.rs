use crate::bridge::session::MAX_SESSION_TTL;
use clap::{builder::BoolishValueParser, Arg, ArgAction, ArgMatches, Command};
use std::net::IpAddr;

pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_SESSION_COOKIE_SECURE: &str = "session-cookie-secure";
pub const ARG_INDEX_URL: &str = "index-url";
pub const ARG_TRUSTED_ISSUER: &str = "trusted-issuer";

#[derive(Debug, Clone)]
pub struct Options {
    pub ttl_seconds: u64,
    pub cookie_secure: bool,
    pub index_url: String,
    pub trusted_issuers: Vec<IpAddr>,
}

impl Options {
    /// Parse session arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the index URL is empty.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let index_url = match matches.get_one::<String>(ARG_INDEX_URL) {
            Some(value) if !value.trim().is_empty() => value.trim().to_string(),
            _ => anyhow::bail!("missing required argument: --{ARG_INDEX_URL}"),
        };

        Ok(Self {
            ttl_seconds: matches
                .get_one::<u64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(604_800),
            cookie_secure: matches.get_flag(ARG_SESSION_COOKIE_SECURE),
            index_url,
            trusted_issuers: matches
                .get_many::<IpAddr>(ARG_TRUSTED_ISSUER)
                .map(|ips| ips.copied().collect())
                .unwrap_or_default(),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session cookie TTL in seconds")
                .env("AUTHBRIDGE_SESSION_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(u64).range(1..=MAX_SESSION_TTL.as_secs())),
        )
        .arg(
            Arg::new(ARG_SESSION_COOKIE_SECURE)
                .long(ARG_SESSION_COOKIE_SECURE)
                .help("Mark the session cookie Secure (serve over HTTPS)")
                .env("AUTHBRIDGE_SESSION_COOKIE_SECURE")
                .action(ArgAction::SetTrue)
                .value_parser(BoolishValueParser::new()),
        )
        .arg(
            Arg::new(ARG_INDEX_URL)
                .long(ARG_INDEX_URL)
                .help("Where to send users after login when no local `next` is given")
                .env("AUTHBRIDGE_INDEX_URL")
                .default_value("/"),
        )
        .arg(
            Arg::new(ARG_TRUSTED_ISSUER)
                .long(ARG_TRUSTED_ISSUER)
                .help("IP address allowed to request tokens (repeatable or comma separated)")
                .env("AUTHBRIDGE_TRUSTED_ISSUERS")
                .action(ArgAction::Append)
                .value_delimiter(',')
                .default_values(["127.0.0.1", "::1"])
                .value_parser(clap::value_parser!(IpAddr)),
        )
}
