//! Map validated CLI arguments to the action to run.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{directory, session, token, ARG_PORT};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);

    let token_opts = token::Options::parse(matches)?;
    let directory_opts = directory::Options::parse(matches)?;
    let session_opts = session::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        token_secret: token_opts.secret,
        token_ttl_seconds: token_opts.ttl_seconds,
        directory: directory_opts.source,
        verifier_timeout_seconds: directory_opts.timeout_seconds,
        session_ttl_seconds: session_opts.ttl_seconds,
        session_cookie_secure: session_opts.cookie_secure,
        index_url: session_opts.index_url,
        trusted_issuers: session_opts.trusted_issuers,
    }))
}
