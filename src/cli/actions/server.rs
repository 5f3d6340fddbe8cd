use crate::{
    bridge::{
        self,
        directory::{RemoteDirectory, StaticDirectory, Verifier},
        session::MemorySessions,
        token::TokenCodec,
        BridgeConfig, BridgeState, SessionController,
    },
    cli::{commands::directory::Source, telemetry},
};
use anyhow::Result;
use secrecy::SecretString;
use std::{net::IpAddr, sync::Arc, time::Duration};
use tracing::{debug, info};

const SESSION_REAPER_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub token_secret: SecretString,
    pub token_ttl_seconds: u64,
    pub directory: Source,
    pub verifier_timeout_seconds: u64,
    pub session_ttl_seconds: u64,
    pub session_cookie_secure: bool,
    pub index_url: String,
    pub trusted_issuers: Vec<IpAddr>,
}

/// Build the verifier named by `source`.
///
/// # Errors
/// Returns an error if the users file cannot be loaded or the directory URL is invalid.
pub fn verifier(source: &Source, timeout: Duration) -> Result<Arc<dyn Verifier>> {
    Ok(match source {
        Source::UsersFile(path) => {
            let directory = StaticDirectory::load(path)?;
            info!(
                "Loaded {} users from {}",
                directory.len(),
                path.display()
            );
            Arc::new(directory)
        }
        Source::Remote(url) => {
            info!("Using remote directory at {url}");
            Arc::new(RemoteDirectory::new(url, timeout)?)
        }
    })
}

/// Execute the server action.
/// # Errors
/// Returns an error if the directory cannot be set up or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("Starting with {:?}", args);

    let timeout = Duration::from_secs(args.verifier_timeout_seconds);
    let verifier = verifier(&args.directory, timeout)?;

    let codec = TokenCodec::new(Some(args.token_secret))
        .with_ttl(Some(Duration::from_secs(args.token_ttl_seconds)));

    let sessions = MemorySessions::new(Duration::from_secs(args.session_ttl_seconds));
    let reaper = sessions.spawn_reaper(SESSION_REAPER_INTERVAL);

    let controller = SessionController::new(codec, verifier, Arc::new(sessions), timeout);

    let config = BridgeConfig::new()
        .with_index_url(args.index_url)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_session_cookie_secure(args.session_cookie_secure)
        .with_trusted_issuers(args.trusted_issuers);

    let result = bridge::new(args.port, Arc::new(BridgeState::new(controller, config))).await;

    reaper.abort();
    telemetry::shutdown_tracer();

    result
}
