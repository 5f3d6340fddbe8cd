pub mod directory;
pub mod logging;
pub mod session;
pub mod token;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const ARG_PORT: &str = "port";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("authbridge")
        .about("Session and token authentication bridge")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("AUTHBRIDGE_PORT")
                .value_parser(clap::value_parser!(u16)),
        );

    let command = token::with_args(command);
    let command = directory::with_args(command);
    let command = session::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::net::IpAddr;

    const ALL_VARS: [&str; 11] = [
        "AUTHBRIDGE_PORT",
        "AUTHBRIDGE_TOKEN_SECRET",
        "AUTHBRIDGE_TOKEN_TTL_SECONDS",
        "AUTHBRIDGE_USERS_FILE",
        "AUTHBRIDGE_DIRECTORY_URL",
        "AUTHBRIDGE_VERIFIER_TIMEOUT_SECONDS",
        "AUTHBRIDGE_SESSION_TTL_SECONDS",
        "AUTHBRIDGE_SESSION_COOKIE_SECURE",
        "AUTHBRIDGE_INDEX_URL",
        "AUTHBRIDGE_TRUSTED_ISSUERS",
        "AUTHBRIDGE_LOG_LEVEL",
    ];

    fn cleared() -> Vec<(&'static str, Option<&'static str>)> {
        ALL_VARS.iter().map(|&var| (var, None)).collect()
    }

    fn with_env(vars: &[(&'static str, Option<&'static str>)]) -> Vec<(&'static str, Option<&'static str>)> {
        let mut all = cleared();
        for (key, value) in vars {
            all.retain(|(k, _)| k != key);
            all.push((*key, *value));
        }
        all
    }

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "authbridge");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some("Session and token authentication bridge".to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_defaults() {
        temp_env::with_vars(cleared(), || {
            let matches = new().get_matches_from(vec!["authbridge"]);

            assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(8080));
            assert_eq!(
                matches
                    .get_one::<u64>(token::ARG_TOKEN_TTL_SECONDS)
                    .copied(),
                Some(0)
            );
            assert_eq!(
                matches
                    .get_one::<u64>(directory::ARG_VERIFIER_TIMEOUT_SECONDS)
                    .copied(),
                Some(5)
            );

            let session = session::Options::parse(&matches).unwrap();
            assert_eq!(session.ttl_seconds, 604_800);
            assert!(!session.cookie_secure);
            assert_eq!(session.index_url, "/");
            assert_eq!(
                session.trusted_issuers,
                vec![
                    "127.0.0.1".parse::<IpAddr>().unwrap(),
                    "::1".parse::<IpAddr>().unwrap()
                ]
            );

            assert!(token::Options::parse(&matches).is_err());
            assert!(directory::Options::parse(&matches).is_err());
        });
    }

    #[test]
    fn test_check_args() {
        temp_env::with_vars(cleared(), || {
            let matches = new().get_matches_from(vec![
                "authbridge",
                "--port",
                "9090",
                "--token-secret",
                "s1",
                "--token-ttl-seconds",
                "3600",
                "--directory-url",
                "https://directory.example.com/api",
                "--session-cookie-secure",
                "--trusted-issuer",
                "10.0.0.1",
                "--trusted-issuer",
                "10.0.0.2",
            ]);

            assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(9090));

            let token = token::Options::parse(&matches).unwrap();
            assert_eq!(token.secret.expose_secret(), "s1");
            assert_eq!(token.ttl_seconds, 3600);

            let directory = directory::Options::parse(&matches).unwrap();
            assert_eq!(
                directory.source,
                directory::Source::Remote("https://directory.example.com/api".to_string())
            );

            let session = session::Options::parse(&matches).unwrap();
            assert!(session.cookie_secure);
            assert_eq!(session.trusted_issuers.len(), 2);
        });
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            with_env(&[
                ("AUTHBRIDGE_PORT", Some("443")),
                ("AUTHBRIDGE_TOKEN_SECRET", Some("from-env")),
                ("AUTHBRIDGE_USERS_FILE", Some("/etc/authbridge/users.json")),
                ("AUTHBRIDGE_SESSION_COOKIE_SECURE", Some("true")),
                ("AUTHBRIDGE_INDEX_URL", Some("/superset/welcome/")),
                ("AUTHBRIDGE_TRUSTED_ISSUERS", Some("10.1.0.1,fd00::1")),
                ("AUTHBRIDGE_LOG_LEVEL", Some("info")),
            ]),
            || {
                let matches = new().get_matches_from(vec!["authbridge"]);
                assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(443));
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(2)
                );
                assert_eq!(
                    logging::Options::parse(&matches).level,
                    Some(tracing::Level::INFO)
                );

                let token = token::Options::parse(&matches).unwrap();
                assert_eq!(token.secret.expose_secret(), "from-env");

                let directory = directory::Options::parse(&matches).unwrap();
                assert_eq!(
                    directory.source,
                    directory::Source::UsersFile("/etc/authbridge/users.json".into())
                );

                let session = session::Options::parse(&matches).unwrap();
                assert!(session.cookie_secure);
                assert_eq!(session.index_url, "/superset/welcome/");
                assert_eq!(
                    session.trusted_issuers,
                    vec![
                        "10.1.0.1".parse::<IpAddr>().unwrap(),
                        "fd00::1".parse::<IpAddr>().unwrap()
                    ]
                );
            },
        );
    }

    #[test]
    fn test_directory_sources_are_exclusive() {
        temp_env::with_vars(cleared(), || {
            let matches = new().get_matches_from(vec![
                "authbridge",
                "--users-file",
                "users.json",
                "--directory-url",
                "https://directory.example.com",
            ]);
            let err = directory::Options::parse(&matches).unwrap_err();
            assert!(err.to_string().contains("cannot be used together"));
        });
    }

    #[test]
    fn test_session_ttl_bounds() {
        temp_env::with_vars(cleared(), || {
            for ttl in ["0", "315360001", "18446744073709551615"] {
                let result =
                    new().try_get_matches_from(vec!["authbridge", "--session-ttl-seconds", ttl]);
                assert!(result.is_err(), "ttl {ttl} should be rejected");
            }

            let matches = new()
                .try_get_matches_from(vec!["authbridge", "--session-ttl-seconds", "315360000"])
                .unwrap();
            let session = session::Options::parse(&matches).unwrap();
            assert_eq!(session.ttl_seconds, 315_360_000);
        });

        temp_env::with_vars(
            with_env(&[("AUTHBRIDGE_SESSION_TTL_SECONDS", Some("0"))]),
            || {
                assert!(new().try_get_matches_from(vec!["authbridge"]).is_err());
            },
        );
    }

    #[test]
    fn test_empty_secret_is_missing() {
        temp_env::with_vars(with_env(&[("AUTHBRIDGE_TOKEN_SECRET", Some(" "))]), || {
            let matches = new().get_matches_from(vec!["authbridge"]);
            let err = token::Options::parse(&matches).unwrap_err();
            assert!(err
                .to_string()
                .contains("missing required argument: --token-secret"));
        });
    }

    #[test]
    fn test_check_log_level_env() {
        // loop cover all possible value_parse
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars(with_env(&[("AUTHBRIDGE_LOG_LEVEL", Some(level))]), || {
                let matches = new().get_matches_from(vec!["authbridge"]);
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        for index in 0..5usize {
            temp_env::with_vars(cleared(), || {
                let mut args = vec!["authbridge".to_string()];

                // Add the appropriate number of "-v" flags based on the index
                if index > 0 {
                    args.push(format!("-{}", "v".repeat(index)));
                }

                let matches = new().get_matches_from(args);

                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }
}
