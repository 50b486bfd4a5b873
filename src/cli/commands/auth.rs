use anyhow::{Context, Result, anyhow};
use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;

use crate::api::auth::{AuthConfig, MAX_TTL_SECONDS};

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_TOKEN_TTL_SECONDS: &str = "token-ttl-seconds";
pub const ARG_REFRESH_WINDOW_SECONDS: &str = "refresh-window-seconds";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("HS256 secret used to sign tokens")
                .env("RECIPES_JWT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session cookie TTL in seconds")
                .env("RECIPES_SESSION_TTL_SECONDS")
                .default_value("43200")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_TOKEN_TTL_SECONDS)
                .long(ARG_TOKEN_TTL_SECONDS)
                .help("Signed token lifetime in seconds")
                .env("RECIPES_TOKEN_TTL_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_REFRESH_WINDOW_SECONDS)
                .long(ARG_REFRESH_WINDOW_SECONDS)
                .help("Seconds before expiry from which a token may be refreshed")
                .env("RECIPES_REFRESH_WINDOW_SECONDS")
                .default_value("30")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark the session cookie Secure (serve over HTTPS)")
                .env("RECIPES_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
}

#[derive(Debug)]
pub struct Options {
    pub jwt_secret: SecretString,
    pub config: AuthConfig,
}

impl Options {
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let jwt_secret = matches
            .get_one::<String>(ARG_JWT_SECRET)
            .cloned()
            .context("missing required argument: --jwt-secret")?;
        if jwt_secret.is_empty() {
            return Err(anyhow!("--jwt-secret must not be empty"));
        }

        let number = |name: &str| {
            matches
                .get_one::<i64>(name)
                .copied()
                .with_context(|| format!("missing required argument: --{name}"))
        };

        let config = AuthConfig::new()
            .with_session_ttl_seconds(number(ARG_SESSION_TTL_SECONDS)?)
            .with_token_ttl_seconds(number(ARG_TOKEN_TTL_SECONDS)?)
            .with_refresh_window_seconds(number(ARG_REFRESH_WINDOW_SECONDS)?)
            .with_session_cookie_secure(matches.get_flag(ARG_COOKIE_SECURE));

        Ok(Self {
            jwt_secret: SecretString::from(jwt_secret),
            config,
        })
    }
}
