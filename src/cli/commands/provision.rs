use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_USERNAME: &str = "username";
pub const ARG_PASSWORD: &str = "password";

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_USERNAME)
                .short('u')
                .long(ARG_USERNAME)
                .help("Username to create or update")
                .required(true),
        )
        .arg(
            Arg::new(ARG_PASSWORD)
                .long(ARG_PASSWORD)
                .help("Password to store as a SHA-256 digest")
                .env("RECIPES_PROVISION_PASSWORD")
                .hide_env_values(true)
                .required(true),
        )
}

#[derive(Debug)]
pub struct Options {
    pub username: String,
    pub password: SecretString,
}

impl Options {
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let username = matches
            .get_one::<String>(ARG_USERNAME)
            .cloned()
            .context("missing required argument: --username")?;
        let password = matches
            .get_one::<String>(ARG_PASSWORD)
            .cloned()
            .context("missing required argument: --password")?;
        Ok(Self {
            username,
            password: SecretString::from(password),
        })
    }
}
