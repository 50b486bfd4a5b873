//! Map parsed CLI arguments to an `Action`.

use crate::cli::actions::{Action, provision, server};
use crate::cli::commands::{self, ARG_DSN, ARG_PORT, ARG_RECIPES_FILE, CMD_PROVISION, CMD_SERVER};
use anyhow::{Context, Result, anyhow};
use std::path::PathBuf;

fn dsn(matches: &clap::ArgMatches) -> Result<String> {
    matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")
}

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some((CMD_SERVER, sub)) => {
            let auth_opts = commands::auth::Options::parse(sub)?;
            Ok(Action::Server(server::Args {
                port: sub.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080),
                dsn: dsn(sub)?,
                jwt_secret: auth_opts.jwt_secret,
                auth_config: auth_opts.config,
                recipes_file: sub.get_one::<String>(ARG_RECIPES_FILE).map(PathBuf::from),
            }))
        }
        Some((CMD_PROVISION, sub)) => {
            let opts = commands::provision::Options::parse(sub)?;
            Ok(Action::Provision(provision::Args {
                dsn: dsn(sub)?,
                username: opts.username,
                password: opts.password,
            }))
        }
        Some((other, _)) => Err(anyhow!("unknown subcommand: {other}")),
        None => Err(anyhow!("missing subcommand")),
    }
}
