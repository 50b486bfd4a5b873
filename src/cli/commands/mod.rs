pub mod auth;
pub mod logging;
pub mod provision;

use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

pub const CMD_SERVER: &str = "server";
pub const CMD_PROVISION: &str = "provision";
pub const ARG_DSN: &str = "dsn";
pub const ARG_PORT: &str = "port";
pub const ARG_RECIPES_FILE: &str = "recipes-file";

fn dsn_arg() -> Arg {
    Arg::new(ARG_DSN)
        .short('d')
        .long(ARG_DSN)
        .help("Database connection string")
        .env("RECIPES_DSN")
        .required(true)
}

fn server_command() -> Command {
    let command = Command::new(CMD_SERVER)
        .about("Serve the recipes API")
        .arg(dsn_arg())
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("RECIPES_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_RECIPES_FILE)
                .long(ARG_RECIPES_FILE)
                .help("JSON file with the initial recipe collection")
                .env("RECIPES_FILE"),
        );
    auth::with_args(command)
}

fn provision_command() -> Command {
    let command = Command::new(CMD_PROVISION)
        .about("Create or replace a user's credentials")
        .arg(dsn_arg());
    provision::with_args(command)
}

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

    let command = Command::new("recipes")
        .about("Recipes API with session and signed-token authentication")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(server_command())
        .subcommand(provision_command());

    logging::with_args(command)
}
