use crate::gly::service::rest::{DEFAULT_AUTH_URL, DEFAULT_FIRESTORE_URL, DEFAULT_TOKEN_URL};
use clap::{builder::BoolishValueParser, Arg, ArgAction, Command};

pub const ARG_API_KEY: &str = "api-key";
pub const ARG_PROJECT_ID: &str = "project-id";
pub const ARG_AUTH_URL: &str = "auth-url";
pub const ARG_TOKEN_URL: &str = "token-url";
pub const ARG_FIRESTORE_URL: &str = "firestore-url";
pub const ARG_SESSION_FILE: &str = "session-file";
pub const ARG_OFFLINE: &str = "offline";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_OFFLINE)
                .long(ARG_OFFLINE)
                .help("Use the in-process identity backend; nothing leaves the machine")
                .env("GLY_OFFLINE")
                .action(ArgAction::SetTrue)
                .value_parser(BoolishValueParser::new()),
        )
        .arg(
            Arg::new(ARG_API_KEY)
                .long(ARG_API_KEY)
                .help("Web API key of the identity project")
                .env("GLY_API_KEY")
                .hide_env_values(true)
                .required_unless_present(ARG_OFFLINE),
        )
        .arg(
            Arg::new(ARG_PROJECT_ID)
                .long(ARG_PROJECT_ID)
                .help("Project id owning the users collection")
                .env("GLY_PROJECT_ID")
                .required_unless_present(ARG_OFFLINE),
        )
        .arg(
            Arg::new(ARG_AUTH_URL)
                .long(ARG_AUTH_URL)
                .help("Identity toolkit base URL")
                .env("GLY_AUTH_URL")
                .default_value(DEFAULT_AUTH_URL),
        )
        .arg(
            Arg::new(ARG_TOKEN_URL)
                .long(ARG_TOKEN_URL)
                .help("Secure token service base URL")
                .env("GLY_TOKEN_URL")
                .default_value(DEFAULT_TOKEN_URL),
        )
        .arg(
            Arg::new(ARG_FIRESTORE_URL)
                .long(ARG_FIRESTORE_URL)
                .help("Document store base URL")
                .env("GLY_FIRESTORE_URL")
                .default_value(DEFAULT_FIRESTORE_URL),
        )
        .arg(
            Arg::new(ARG_SESSION_FILE)
                .long(ARG_SESSION_FILE)
                .help("Keep the signed-in session in this file across runs")
                .env("GLY_SESSION_FILE")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
}
