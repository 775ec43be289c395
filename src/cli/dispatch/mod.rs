use crate::{
    cli::{
        actions::{
            app::{Args, Backend},
            Action,
        },
        commands::{identity, ARG_SPLASH_MS},
    },
    gly::{service::RestConfig, splash::SPLASH_DELAY},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{path::PathBuf, time::Duration};
use url::Url;

/// # Errors
/// Returns an error if required arguments are missing or a base URL is invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let splash_delay = matches
        .get_one::<u64>(ARG_SPLASH_MS)
        .copied()
        .map_or(SPLASH_DELAY, Duration::from_millis);

    let backend = if matches.get_flag(identity::ARG_OFFLINE) {
        Backend::Offline
    } else {
        Backend::Rest(rest_config(matches)?)
    };

    Ok(Action::App(Args {
        backend,
        splash_delay,
    }))
}

fn rest_config(matches: &clap::ArgMatches) -> Result<RestConfig> {
    let api_key = matches
        .get_one::<String>(identity::ARG_API_KEY)
        .cloned()
        .context("missing required argument: --api-key")?;
    let project_id = matches
        .get_one::<String>(identity::ARG_PROJECT_ID)
        .cloned()
        .context("missing required argument: --project-id")?;

    let auth_url = base_url(matches, identity::ARG_AUTH_URL)?;
    let token_url = base_url(matches, identity::ARG_TOKEN_URL)?;
    let firestore_url = base_url(matches, identity::ARG_FIRESTORE_URL)?;
    let session_file = matches
        .get_one::<PathBuf>(identity::ARG_SESSION_FILE)
        .cloned();

    Ok(RestConfig::new(SecretString::from(api_key), project_id)
        .with_auth_url(auth_url)
        .with_token_url(token_url)
        .with_firestore_url(firestore_url)
        .with_session_file(session_file))
}

fn base_url(matches: &clap::ArgMatches, arg: &str) -> Result<String> {
    let value = matches
        .get_one::<String>(arg)
        .cloned()
        .with_context(|| format!("missing required argument: --{arg}"))?;
    let url = Url::parse(&value).with_context(|| format!("invalid --{arg}: {value}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("invalid --{arg}: expected an http(s) URL, got {value}");
    }
    Ok(value)
}
