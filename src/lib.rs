//! # Gly (sign-in client)
//!
//! `gly` drives the two entry screens of the app: a splash screen that waits
//! briefly, and a login screen that signs users up and in against a managed
//! identity backend.
//!
//! Password storage, token issuance, email delivery and document storage all
//! live in the backend. This crate owns the orchestration around it:
//!
//! - syntactic validation of credentials before any request is sent,
//! - the sign-up, sign-in, resend-verification and password-reset flows,
//! - verification gating: authenticated content is only reachable with a
//!   session whose email is verified,
//! - a best-effort profile write (`users/{uid}`) after a verified sign-in,
//! - restoring a verified session on start.
//!
//! The UI shell talks to the flows through [`gly::ui::Signal`] values sent over
//! a channel, so any front end (the bundled terminal shell, a test harness) can
//! render them.

pub mod cli;
pub mod gly;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
