//! On-disk copy of the signed-in session so a restart can skip the login form.
//!
//! The file holds bearer material; it is written owner-only on unix.

use super::ServiceError;
use crate::gly::session::{Session, SessionTokens};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    user_id: String,
    email: String,
    email_verified: bool,
    id_token: String,
    refresh_token: String,
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// # Errors
    /// Returns `Storage` if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<Option<Session>, ServiceError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(storage_error(&self.path, &err)),
        };

        let stored: StoredSession =
            serde_json::from_str(&raw).map_err(|err| storage_error(&self.path, &err))?;

        debug!(path = %self.path.display(), "loaded stored session");

        Ok(Some(
            Session::new(stored.user_id, stored.email, stored.email_verified)
                .with_tokens(SessionTokens::new(stored.id_token, stored.refresh_token)),
        ))
    }

    /// Persist a session. Sessions without tokens cannot be restored and are skipped.
    ///
    /// # Errors
    /// Returns `Storage` if the file cannot be written.
    pub fn save(&self, session: &Session) -> Result<(), ServiceError> {
        let Some(tokens) = &session.tokens else {
            debug!("session has no tokens, not persisting");
            return Ok(());
        };

        let stored = StoredSession {
            user_id: session.user_id.clone(),
            email: session.email.clone(),
            email_verified: session.email_verified,
            id_token: tokens.id_token.expose_secret().to_string(),
            refresh_token: tokens.refresh_token.expose_secret().to_string(),
        };
        let body = serde_json::to_vec(&stored).map_err(|err| storage_error(&self.path, &err))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| storage_error(parent, &err))?;
        }

        let mut file = open_private(&self.path).map_err(|err| storage_error(&self.path, &err))?;
        file.write_all(&body)
            .map_err(|err| storage_error(&self.path, &err))?;

        Ok(())
    }

    /// # Errors
    /// Returns `Storage` if the file exists and cannot be removed.
    pub fn clear(&self) -> Result<(), ServiceError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(storage_error(&self.path, &err)),
        }
    }
}

fn storage_error(path: &Path, err: &dyn std::fmt::Display) -> ServiceError {
    ServiceError::Storage(format!("{}: {err}", path.display()))
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}
