//! Identity & data backend seam.
//!
//! Everything that needs a server (account creation, password checks, mail
//! delivery, document storage) sits behind [`IdentityService`]. The flows only
//! ever see `Session` values and `ServiceError` reasons.

pub mod memory;
pub mod rest;
pub mod store;

pub use self::memory::MemoryIdentityService;
pub use self::rest::{RestConfig, RestIdentityService};

use crate::gly::session::Session;
use async_trait::async_trait;
use secrecy::SecretString;
use std::collections::BTreeMap;
use thiserror::Error;

/// A stored field value. Only the kinds the app writes are modelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    String(String),
    Integer(i64),
}

/// Document body keyed by field name.
pub type Document = BTreeMap<String, FieldValue>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The backend refused the request; `message` is safe to show to the user.
    #[error("{message}")]
    Rejected { code: String, message: String },
    #[error("A network error has occurred: {0}")]
    Network(String),
    #[error("Unexpected response from the identity service: {0}")]
    Protocol(String),
    #[error("Session storage error: {0}")]
    Storage(String),
}

impl ServiceError {
    /// Build a rejection from a backend error code such as `EMAIL_EXISTS` or
    /// `WEAK_PASSWORD : Password should be at least 6 characters`.
    #[must_use]
    pub fn rejected(raw: &str) -> Self {
        let (code, detail) = match raw.split_once(':') {
            Some((code, detail)) => (code.trim(), Some(detail.trim())),
            None => (raw.trim(), None),
        };

        let message = describe_code(code)
            .map(str::to_string)
            .or_else(|| detail.filter(|d| !d.is_empty()).map(str::to_string))
            .unwrap_or_else(|| code.replace('_', " ").to_lowercase());

        Self::Rejected {
            code: code.to_string(),
            message,
        }
    }

    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Rejected { code, .. } => Some(code),
            _ => None,
        }
    }
}

fn describe_code(code: &str) -> Option<&'static str> {
    let message = match code {
        "EMAIL_EXISTS" => "The email address is already in use by another account.",
        "EMAIL_NOT_FOUND" => "There is no user record corresponding to this email.",
        "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            "The supplied credentials are incorrect or have expired."
        }
        "INVALID_EMAIL" => "The email address is badly formatted.",
        "USER_DISABLED" => "The user account has been disabled by an administrator.",
        "USER_NOT_FOUND" => "The user account no longer exists.",
        "WEAK_PASSWORD" => "The password must be 6 characters long or more.",
        "TOO_MANY_ATTEMPTS_TRY_LATER" => {
            "Access to this account has been temporarily disabled due to many failed \
             attempts. Try again later."
        }
        "OPERATION_NOT_ALLOWED" => "Password sign-in is disabled for this project.",
        "TOKEN_EXPIRED" | "INVALID_ID_TOKEN" | "INVALID_REFRESH_TOKEN" => {
            "The session has expired. Please sign in again."
        }
        "PERMISSION_DENIED" => "The request is missing required permissions.",
        _ => return None,
    };
    Some(message)
}

/// Operations the app needs from the identity & data backend.
///
/// Implementations own the session; callers only hold copies.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Create an email/password account and sign it in (unverified).
    async fn create_account(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session, ServiceError>;

    /// Check credentials. The session reports the current verification flag.
    async fn authenticate(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session, ServiceError>;

    async fn send_verification_email(&self, session: &Session) -> Result<(), ServiceError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), ServiceError>;

    /// Drop the local session. Never fails.
    async fn sign_out(&self, session: &Session);

    /// Locally known session, if any. Never issues a network request.
    fn current_session(&self) -> Option<Session>;

    /// Fetch a fresh copy of the session (verification flag, tokens).
    async fn reload_session(&self, session: &Session) -> Result<Session, ServiceError>;

    /// Create or overwrite `collection/key` with `fields`.
    async fn upsert_document(
        &self,
        session: &Session,
        collection: &str,
        key: &str,
        fields: &Document,
    ) -> Result<(), ServiceError>;
}
