//! Session handle issued by the identity backend.
//!
//! The app never mutates a session; it only holds the latest copy returned by
//! the backend. Token material is wrapped in `SecretString` so it stays out of
//! `Debug` output and logs.

use secrecy::SecretString;

/// Bearer and refresh tokens for backends that issue them.
#[derive(Clone, Debug)]
pub struct SessionTokens {
    pub id_token: SecretString,
    pub refresh_token: SecretString,
}

impl SessionTokens {
    #[must_use]
    pub fn new(id_token: String, refresh_token: String) -> Self {
        Self {
            id_token: SecretString::from(id_token),
            refresh_token: SecretString::from(refresh_token),
        }
    }
}

/// An authenticated identity as reported by the backend.
#[derive(Clone, Debug)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub email_verified: bool,
    pub tokens: Option<SessionTokens>,
}

impl Session {
    #[must_use]
    pub fn new(user_id: impl Into<String>, email: impl Into<String>, email_verified: bool) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            email_verified,
            tokens: None,
        }
    }

    #[must_use]
    pub fn with_tokens(mut self, tokens: SessionTokens) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Same account, regardless of verification state or token freshness.
    #[must_use]
    pub fn same_user(&self, other: &Self) -> bool {
        self.user_id == other.user_id
    }
}
