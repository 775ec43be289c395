//! In-process identity backend.
//!
//! Backs the `--offline` mode and the test suites. Accounts, the current
//! session and stored documents live in memory and are lost on exit. Outbound
//! mail is logged and kept in an outbox instead of being delivered.

use super::{Document, IdentityService, ServiceError};
use crate::gly::session::Session;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};
use tracing::info;
use ulid::Ulid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailKind {
    Verification,
    PasswordReset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to_email: String,
    pub kind: EmailKind,
}

#[derive(Debug)]
struct Account {
    uid: String,
    password: SecretString,
    verified: bool,
}

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<String, Account>,
    current: Option<Session>,
    outbox: Vec<OutboundEmail>,
    documents: HashMap<(String, String), Document>,
}

impl State {
    fn session_for(&self, email: &str) -> Option<Session> {
        self.accounts
            .get(email)
            .map(|account| Session::new(account.uid.clone(), email, account.verified))
    }
}

#[derive(Debug, Default)]
pub struct MemoryIdentityService {
    state: Mutex<State>,
}

impl MemoryIdentityService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark an account verified, as if the user followed the emailed link.
    pub fn mark_verified(&self, email: &str) -> bool {
        let mut state = self.state();
        let Some(account) = state.accounts.get_mut(email) else {
            return false;
        };
        account.verified = true;
        info!(email, "email verified");
        true
    }

    #[must_use]
    pub fn outbox(&self) -> Vec<OutboundEmail> {
        self.state().outbox.clone()
    }

    #[must_use]
    pub fn document(&self, collection: &str, key: &str) -> Option<Document> {
        self.state()
            .documents
            .get(&(collection.to_string(), key.to_string()))
            .cloned()
    }

    #[must_use]
    pub fn document_count(&self) -> usize {
        self.state().documents.len()
    }

    fn deliver(state: &mut State, to_email: &str, kind: EmailKind) {
        info!(to_email, kind = ?kind, "email delivery stub");
        state.outbox.push(OutboundEmail {
            to_email: to_email.to_string(),
            kind,
        });
    }
}

#[async_trait]
impl IdentityService for MemoryIdentityService {
    async fn create_account(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session, ServiceError> {
        let mut state = self.state();
        if state.accounts.contains_key(email) {
            return Err(ServiceError::rejected("EMAIL_EXISTS"));
        }
        if password.expose_secret().chars().count() < 6 {
            return Err(ServiceError::rejected("WEAK_PASSWORD"));
        }

        let uid = Ulid::new().to_string();
        state.accounts.insert(
            email.to_string(),
            Account {
                uid: uid.clone(),
                password: password.clone(),
                verified: false,
            },
        );

        let session = Session::new(uid, email, false);
        state.current = Some(session.clone());
        Ok(session)
    }

    async fn authenticate(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session, ServiceError> {
        let mut state = self.state();
        let matches = state
            .accounts
            .get(email)
            .is_some_and(|account| account.password.expose_secret() == password.expose_secret());
        if !matches {
            return Err(ServiceError::rejected("INVALID_LOGIN_CREDENTIALS"));
        }

        let session = state
            .session_for(email)
            .ok_or_else(|| ServiceError::rejected("USER_NOT_FOUND"))?;
        state.current = Some(session.clone());
        Ok(session)
    }

    async fn send_verification_email(&self, session: &Session) -> Result<(), ServiceError> {
        let mut state = self.state();
        if !state.accounts.contains_key(&session.email) {
            return Err(ServiceError::rejected("USER_NOT_FOUND"));
        }
        Self::deliver(&mut state, &session.email, EmailKind::Verification);
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), ServiceError> {
        let mut state = self.state();
        if !state.accounts.contains_key(email) {
            return Err(ServiceError::rejected("EMAIL_NOT_FOUND"));
        }
        Self::deliver(&mut state, email, EmailKind::PasswordReset);
        Ok(())
    }

    async fn sign_out(&self, session: &Session) {
        let mut state = self.state();
        if state
            .current
            .as_ref()
            .is_some_and(|current| current.same_user(session))
        {
            state.current = None;
        }
    }

    fn current_session(&self) -> Option<Session> {
        let state = self.state();
        let current = state.current.as_ref()?;
        state.session_for(&current.email)
    }

    async fn reload_session(&self, session: &Session) -> Result<Session, ServiceError> {
        let mut state = self.state();
        let fresh = state
            .session_for(&session.email)
            .ok_or_else(|| ServiceError::rejected("USER_NOT_FOUND"))?;
        if state
            .current
            .as_ref()
            .is_some_and(|current| current.same_user(&fresh))
        {
            state.current = Some(fresh.clone());
        }
        Ok(fresh)
    }

    async fn upsert_document(
        &self,
        _session: &Session,
        collection: &str,
        key: &str,
        fields: &Document,
    ) -> Result<(), ServiceError> {
        self.state()
            .documents
            .insert((collection.to_string(), key.to_string()), fields.clone());
        Ok(())
    }
}
