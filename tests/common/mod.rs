#![allow(dead_code, clippy::unwrap_used)]

use async_trait::async_trait;
use gly::gly::{
    service::{Document, IdentityService, MemoryIdentityService, ServiceError},
    session::Session,
    ui::{Signal, UiHandle},
};
use secrecy::SecretString;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tokio::sync::{mpsc::UnboundedReceiver, Semaphore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    CreateAccount,
    Authenticate,
    SendVerification,
    SendPasswordReset,
    SignOut,
    Reload,
    UpsertDocument,
}

/// Wraps the in-memory backend to record requests, inject one-shot failures,
/// hold requests until released, and optionally mirror each request into the
/// UI signal stream so tests can check ordering against UI updates.
#[derive(Default)]
pub struct ScriptedService {
    inner: MemoryIdentityService,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashMap<Call, ServiceError>>,
    hold: Mutex<Option<Arc<Semaphore>>>,
    tap: Mutex<Option<UiHandle>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &MemoryIdentityService {
        &self.inner
    }

    pub fn with_tap(self, ui: UiHandle) -> Self {
        *self.tap.lock().unwrap() = Some(ui);
        self
    }

    pub fn fail_next(&self, call: Call, err: ServiceError) {
        self.failures.lock().unwrap().insert(call, err);
    }

    /// Block every request until `release` is called.
    pub fn hold_requests(&self) {
        *self.hold.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self) {
        if let Some(semaphore) = self.hold.lock().unwrap().take() {
            semaphore.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    async fn enter(&self, call: Call) -> Result<(), ServiceError> {
        self.calls.lock().unwrap().push(call);
        let tap = self.tap.lock().unwrap().clone();
        if let Some(ui) = tap {
            ui.emit(tap_signal(call));
        }

        let hold = self.hold.lock().unwrap().clone();
        if let Some(semaphore) = hold {
            let _permit = semaphore.acquire().await;
        }

        match self.failures.lock().unwrap().remove(&call) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub fn tap_signal(call: Call) -> Signal {
    Signal::ShowStatus(format!("tap:{call:?}"))
}

#[async_trait]
impl IdentityService for ScriptedService {
    async fn create_account(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session, ServiceError> {
        self.enter(Call::CreateAccount).await?;
        self.inner.create_account(email, password).await
    }

    async fn authenticate(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session, ServiceError> {
        self.enter(Call::Authenticate).await?;
        self.inner.authenticate(email, password).await
    }

    async fn send_verification_email(&self, session: &Session) -> Result<(), ServiceError> {
        self.enter(Call::SendVerification).await?;
        self.inner.send_verification_email(session).await
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), ServiceError> {
        self.enter(Call::SendPasswordReset).await?;
        self.inner.send_password_reset(email).await
    }

    async fn sign_out(&self, session: &Session) {
        // Sign-out cannot fail; an injected failure is ignored.
        let _ = self.enter(Call::SignOut).await;
        self.inner.sign_out(session).await;
    }

    fn current_session(&self) -> Option<Session> {
        self.inner.current_session()
    }

    async fn reload_session(&self, session: &Session) -> Result<Session, ServiceError> {
        self.enter(Call::Reload).await?;
        self.inner.reload_session(session).await
    }

    async fn upsert_document(
        &self,
        session: &Session,
        collection: &str,
        key: &str,
        fields: &Document,
    ) -> Result<(), ServiceError> {
        self.enter(Call::UpsertDocument).await?;
        self.inner
            .upsert_document(session, collection, key, fields)
            .await
    }
}

pub fn password(value: &str) -> SecretString {
    SecretString::from(value.to_string())
}

pub fn drain(rx: &mut UnboundedReceiver<Signal>) -> Vec<Signal> {
    let mut signals = Vec::new();
    while let Ok(signal) = rx.try_recv() {
        signals.push(signal);
    }
    signals
}
