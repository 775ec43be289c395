//! Best-effort `users/{uid}` record written after a verified sign-in.
//!
//! Writes run as detached tasks: navigation never waits for them, and a
//! failure is logged, never shown. [`ProfileSync::settle`] waits for writes
//! still in flight, e.g. before the process exits.

use crate::gly::{
    service::{Document, FieldValue, IdentityService},
    session::Session,
};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info_span, warn, Instrument};

pub const USERS_COLLECTION: &str = "users";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub joined_at: DateTime<Utc>,
}

impl UserProfile {
    #[must_use]
    pub fn from_session(session: &Session, joined_at: DateTime<Utc>) -> Self {
        Self {
            uid: session.user_id.clone(),
            email: session.email.clone(),
            joined_at,
        }
    }

    /// Stored shape: `{uid, email, joinedAt}` with `joinedAt` in epoch millis.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut document = Document::new();
        document.insert("uid".to_string(), FieldValue::String(self.uid.clone()));
        document.insert("email".to_string(), FieldValue::String(self.email.clone()));
        document.insert(
            "joinedAt".to_string(),
            FieldValue::Integer(self.joined_at.timestamp_millis()),
        );
        document
    }
}

pub struct ProfileSync {
    service: Arc<dyn IdentityService>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl ProfileSync {
    #[must_use]
    pub fn new(service: Arc<dyn IdentityService>) -> Self {
        Self {
            service,
            pending: Mutex::new(Vec::new()),
        }
    }

    fn pending(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start an upsert of the profile for `session`. Unverified sessions are
    /// refused; returns whether a write was started.
    pub fn spawn(&self, session: &Session) -> bool {
        if !session.email_verified {
            warn!(uid = %session.user_id, "refusing profile write for unverified session");
            return false;
        }

        let profile = UserProfile::from_session(session, Utc::now());
        let service = Arc::clone(&self.service);
        let session = session.clone();
        let span = info_span!("profile.upsert", uid = %profile.uid);

        let handle = tokio::spawn(
            async move {
                match service
                    .upsert_document(
                        &session,
                        USERS_COLLECTION,
                        &profile.uid,
                        &profile.to_document(),
                    )
                    .await
                {
                    Ok(()) => debug!("profile stored"),
                    Err(err) => warn!("profile write failed: {err}"),
                }
            }
            .instrument(span),
        );

        let mut pending = self.pending();
        pending.retain(|handle| !handle.is_finished());
        pending.push(handle);
        true
    }

    /// Wait for every write started so far.
    pub async fn settle(&self) {
        let handles = std::mem::take(&mut *self.pending());
        for handle in handles {
            if let Err(err) = handle.await {
                warn!("profile write task ended abnormally: {err}");
            }
        }
    }
}
