//! Session gate: lets a verified, already signed-in user skip the login form.

use crate::gly::{service::IdentityService, session::Session};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct SessionGate {
    service: Arc<dyn IdentityService>,
}

impl SessionGate {
    #[must_use]
    pub fn new(service: Arc<dyn IdentityService>) -> Self {
        Self { service }
    }

    /// Return the current session if it exists and its email is verified.
    ///
    /// The session is reloaded first so a link followed since the last run is
    /// picked up; if the reload fails the locally cached copy is used.
    /// Absence of a session is a normal outcome.
    pub async fn check_active_session(&self) -> Option<Session> {
        let Some(cached) = self.service.current_session() else {
            debug!("no current session");
            return None;
        };

        let session = match self.service.reload_session(&cached).await {
            Ok(fresh) => fresh,
            Err(err) => {
                warn!("could not refresh session, using cached copy: {err}");
                cached
            }
        };

        if session.email_verified {
            Some(session)
        } else {
            debug!(uid = %session.user_id, "current session is not verified");
            None
        }
    }
}
