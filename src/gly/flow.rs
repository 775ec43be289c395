//! Login screen flows: sign-up, sign-in, resend verification, password reset.
//!
//! Every flow validates locally first, then makes at most one backend request
//! at a time per screen and reports the result twice: as UI [`Signal`]s for
//! the shell and as an [`Outcome`] for the caller.
//!
//! Verification gating lives here. The backend happily signs in unverified
//! accounts and only reports the flag, so no status, profile write or
//! navigation to content happens unless `email_verified` is true. Unverified
//! sessions are signed out before the form comes back.
//!
//! [`Signal`]: crate::gly::ui::Signal

use crate::gly::{
    gate::SessionGate,
    navigator::Screen,
    profile::ProfileSync,
    service::IdentityService,
    session::Session,
    ui::UiHandle,
    validate::{self, FormMode, ValidationError},
};
use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

#[derive(Debug, Clone)]
pub enum Outcome {
    /// Local validation failed; nothing was sent.
    Invalid(ValidationError),
    /// Another request from this screen is still in flight.
    Busy,
    /// The screen was torn down while the request was in flight.
    Cancelled,
    SignedIn(Session),
    CheckYourEmail(String),
    VerificationFailed(String),
    SignUpFailed(String),
    SignInFailed(String),
    EmailNotVerified,
    VerificationSent(String),
    ResendFailed(String),
    NoUnverifiedUser,
    ResetSent(String),
    ResetFailed(String),
}

impl Outcome {
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::VerificationFailed(_)
                | Self::SignUpFailed(_)
                | Self::SignInFailed(_)
                | Self::ResendFailed(_)
                | Self::ResetFailed(_)
        )
    }
}

/// Clears the in-flight flag when the request ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct LoginScreen {
    service: Arc<dyn IdentityService>,
    gate: SessionGate,
    profiles: ProfileSync,
    ui: UiHandle,
    in_flight: AtomicBool,
    cancel: CancellationToken,
}

impl LoginScreen {
    #[must_use]
    pub fn new(service: Arc<dyn IdentityService>, ui: UiHandle) -> Self {
        Self {
            gate: SessionGate::new(Arc::clone(&service)),
            profiles: ProfileSync::new(Arc::clone(&service)),
            service,
            ui,
            in_flight: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    /// Destroy the screen: in-flight requests stop reporting.
    pub fn teardown(&self) {
        self.cancel.cancel();
    }

    /// A torn-down screen takes no further actions and sends no signals.
    fn is_torn_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn profiles(&self) -> &ProfileSync {
        &self.profiles
    }

    /// Screen entry: skip the form when a verified session already exists.
    pub async fn enter(&self) -> Option<Session> {
        let session = self.guarded(self.gate.check_active_session()).await??;
        info!(uid = %session.user_id, "restored verified session");
        self.show_content(&session);
        Some(session)
    }

    #[instrument(skip_all)]
    pub async fn sign_up(&self, email: &str, password: &str) -> Outcome {
        if self.is_torn_down() {
            return Outcome::Cancelled;
        }
        let credentials = match validate::validate(email, password, FormMode::SignUp) {
            Ok(credentials) => credentials,
            Err(err) => return self.invalid(err),
        };
        let _request = match self.begin() {
            Ok(request) => request,
            Err(outcome) => return outcome,
        };

        let result = self
            .guarded(
                self.service
                    .create_account(&credentials.email, &credentials.password),
            )
            .await;

        match result {
            None => Outcome::Cancelled,
            Some(Ok(session)) => {
                info!(uid = %session.user_id, "account created");
                self.send_initial_verification(session).await
            }
            Some(Err(err)) => {
                error!("sign-up failed: {err}");
                self.ui.show_error(format!("Sign-up failed: {err}"));
                self.ui.set_form_enabled(true);
                Outcome::SignUpFailed(err.to_string())
            }
        }
    }

    #[instrument(skip_all)]
    pub async fn sign_in(&self, email: &str, password: &str) -> Outcome {
        if self.is_torn_down() {
            return Outcome::Cancelled;
        }
        let credentials = match validate::validate(email, password, FormMode::SignIn) {
            Ok(credentials) => credentials,
            Err(err) => return self.invalid(err),
        };
        let _request = match self.begin() {
            Ok(request) => request,
            Err(outcome) => return outcome,
        };

        let result = self
            .guarded(
                self.service
                    .authenticate(&credentials.email, &credentials.password),
            )
            .await;

        match result {
            None => Outcome::Cancelled,
            Some(Ok(session)) if session.email_verified => {
                info!(uid = %session.user_id, "signed in");
                self.profiles.spawn(&session);
                self.show_content(&session);
                Outcome::SignedIn(session)
            }
            Some(Ok(session)) => {
                debug!(uid = %session.user_id, "sign-in with unverified email");
                self.service.sign_out(&session).await;
                self.ui.show_status("Please verify your email first.");
                self.ui.set_form_enabled(true);
                Outcome::EmailNotVerified
            }
            Some(Err(err)) => {
                error!("sign-in failed: {err}");
                self.ui.show_error(format!("Login failed: {err}"));
                self.ui.set_form_enabled(true);
                Outcome::SignInFailed(err.to_string())
            }
        }
    }

    #[instrument(skip_all)]
    pub async fn resend_verification(&self) -> Outcome {
        if self.is_torn_down() {
            return Outcome::Cancelled;
        }
        let Some(session) = self
            .service
            .current_session()
            .filter(|session| !session.email_verified)
        else {
            self.ui.show_status("No unverified user.");
            return Outcome::NoUnverifiedUser;
        };
        let _request = match self.begin() {
            Ok(request) => request,
            Err(outcome) => return outcome,
        };

        let result = self
            .guarded(self.service.send_verification_email(&session))
            .await;

        let outcome = match result {
            None => return Outcome::Cancelled,
            Some(Ok(())) => {
                self.ui
                    .show_status(format!("Verification sent to {}", session.email));
                Outcome::VerificationSent(session.email)
            }
            Some(Err(err)) => {
                error!("could not resend verification email: {err}");
                self.ui.show_error(format!("Could not resend email: {err}"));
                Outcome::ResendFailed(err.to_string())
            }
        };
        self.ui.set_form_enabled(true);
        outcome
    }

    #[instrument(skip_all)]
    pub async fn reset_password(&self, email: &str) -> Outcome {
        if self.is_torn_down() {
            return Outcome::Cancelled;
        }
        let email = match validate::validate_email(email) {
            Ok(email) => email,
            Err(err) => {
                self.ui
                    .field_error(err.field(), "Enter your registered email");
                return Outcome::Invalid(err);
            }
        };
        let _request = match self.begin() {
            Ok(request) => request,
            Err(outcome) => return outcome,
        };

        let result = self.guarded(self.service.send_password_reset(&email)).await;

        let outcome = match result {
            None => return Outcome::Cancelled,
            Some(Ok(())) => {
                self.ui.show_status(format!("Reset link sent to {email}"));
                Outcome::ResetSent(email)
            }
            Some(Err(err)) => {
                error!("password reset failed: {err}");
                self.ui.show_error(format!("Reset failed: {err}"));
                Outcome::ResetFailed(err.to_string())
            }
        };
        self.ui.set_form_enabled(true);
        outcome
    }

    /// After sign-up: ask for the verification mail, then always sign the new
    /// (unverified) account out so it is not left signed in locally.
    async fn send_initial_verification(&self, session: Session) -> Outcome {
        let result = self
            .guarded(self.service.send_verification_email(&session))
            .await;

        self.service.sign_out(&session).await;

        let outcome = match result {
            None => return Outcome::Cancelled,
            Some(Ok(())) => Outcome::CheckYourEmail(session.email.clone()),
            Some(Err(err)) => {
                error!("verification email failed: {err}");
                Outcome::VerificationFailed(err.to_string())
            }
        };

        self.ui.set_form_enabled(true);
        match &outcome {
            Outcome::CheckYourEmail(email) => {
                self.ui.show_status(format!("Check your email: {email}"));
            }
            Outcome::VerificationFailed(reason) => {
                self.ui
                    .show_error(format!("Verification email failed: {reason}"));
            }
            _ => {}
        }
        outcome
    }

    fn show_content(&self, session: &Session) {
        if !session.email_verified {
            return;
        }
        self.ui.show_status(format!("Signed in as: {}", session.email));
        self.ui.navigate(Screen::Content);
    }

    fn invalid(&self, err: ValidationError) -> Outcome {
        self.ui.field_error(err.field(), err.to_string());
        Outcome::Invalid(err)
    }

    /// Claim the screen's single request slot and disable the form.
    fn begin(&self) -> Result<InFlight<'_>, Outcome> {
        if self.is_torn_down() {
            return Err(Outcome::Cancelled);
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("request already in flight");
            return Err(Outcome::Busy);
        }
        self.ui.set_form_enabled(false);
        Ok(InFlight(&self.in_flight))
    }

    /// Run `request` unless the screen is torn down first.
    async fn guarded<T>(&self, request: impl Future<Output = T>) -> Option<T> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                debug!("screen torn down, dropping request");
                None
            }
            value = request => Some(value),
        }
    }
}

impl Drop for LoginScreen {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
