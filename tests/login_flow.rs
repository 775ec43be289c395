mod common;

use common::{drain, password, tap_signal, Call, ScriptedService};
use gly::gly::{
    service::{IdentityService, ServiceError},
    ui::{self, Signal},
    validate::{Field, ValidationError},
    LoginScreen, Outcome, Screen,
};
use std::{sync::Arc, time::Duration};

const EMAIL: &str = "user@example.com";

fn screen_with_tap() -> (
    Arc<ScriptedService>,
    LoginScreen,
    tokio::sync::mpsc::UnboundedReceiver<Signal>,
) {
    let (ui, rx) = ui::channel();
    let service = Arc::new(ScriptedService::new().with_tap(ui.clone()));
    let screen = LoginScreen::new(service.clone(), ui);
    (service, screen, rx)
}

fn screen() -> (
    Arc<ScriptedService>,
    LoginScreen,
    tokio::sync::mpsc::UnboundedReceiver<Signal>,
) {
    let (ui, rx) = ui::channel();
    let service = Arc::new(ScriptedService::new());
    let screen = LoginScreen::new(service.clone(), ui);
    (service, screen, rx)
}

async fn wait_until_busy(screen: &LoginScreen) {
    for _ in 0..1_000 {
        if screen.is_busy() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("request never started");
}

#[tokio::test]
async fn sign_up_sends_verification_then_signs_out() {
    let (service, screen, mut rx) = screen_with_tap();

    let outcome = screen.sign_up(" user@example.com ", "abc123").await;
    assert!(matches!(outcome, Outcome::CheckYourEmail(ref email) if email == EMAIL));

    assert_eq!(
        drain(&mut rx),
        vec![
            Signal::SetFormEnabled(false),
            tap_signal(Call::CreateAccount),
            tap_signal(Call::SendVerification),
            tap_signal(Call::SignOut),
            Signal::SetFormEnabled(true),
            Signal::ShowStatus(format!("Check your email: {EMAIL}")),
        ]
    );
    assert!(service.current_session().is_none());
    assert_eq!(service.inner().outbox().len(), 1);
}

#[tokio::test]
async fn sign_up_never_navigates_or_writes_profiles() {
    let (service, screen, mut rx) = screen();

    screen.sign_up(EMAIL, "abc123").await;
    screen.profiles().settle().await;

    assert_eq!(service.count(Call::UpsertDocument), 0);
    assert!(!drain(&mut rx)
        .iter()
        .any(|signal| matches!(signal, Signal::NavigateTo(_))));
}

#[tokio::test]
async fn malformed_email_is_rejected_without_a_request() {
    let (service, screen, mut rx) = screen();

    for email in ["", "   ", "not-an-email", "a@b", "@example.com", "user@@example.com"] {
        let outcome = screen.sign_in(email, "abc123").await;
        assert!(
            matches!(outcome, Outcome::Invalid(ValidationError::InvalidEmail)),
            "{email:?} -> {outcome:?}"
        );
        let outcome = screen.sign_up(email, "abc123").await;
        assert!(matches!(outcome, Outcome::Invalid(ValidationError::InvalidEmail)));
    }

    assert!(service.calls().is_empty());
    assert!(drain(&mut rx).iter().all(|signal| *signal
        == Signal::FieldError(Field::Email, "Enter a valid email".to_string())));
}

#[tokio::test]
async fn short_passwords_are_rejected_on_sign_up_only() {
    let (service, screen, mut rx) = screen();

    for password in ["", "a", "abcde", "     "] {
        let outcome = screen.sign_up(EMAIL, password).await;
        assert!(
            matches!(outcome, Outcome::Invalid(ValidationError::WeakPassword)),
            "{password:?} -> {outcome:?}"
        );
    }
    assert!(service.calls().is_empty());
    assert!(drain(&mut rx)
        .iter()
        .all(|signal| matches!(signal, Signal::FieldError(Field::Password, _))));

    let outcome = screen.sign_in(EMAIL, "").await;
    assert!(matches!(
        outcome,
        Outcome::Invalid(ValidationError::MissingPassword)
    ));
    assert!(service.calls().is_empty());

    // Short but non-empty passwords are the backend's call on sign-in.
    let outcome = screen.sign_in(EMAIL, "abc").await;
    assert!(matches!(outcome, Outcome::SignInFailed(_)));
    assert_eq!(service.calls(), vec![Call::Authenticate]);
}

#[tokio::test]
async fn unverified_sign_in_is_signed_out_before_the_form_returns() -> Result<(), ServiceError> {
    let (service, screen, mut rx) = screen_with_tap();
    service.inner().create_account(EMAIL, &password("abc123")).await?;

    let outcome = screen.sign_in(EMAIL, "abc123").await;
    screen.profiles().settle().await;

    assert!(matches!(outcome, Outcome::EmailNotVerified));
    assert_eq!(
        drain(&mut rx),
        vec![
            Signal::SetFormEnabled(false),
            tap_signal(Call::Authenticate),
            tap_signal(Call::SignOut),
            Signal::ShowStatus("Please verify your email first.".to_string()),
            Signal::SetFormEnabled(true),
        ]
    );
    assert_eq!(service.count(Call::UpsertDocument), 0);
    assert!(service.current_session().is_none());
    Ok(())
}

#[tokio::test]
async fn verified_sign_in_writes_one_profile_and_navigates() -> Result<(), ServiceError> {
    let (service, screen, mut rx) = screen();
    let created = service.inner().create_account(EMAIL, &password("abc123")).await?;
    service.inner().mark_verified(EMAIL);

    let outcome = screen.sign_in(EMAIL, "abc123").await;
    screen.profiles().settle().await;

    let Outcome::SignedIn(session) = outcome else {
        panic!("expected sign-in, got {outcome:?}");
    };
    assert!(session.email_verified);
    assert_eq!(session.user_id, created.user_id);
    assert_eq!(service.count(Call::UpsertDocument), 1);

    let document = service.inner().document("users", &created.user_id);
    assert!(document.is_some_and(|doc| doc.len() == 3));

    assert_eq!(
        drain(&mut rx),
        vec![
            Signal::SetFormEnabled(false),
            Signal::ShowStatus(format!("Signed in as: {EMAIL}")),
            Signal::NavigateTo(Screen::Content),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn failed_profile_write_does_not_block_navigation() -> Result<(), ServiceError> {
    let (service, screen, mut rx) = screen();
    service.inner().create_account(EMAIL, &password("abc123")).await?;
    service.inner().mark_verified(EMAIL);
    service.fail_next(
        Call::UpsertDocument,
        ServiceError::Network("connection reset".to_string()),
    );

    let outcome = screen.sign_in(EMAIL, "abc123").await;
    screen.profiles().settle().await;

    assert!(matches!(outcome, Outcome::SignedIn(_)));
    assert_eq!(service.count(Call::UpsertDocument), 1);
    assert_eq!(service.inner().document_count(), 0);

    let signals = drain(&mut rx);
    assert!(signals.contains(&Signal::NavigateTo(Screen::Content)));
    assert!(!signals
        .iter()
        .any(|signal| matches!(signal, Signal::ShowError(_))));
    Ok(())
}

#[tokio::test]
async fn wrong_password_reports_the_backend_reason() -> Result<(), ServiceError> {
    let (service, screen, mut rx) = screen();
    service.inner().create_account(EMAIL, &password("abc123")).await?;

    let outcome = screen.sign_in(EMAIL, "nope-nope").await;

    assert!(matches!(outcome, Outcome::SignInFailed(_)));
    assert_eq!(
        drain(&mut rx),
        vec![
            Signal::SetFormEnabled(false),
            Signal::ShowError(
                "Login failed: The supplied credentials are incorrect or have expired."
                    .to_string()
            ),
            Signal::SetFormEnabled(true),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn duplicate_sign_up_is_reported_without_sending_mail() -> Result<(), ServiceError> {
    let (service, screen, mut rx) = screen();
    service.inner().create_account(EMAIL, &password("abc123")).await?;

    let outcome = screen.sign_up(EMAIL, "abc123").await;

    assert!(matches!(outcome, Outcome::SignUpFailed(_)));
    assert_eq!(service.calls(), vec![Call::CreateAccount]);
    assert!(service.inner().outbox().is_empty());
    assert_eq!(
        drain(&mut rx),
        vec![
            Signal::SetFormEnabled(false),
            Signal::ShowError(
                "Sign-up failed: The email address is already in use by another account."
                    .to_string()
            ),
            Signal::SetFormEnabled(true),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn verification_failure_after_sign_up_still_signs_out() {
    let (service, screen, mut rx) = screen();
    service.fail_next(
        Call::SendVerification,
        ServiceError::Network("timed out".to_string()),
    );

    let outcome = screen.sign_up(EMAIL, "abc123").await;

    assert!(matches!(outcome, Outcome::VerificationFailed(_)));
    assert_eq!(
        service.calls(),
        vec![Call::CreateAccount, Call::SendVerification, Call::SignOut]
    );
    assert!(service.current_session().is_none());
    assert_eq!(
        drain(&mut rx),
        vec![
            Signal::SetFormEnabled(false),
            Signal::SetFormEnabled(true),
            Signal::ShowError(
                "Verification email failed: A network error has occurred: timed out".to_string()
            ),
        ]
    );
}

#[tokio::test]
async fn resend_without_a_session_makes_no_request() {
    let (service, screen, mut rx) = screen();

    let outcome = screen.resend_verification().await;

    assert!(matches!(outcome, Outcome::NoUnverifiedUser));
    assert!(service.calls().is_empty());
    assert_eq!(
        drain(&mut rx),
        vec![Signal::ShowStatus("No unverified user.".to_string())]
    );
}

#[tokio::test]
async fn resend_after_sign_up_finds_no_unverified_user() {
    let (service, screen, _rx) = screen();

    screen.sign_up(EMAIL, "abc123").await;
    let outcome = screen.resend_verification().await;

    assert!(matches!(outcome, Outcome::NoUnverifiedUser));
    assert_eq!(service.count(Call::SendVerification), 1);
}

#[tokio::test]
async fn resend_ignores_verified_sessions() -> Result<(), ServiceError> {
    let (service, screen, _rx) = screen();
    service.inner().create_account(EMAIL, &password("abc123")).await?;
    service.inner().mark_verified(EMAIL);

    let outcome = screen.resend_verification().await;

    assert!(matches!(outcome, Outcome::NoUnverifiedUser));
    assert!(service.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn resend_mails_the_unverified_current_user() -> Result<(), ServiceError> {
    let (service, screen, mut rx) = screen();
    service.inner().create_account(EMAIL, &password("abc123")).await?;

    let outcome = screen.resend_verification().await;

    assert!(matches!(outcome, Outcome::VerificationSent(ref email) if email == EMAIL));
    assert_eq!(service.calls(), vec![Call::SendVerification]);
    assert_eq!(
        drain(&mut rx),
        vec![
            Signal::SetFormEnabled(false),
            Signal::ShowStatus(format!("Verification sent to {EMAIL}")),
            Signal::SetFormEnabled(true),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn resend_failure_is_shown() -> Result<(), ServiceError> {
    let (service, screen, mut rx) = screen();
    service.inner().create_account(EMAIL, &password("abc123")).await?;
    service.fail_next(
        Call::SendVerification,
        ServiceError::rejected("TOO_MANY_ATTEMPTS_TRY_LATER"),
    );

    let outcome = screen.resend_verification().await;

    assert!(matches!(outcome, Outcome::ResendFailed(_)));
    let signals = drain(&mut rx);
    assert!(signals.iter().any(|signal| matches!(
        signal,
        Signal::ShowError(message) if message.starts_with("Could not resend email: ")
    )));
    assert_eq!(signals.last(), Some(&Signal::SetFormEnabled(true)));
    Ok(())
}

#[tokio::test]
async fn reset_requires_a_valid_email() {
    let (service, screen, mut rx) = screen();

    let outcome = screen.reset_password("nobody").await;

    assert!(matches!(
        outcome,
        Outcome::Invalid(ValidationError::InvalidEmail)
    ));
    assert!(service.calls().is_empty());
    assert_eq!(
        drain(&mut rx),
        vec![Signal::FieldError(
            Field::Email,
            "Enter your registered email".to_string()
        )]
    );
}

#[tokio::test]
async fn reset_sends_a_link_to_known_accounts() -> Result<(), ServiceError> {
    let (service, screen, mut rx) = screen();
    service.inner().create_account(EMAIL, &password("abc123")).await?;

    let outcome = screen.reset_password(" user@example.com").await;

    assert!(matches!(outcome, Outcome::ResetSent(ref email) if email == EMAIL));
    assert_eq!(
        drain(&mut rx),
        vec![
            Signal::SetFormEnabled(false),
            Signal::ShowStatus(format!("Reset link sent to {EMAIL}")),
            Signal::SetFormEnabled(true),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn reset_for_unknown_accounts_fails() {
    let (_service, screen, mut rx) = screen();

    let outcome = screen.reset_password(EMAIL).await;

    assert!(matches!(outcome, Outcome::ResetFailed(_)));
    assert!(drain(&mut rx).contains(&Signal::ShowError(
        "Reset failed: There is no user record corresponding to this email.".to_string()
    )));
}

#[tokio::test]
async fn entry_skips_the_form_for_verified_sessions() -> Result<(), ServiceError> {
    let (service, screen, mut rx) = screen();
    service.inner().create_account(EMAIL, &password("abc123")).await?;
    service.inner().mark_verified(EMAIL);

    let session = screen.enter().await;

    assert!(session.is_some_and(|s| s.email_verified));
    assert_eq!(service.calls(), vec![Call::Reload]);
    assert_eq!(
        drain(&mut rx),
        vec![
            Signal::ShowStatus(format!("Signed in as: {EMAIL}")),
            Signal::NavigateTo(Screen::Content),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn entry_uses_cached_session_when_reload_fails() -> Result<(), ServiceError> {
    let (service, screen, _rx) = screen();
    service.inner().create_account(EMAIL, &password("abc123")).await?;
    service.inner().mark_verified(EMAIL);
    service.fail_next(Call::Reload, ServiceError::Network("offline".to_string()));

    assert!(screen.enter().await.is_some());
    Ok(())
}

#[tokio::test]
async fn entry_keeps_unverified_users_on_the_form() -> Result<(), ServiceError> {
    let (service, screen, mut rx) = screen();
    service.inner().create_account(EMAIL, &password("abc123")).await?;

    assert!(screen.enter().await.is_none());
    assert!(drain(&mut rx).is_empty());
    Ok(())
}

#[tokio::test]
async fn second_request_while_one_is_in_flight_is_busy() -> Result<(), ServiceError> {
    let (ui, mut rx) = ui::channel();
    let service = Arc::new(ScriptedService::new());
    service.inner().create_account(EMAIL, &password("abc123")).await?;
    service.inner().mark_verified(EMAIL);
    let screen = Arc::new(LoginScreen::new(service.clone(), ui));

    service.hold_requests();
    let first = tokio::spawn({
        let screen = Arc::clone(&screen);
        async move { screen.sign_in(EMAIL, "abc123").await }
    });
    wait_until_busy(&screen).await;

    let second = screen.sign_up("other@example.com", "abc123").await;
    assert!(matches!(second, Outcome::Busy));

    service.release();
    let first = first.await.map_err(|e| ServiceError::Protocol(e.to_string()))?;
    assert!(matches!(first, Outcome::SignedIn(_)));
    assert!(!screen.is_busy());

    assert_eq!(service.count(Call::Authenticate), 1);
    assert_eq!(service.count(Call::CreateAccount), 0);
    let disables = drain(&mut rx)
        .into_iter()
        .filter(|signal| *signal == Signal::SetFormEnabled(false))
        .count();
    assert_eq!(disables, 1);
    Ok(())
}

#[tokio::test]
async fn teardown_drops_in_flight_results() -> Result<(), ServiceError> {
    let (ui, mut rx) = ui::channel();
    let service = Arc::new(ScriptedService::new());
    service.inner().create_account(EMAIL, &password("abc123")).await?;
    service.inner().mark_verified(EMAIL);
    let screen = Arc::new(LoginScreen::new(service.clone(), ui));

    service.hold_requests();
    let pending = tokio::spawn({
        let screen = Arc::clone(&screen);
        async move { screen.sign_in(EMAIL, "abc123").await }
    });
    wait_until_busy(&screen).await;

    screen.teardown();
    let outcome = tokio::time::timeout(Duration::from_secs(5), pending)
        .await
        .map_err(|e| ServiceError::Protocol(e.to_string()))?
        .map_err(|e| ServiceError::Protocol(e.to_string()))?;
    service.release();

    assert!(matches!(outcome, Outcome::Cancelled));
    assert_eq!(drain(&mut rx), vec![Signal::SetFormEnabled(false)]);
    screen.profiles().settle().await;
    assert_eq!(service.count(Call::UpsertDocument), 0);
    Ok(())
}

#[tokio::test]
async fn torn_down_screen_sends_nothing() {
    let (service, screen, mut rx) = screen();
    screen.teardown();

    let outcome = screen.sign_up(EMAIL, "abc123").await;

    assert!(matches!(outcome, Outcome::Cancelled));
    assert!(service.calls().is_empty());
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn torn_down_screen_skips_validation_and_preconditions() {
    let (service, screen, mut rx) = screen();
    screen.teardown();

    assert!(matches!(
        screen.resend_verification().await,
        Outcome::Cancelled
    ));
    assert!(matches!(
        screen.sign_in("bad-email", "x").await,
        Outcome::Cancelled
    ));
    assert!(matches!(screen.sign_up("", "").await, Outcome::Cancelled));
    assert!(matches!(
        screen.reset_password("nope").await,
        Outcome::Cancelled
    ));

    assert!(service.calls().is_empty());
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn torn_down_screen_does_not_resend_to_unverified_user() -> Result<(), ServiceError> {
    let (service, screen, mut rx) = screen();
    service.inner().create_account(EMAIL, &password("abc123")).await?;
    screen.teardown();

    let outcome = screen.resend_verification().await;

    assert!(matches!(outcome, Outcome::Cancelled));
    assert!(service.calls().is_empty());
    assert!(service.inner().outbox().is_empty());
    assert!(drain(&mut rx).is_empty());
    Ok(())
}
