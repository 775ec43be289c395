//! Splash screen timer.
//!
//! The timer task races the delay against a cancellation token. Tearing the
//! splash down (explicitly or by dropping it) before the delay elapses means
//! the task exits without navigating.

use crate::gly::{navigator::Screen, ui::UiHandle};
use std::time::Duration;
use tokio::{task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const SPLASH_DELAY: Duration = Duration::from_millis(1500);

#[derive(Debug)]
pub struct Splash {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Splash {
    /// Show the splash and schedule the move to the login screen.
    #[must_use]
    pub fn start(delay: Duration, ui: UiHandle) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    debug!("splash torn down before the timer elapsed");
                }
                () = sleep(delay) => {
                    if !token.is_cancelled() {
                        ui.navigate(Screen::Login);
                    }
                }
            }
        });

        Self { cancel, task }
    }

    /// Cancel the pending transition. Safe to call more than once.
    pub fn teardown(&self) {
        self.cancel.cancel();
    }

    /// Wait for the timer task to finish (navigated or torn down).
    pub async fn wait(&mut self) {
        if let Err(err) = (&mut self.task).await {
            debug!("splash timer task ended abnormally: {err}");
        }
    }
}

impl Drop for Splash {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
