//! Signals from the flows to whatever renders the screen.
//!
//! Flows never touch widgets. They push [`Signal`] values into an unbounded
//! channel; once the receiver is dropped (screen destroyed) signals are
//! discarded instead of reaching a dead screen.

use crate::gly::{navigator::Screen, validate::Field};
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    ShowError(String),
    ShowStatus(String),
    FieldError(Field, String),
    NavigateTo(Screen),
    SetFormEnabled(bool),
}

#[derive(Debug, Clone)]
pub struct UiHandle {
    tx: mpsc::UnboundedSender<Signal>,
}

/// Create a connected handle/receiver pair.
#[must_use]
pub fn channel() -> (UiHandle, mpsc::UnboundedReceiver<Signal>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (UiHandle { tx }, rx)
}

impl UiHandle {
    pub fn emit(&self, signal: Signal) {
        if let Err(err) = self.tx.send(signal) {
            debug!(signal = ?err.0, "screen is gone, dropping signal");
        }
    }

    pub fn show_error(&self, message: impl Into<String>) {
        self.emit(Signal::ShowError(message.into()));
    }

    pub fn show_status(&self, message: impl Into<String>) {
        self.emit(Signal::ShowStatus(message.into()));
    }

    pub fn field_error(&self, field: Field, message: impl Into<String>) {
        self.emit(Signal::FieldError(field, message.into()));
    }

    pub fn navigate(&self, screen: Screen) {
        self.emit(Signal::NavigateTo(screen));
    }

    pub fn set_form_enabled(&self, enabled: bool) {
        self.emit(Signal::SetFormEnabled(enabled));
    }
}
