//! Terminal front end: parses typed commands and renders UI signals as text.

use crate::gly::{navigator::Screen, ui::Signal, validate::Field};
use std::str::FromStr;
use thiserror::Error;

pub const HELP: &str = "\
commands:
  signup <email> <password>   create an account and send a verification email
  signin <email> <password>   sign in with a verified account
  resend                      resend the verification email
  reset <email>               send a password reset link
  verify <email>              mark an account verified (offline only)
  help                        show this help
  quit                        leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    SignUp { email: String, password: String },
    SignIn { email: String, password: String },
    Resend,
    Reset { email: String },
    Verify { email: String },
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}', type 'help'")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

impl FromStr for ShellCommand {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Err(ParseError::Empty);
        };
        let args: Vec<&str> = words.collect();

        match (name.to_lowercase().as_str(), args.as_slice()) {
            ("signup", [email, password]) => Ok(Self::SignUp {
                email: (*email).to_string(),
                password: (*password).to_string(),
            }),
            ("signup", _) => Err(ParseError::Usage("signup <email> <password>")),
            ("signin" | "login", [email, password]) => Ok(Self::SignIn {
                email: (*email).to_string(),
                password: (*password).to_string(),
            }),
            ("signin" | "login", _) => Err(ParseError::Usage("signin <email> <password>")),
            ("resend", []) => Ok(Self::Resend),
            ("resend", _) => Err(ParseError::Usage("resend")),
            ("reset", [email]) => Ok(Self::Reset {
                email: (*email).to_string(),
            }),
            ("reset", _) => Err(ParseError::Usage("reset <email>")),
            ("verify", [email]) => Ok(Self::Verify {
                email: (*email).to_string(),
            }),
            ("verify", _) => Err(ParseError::Usage("verify <email>")),
            ("help" | "?", _) => Ok(Self::Help),
            ("quit" | "exit", _) => Ok(Self::Quit),
            (other, _) => Err(ParseError::Unknown(other.to_string())),
        }
    }
}

/// Text for a signal, if it shows anything. Navigation is rendered by the
/// caller once the navigator accepts it.
#[must_use]
pub fn render(signal: &Signal) -> Option<String> {
    match signal {
        Signal::ShowError(message) => Some(format!("error: {message}")),
        Signal::ShowStatus(message) => Some(message.clone()),
        Signal::FieldError(field, message) => Some(format!("{}: {message}", field_name(*field))),
        Signal::NavigateTo(_) | Signal::SetFormEnabled(_) => None,
    }
}

#[must_use]
pub const fn banner(screen: Screen) -> &'static str {
    match screen {
        Screen::Splash => "gly",
        Screen::Login => "Sign in or create an account. Type 'help' for commands.",
        Screen::Content => "Welcome",
    }
}

const fn field_name(field: Field) -> &'static str {
    match field {
        Field::Email => "email",
        Field::Password => "password",
    }
}
