//! Credential form checks that run before any request leaves the device.

use regex::Regex;
use secrecy::SecretString;
use thiserror::Error;

/// Minimum password length accepted on sign-up.
pub const MIN_PASSWORD_LEN: usize = 6;

// Platform email-address pattern, anchored.
const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9+._%\-]{1,256}@[a-zA-Z0-9][a-zA-Z0-9\-]{0,64}(\.[a-zA-Z0-9][a-zA-Z0-9\-]{0,25})+$";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    SignUp,
    SignIn,
}

/// Form field a validation message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Email,
    Password,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Enter a valid email")]
    InvalidEmail,
    #[error("Password must be at least 6 characters")]
    WeakPassword,
    #[error("Enter your password")]
    MissingPassword,
}

impl ValidationError {
    #[must_use]
    pub const fn field(self) -> Field {
        match self {
            Self::InvalidEmail => Field::Email,
            Self::WeakPassword | Self::MissingPassword => Field::Password,
        }
    }
}

/// Trimmed, syntactically valid form input. Never persisted.
#[derive(Debug)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

#[must_use]
pub fn valid_email(email: &str) -> bool {
    Regex::new(EMAIL_PATTERN).is_ok_and(|regex| regex.is_match(email))
}

/// Check the email field on its own, as the password reset form does.
///
/// # Errors
/// Returns `InvalidEmail` if the trimmed input does not look like an address.
pub fn validate_email(email: &str) -> Result<String, ValidationError> {
    let email = email.trim();
    if valid_email(email) {
        Ok(email.to_string())
    } else {
        Err(ValidationError::InvalidEmail)
    }
}

/// Validate raw form input for the given mode. The email is checked first.
///
/// # Errors
/// Returns the first failing rule: `InvalidEmail`, then `WeakPassword` (sign-up)
/// or `MissingPassword` (sign-in).
pub fn validate(
    email: &str,
    password: &str,
    mode: FormMode,
) -> Result<Credentials, ValidationError> {
    let email = validate_email(email)?;
    let password = password.trim();

    match mode {
        FormMode::SignUp if password.chars().count() < MIN_PASSWORD_LEN => {
            return Err(ValidationError::WeakPassword);
        }
        FormMode::SignIn if password.is_empty() => {
            return Err(ValidationError::MissingPassword);
        }
        _ => {}
    }

    Ok(Credentials {
        email,
        password: SecretString::from(password.to_string()),
    })
}
