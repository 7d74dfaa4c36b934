//! Signup form checks run before the `sign_up` capability is called.

use regex::Regex;
use std::fmt;
use thiserror::Error;

pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum SignUpError {
    #[error("Please fill in all fields.")]
    MissingField,
    #[error("Password must be at least 8 characters")]
    PasswordTooShort,
    #[error("Please agree to the Terms of Service")]
    TermsNotAccepted,
}

/// Check the signup form in the order the user sees the errors.
///
/// # Errors
/// The first failing check, as a [`SignUpError`].
pub fn validate_signup(
    name: &str,
    email: &str,
    password: &str,
    terms_accepted: bool,
) -> Result<(), SignUpError> {
    if name.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
        return Err(SignUpError::MissingField);
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(SignUpError::PasswordTooShort);
    }

    if !terms_accepted {
        return Err(SignUpError::TermsNotAccepted);
    }

    Ok(())
}

#[must_use]
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

/// Password strength meter shown next to the signup password field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PasswordStrength {
    TooShort,
    Weak,
    Fair,
    Good,
    Strong,
}

impl PasswordStrength {
    /// One point each for: at least 8 characters, an uppercase ASCII letter,
    /// an ASCII digit, a character outside `[A-Za-z0-9]`.
    #[must_use]
    pub fn score(password: &str) -> u8 {
        let rules = [
            password.chars().count() >= MIN_PASSWORD_LENGTH,
            password.chars().any(|c| c.is_ascii_uppercase()),
            password.chars().any(|c| c.is_ascii_digit()),
            password.chars().any(|c| !c.is_ascii_alphanumeric()),
        ];
        rules.into_iter().map(u8::from).sum()
    }

    #[must_use]
    pub fn of(password: &str) -> Self {
        match Self::score(password) {
            0 => Self::TooShort,
            1 => Self::Weak,
            2 => Self::Fair,
            3 => Self::Good,
            _ => Self::Strong,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::TooShort => "Too short",
            Self::Weak => "Weak",
            Self::Fair => "Fair",
            Self::Good => "Good",
            Self::Strong => "Strong",
        }
    }
}

impl fmt::Display for PasswordStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
