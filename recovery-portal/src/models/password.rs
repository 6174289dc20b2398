//! New-password form state and the local acceptance policy.

use crate::recovery::error::RecoveryError;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

/// Acceptance rules for a new password.
///
/// Should be kept at least as strict as the platform's own policy so that
/// server-side rejections stay rare.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_number: bool,
    pub require_special: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 6,
            require_uppercase: true,
            require_lowercase: true,
            require_number: true,
            require_special: false,
        }
    }
}

/// First rule a candidate password breaks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    TooShort { min_length: usize, actual_length: usize },
    MissingUppercase,
    MissingLowercase,
    MissingNumber,
    MissingSpecial,
}

impl std::fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyViolation::TooShort { min_length, .. } => {
                write!(f, "Password must be at least {} characters", min_length)
            }
            PolicyViolation::MissingUppercase => {
                write!(f, "Password must contain at least one uppercase letter")
            }
            PolicyViolation::MissingLowercase => {
                write!(f, "Password must contain at least one lowercase letter")
            }
            PolicyViolation::MissingNumber => {
                write!(f, "Password must contain at least one number")
            }
            PolicyViolation::MissingSpecial => {
                write!(f, "Password must contain at least one special character")
            }
        }
    }
}

impl std::error::Error for PolicyViolation {}

impl PasswordPolicy {
    /// Returns the first violated rule, checked in declaration order.
    pub fn validate(&self, password: &str) -> Result<(), PolicyViolation> {
        let length = password.chars().count();
        if length < self.min_length {
            return Err(PolicyViolation::TooShort {
                min_length: self.min_length,
                actual_length: length,
            });
        }

        if self.require_uppercase && !password.chars().any(char::is_uppercase) {
            return Err(PolicyViolation::MissingUppercase);
        }

        if self.require_lowercase && !password.chars().any(char::is_lowercase) {
            return Err(PolicyViolation::MissingLowercase);
        }

        if self.require_number && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(PolicyViolation::MissingNumber);
        }

        if self.require_special
            && !password
                .chars()
                .any(|c| c.is_ascii_punctuation() || (!c.is_alphanumeric() && !c.is_whitespace()))
        {
            return Err(PolicyViolation::MissingSpecial);
        }

        Ok(())
    }

    /// One-line summary shown under the password field.
    pub fn describe(&self) -> String {
        let mut classes = Vec::new();
        if self.require_uppercase {
            classes.push("uppercase");
        }
        if self.require_lowercase {
            classes.push("lowercase");
        }
        if self.require_number {
            classes.push("number");
        }
        if self.require_special {
            classes.push("special character");
        }

        if classes.is_empty() {
            format!("Password must contain at least {} characters", self.min_length)
        } else {
            format!(
                "Password must contain at least {} characters with {}",
                self.min_length,
                join_with_and(&classes)
            )
        }
    }
}

fn join_with_and(items: &[&str]) -> String {
    match items {
        [] => String::new(),
        [only] => only.to_string(),
        [first, second] => format!("{} and {}", first, second),
        [init @ .., last] => format!("{}, and {}", init.join(", "), last),
    }
}

/// Transient new-password form input. Never logged or persisted.
#[derive(Deserialize)]
pub struct PasswordCandidate {
    pub password: Secret<String>,
    pub confirm_password: Secret<String>,
}

impl PasswordCandidate {
    pub fn new(password: impl Into<String>, confirm_password: impl Into<String>) -> Self {
        Self {
            password: Secret::new(password.into()),
            confirm_password: Secret::new(confirm_password.into()),
        }
    }

    pub fn passwords_match(&self) -> bool {
        self.password.expose_secret() == self.confirm_password.expose_secret()
    }

    /// Pure local check: policy first, then confirmation match.
    pub fn validate(&self, policy: &PasswordPolicy) -> Result<(), RecoveryError> {
        policy
            .validate(self.password.expose_secret())
            .map_err(RecoveryError::WeakPassword)?;

        if !self.passwords_match() {
            return Err(RecoveryError::PasswordMismatch);
        }

        Ok(())
    }
}
