use crate::models::PolicyViolation;
use crate::services::ServiceFailure;
use axum::http::StatusCode;
use thiserror::Error;

const SESSION_EXPIRED_CODES: [&str; 4] = [
    "session_not_found",
    "session_expired",
    "bad_jwt",
    "no_authorization",
];
const POLICY_CODES: [&str; 2] = ["weak_password", "same_password"];
const UNKNOWN_ACCOUNT_CODES: [&str; 2] = ["user_not_found", "email_not_confirmed"];

/// Everything the recovery workflows can report to the browser.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecoveryError {
    #[error("recovery link carries no proof")]
    LinkMissing,

    #[error("recovery link invalid or expired")]
    LinkInvalidOrExpired,

    #[error("session expired during password update")]
    SessionExpired,

    #[error("password rejected by platform policy: {0}")]
    PolicyRejected(String),

    #[error("passwords do not match")]
    PasswordMismatch,

    #[error("password rejected locally: {0}")]
    WeakPassword(PolicyViolation),

    #[error("invalid email address")]
    InvalidEmail,

    #[error("recovery requests rate limited")]
    RateLimited { retry_after: Option<u64> },

    #[error("auth platform failure: {0}")]
    NetworkOrUnknown(String),

    #[error("a submission is already in flight")]
    SubmitInFlight,

    #[error("recovery session not ready")]
    SessionNotReady,

    #[error("password already updated")]
    AlreadyCompleted,
}

impl RecoveryError {
    /// The message shown in the page. One per class; upstream detail only for
    /// policy rejections, and nothing that reveals whether an account exists.
    pub fn user_message(&self) -> String {
        match self {
            RecoveryError::LinkMissing => {
                "This reset link is missing its token. Please request a new password reset.".into()
            }
            RecoveryError::LinkInvalidOrExpired => {
                "Invalid or expired reset link. Please request a new password reset.".into()
            }
            RecoveryError::SessionExpired => {
                "Reset session expired. Please request a new password reset.".into()
            }
            RecoveryError::PolicyRejected(detail) => format!(
                "{}. Please choose a different password.",
                detail.trim_end_matches('.')
            ),
            RecoveryError::PasswordMismatch => "Passwords do not match.".into(),
            RecoveryError::WeakPassword(violation) => format!("{}.", violation),
            RecoveryError::InvalidEmail => "Please enter a valid email address.".into(),
            RecoveryError::RateLimited { .. } => {
                "Too many reset requests. Please wait a while before trying again.".into()
            }
            RecoveryError::NetworkOrUnknown(_) => {
                "Something went wrong. Please try again.".into()
            }
            RecoveryError::SubmitInFlight => {
                "Your request is already being processed.".into()
            }
            RecoveryError::SessionNotReady => {
                "Please wait for authentication to complete.".into()
            }
            RecoveryError::AlreadyCompleted => {
                "Your password has already been updated. Please sign in.".into()
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            RecoveryError::PasswordMismatch
            | RecoveryError::WeakPassword(_)
            | RecoveryError::InvalidEmail
            | RecoveryError::PolicyRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RecoveryError::LinkMissing
            | RecoveryError::LinkInvalidOrExpired
            | RecoveryError::SessionExpired
            | RecoveryError::SessionNotReady => StatusCode::UNAUTHORIZED,
            RecoveryError::SubmitInFlight | RecoveryError::AlreadyCompleted => {
                StatusCode::CONFLICT
            }
            RecoveryError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            RecoveryError::NetworkOrUnknown(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Whether the only way forward is a fresh recovery link.
    pub fn needs_new_link(&self) -> bool {
        matches!(
            self,
            RecoveryError::LinkMissing
                | RecoveryError::LinkInvalidOrExpired
                | RecoveryError::SessionExpired
                | RecoveryError::SessionNotReady
        )
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RecoveryError::LinkMissing => "link_missing",
            RecoveryError::LinkInvalidOrExpired => "link_invalid",
            RecoveryError::SessionExpired => "session_expired",
            RecoveryError::PolicyRejected(_) => "policy_rejected",
            RecoveryError::PasswordMismatch => "password_mismatch",
            RecoveryError::WeakPassword(_) => "weak_password",
            RecoveryError::InvalidEmail => "invalid_email",
            RecoveryError::RateLimited { .. } => "rate_limited",
            RecoveryError::NetworkOrUnknown(_) => "unknown",
            RecoveryError::SubmitInFlight => "in_flight",
            RecoveryError::SessionNotReady => "not_ready",
            RecoveryError::AlreadyCompleted => "already_completed",
        }
    }
}

/// Classify a failed password update.
pub fn classify_update_failure(failure: &ServiceFailure) -> RecoveryError {
    let session_expired = matches!(failure.status, Some(401) | Some(403))
        || failure.has_code(&SESSION_EXPIRED_CODES)
        || failure.message_contains("session")
        || failure.message_contains("jwt");
    if session_expired {
        return RecoveryError::SessionExpired;
    }

    let policy = failure.has_code(&POLICY_CODES)
        || failure.status == Some(422)
        || failure.message.starts_with("Password should");
    if policy {
        return RecoveryError::PolicyRejected(failure.message.clone());
    }

    RecoveryError::NetworkOrUnknown(failure.to_string())
}

/// How a failed recovery-email request should be surfaced.
#[derive(Debug, PartialEq, Eq)]
pub enum RequestFailure {
    /// Indistinguishable from success for the user.
    Acknowledge,
    Error(RecoveryError),
}

pub fn classify_request_failure(failure: &ServiceFailure) -> RequestFailure {
    let rate_limited = failure.status == Some(429)
        || failure.code.as_deref().is_some_and(|code| {
            code.starts_with("over_") && code.ends_with("_rate_limit")
        });
    if rate_limited {
        return RequestFailure::Error(RecoveryError::RateLimited { retry_after: None });
    }

    let unknown_account = failure.has_code(&UNKNOWN_ACCOUNT_CODES)
        || failure.message_contains("user not found")
        || failure.status == Some(404);
    if unknown_account {
        return RequestFailure::Acknowledge;
    }

    RequestFailure::Error(RecoveryError::NetworkOrUnknown(failure.to_string()))
}
