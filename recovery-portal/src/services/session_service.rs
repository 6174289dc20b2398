//! The narrow capability through which the recovery workflows reach the
//! auth platform's session machinery.
//!
//! The platform owns the real session; implementations keep whatever local
//! handle they need ("the current session") behind this trait so the
//! workflows can run against a fake in tests.

use crate::models::SessionInfo;
use async_trait::async_trait;
use secrecy::Secret;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// How a recovery proof is presented to the platform's verify endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofKind {
    Recovery,
    Signup,
}

impl ProofKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProofKind::Recovery => "recovery",
            ProofKind::Signup => "signup",
        }
    }
}

#[async_trait]
pub trait SessionService: Send + Sync {
    /// Verify a one-time recovery proof and make the resulting session current.
    async fn exchange_recovery_proof(
        &self,
        proof: &str,
        kind: ProofKind,
    ) -> Result<SessionInfo, ServiceFailure>;

    /// The session already held, if it is still accepted by the platform.
    async fn current_session(&self) -> Result<Option<SessionInfo>, ServiceFailure>;

    /// Make the `(proof, refresh_proof)` token pair the current session.
    async fn install_session(
        &self,
        proof: &str,
        refresh_proof: &str,
    ) -> Result<SessionInfo, ServiceFailure>;

    /// Change the password of the identity behind the current session.
    async fn update_password(&self, new_password: &Secret<String>) -> Result<(), ServiceFailure>;

    /// Drop the current session locally and revoke it remotely.
    async fn sign_out(&self) -> Result<(), ServiceFailure>;

    /// Ask the platform to email a recovery link that returns to `return_url`.
    async fn send_recovery_email(&self, email: &str, return_url: &str)
        -> Result<(), ServiceFailure>;
}

/// Typed failure of a platform call.
///
/// `status` is `None` when no HTTP response was received (transport error,
/// timeout, or no local session to act with).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceFailure {
    pub status: Option<u16>,
    pub code: Option<String>,
    pub message: String,
}

/// Error envelopes the platform uses across its endpoints.
#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    error_code: Option<String>,
    error: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
}

impl ServiceFailure {
    pub fn new(status: Option<u16>, code: Option<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(None, Some("transport_error".to_string()), message)
    }

    pub fn timeout(operation: &str, after: Duration) -> Self {
        Self::new(
            None,
            Some("timeout".to_string()),
            format!("{} timed out after {}ms", operation, after.as_millis()),
        )
    }

    pub fn no_session() -> Self {
        Self::new(
            None,
            Some("session_not_found".to_string()),
            "Auth session missing",
        )
    }

    /// Build a failure from a non-success HTTP response body.
    pub fn from_status(status: u16, body: &str) -> Self {
        let envelope: ErrorEnvelope = serde_json::from_str(body).unwrap_or_default();

        let code = envelope.error_code.or(envelope.error.clone());
        let message = envelope
            .msg
            .or(envelope.message)
            .or(envelope.error_description)
            .or(envelope.error)
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    format!("HTTP {}", status)
                } else {
                    body.trim().to_string()
                }
            });

        Self::new(Some(status), code, message)
    }

    pub fn is_timeout(&self) -> bool {
        self.code.as_deref() == Some("timeout")
    }

    pub fn has_code(&self, candidates: &[&str]) -> bool {
        self.code
            .as_deref()
            .is_some_and(|code| candidates.iter().any(|c| c.eq_ignore_ascii_case(code)))
    }

    pub fn message_contains(&self, needle: &str) -> bool {
        self.message
            .to_ascii_lowercase()
            .contains(&needle.to_ascii_lowercase())
    }
}

impl fmt::Display for ServiceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.status, &self.code) {
            (Some(status), Some(code)) => write!(f, "[{} {}] {}", status, code, self.message),
            (Some(status), None) => write!(f, "[{}] {}", status, self.message),
            (None, Some(code)) => write!(f, "[{}] {}", code, self.message),
            (None, None) => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ServiceFailure {}
