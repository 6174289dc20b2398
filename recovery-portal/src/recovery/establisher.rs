//! Turns the proof carried by a recovery link into an authenticated session.
//!
//! The platform has delivered recovery proofs in several shapes over time
//! (one-time `token_hash`, signup-typed hashes, implicit-grant token pairs),
//! so a fixed list of strategies is tried in order until one yields a
//! session. Strategies run strictly one after another: a successful exchange
//! consumes the proof, so running them concurrently or retrying one would
//! only produce spurious failures.

use crate::models::{RecoveryLink, SessionInfo, SessionState, SessionView};
use crate::recovery::error::RecoveryError;
use crate::services::metrics;
use crate::services::{ProofKind, ServiceFailure, SessionService};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Verify the proof as a recovery one-time token.
    ExchangeRecovery,
    /// Verify the proof as a signup one-time token.
    ExchangeSignup,
    /// A session may already exist, e.g. from an earlier load of the same link.
    ExistingSession,
    /// Treat the proof as an access token paired with the refresh proof.
    InstallSession,
}

impl Strategy {
    pub const ORDER: [Strategy; 4] = [
        Strategy::ExchangeRecovery,
        Strategy::ExchangeSignup,
        Strategy::ExistingSession,
        Strategy::InstallSession,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::ExchangeRecovery => "exchange_recovery",
            Strategy::ExchangeSignup => "exchange_signup",
            Strategy::ExistingSession => "existing_session",
            Strategy::InstallSession => "install_session",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    MissingToken,
    InvalidOrExpired,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::MissingToken => write!(f, "missing token"),
            FailureReason::InvalidOrExpired => write!(f, "invalid or expired link"),
        }
    }
}

impl From<FailureReason> for RecoveryError {
    fn from(reason: FailureReason) -> Self {
        match reason {
            FailureReason::MissingToken => RecoveryError::LinkMissing,
            FailureReason::InvalidOrExpired => RecoveryError::LinkInvalidOrExpired,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    Ready,
    Failed(FailureReason),
}

pub struct RecoveryEstablisher<S> {
    service: Arc<S>,
    view: SessionView,
    call_timeout: Duration,
}

impl<S: SessionService> RecoveryEstablisher<S> {
    pub fn new(service: Arc<S>, view: SessionView, call_timeout: Duration) -> Self {
        Self {
            service,
            view,
            call_timeout,
        }
    }

    pub async fn establish(&self, link: &RecoveryLink) -> RecoveryOutcome {
        let Some(proof) = link.proof.as_deref() else {
            tracing::info!("Recovery link without proof");
            self.view.set(SessionState::Invalid);
            metrics::record_establish("missing_token", "none");
            return RecoveryOutcome::Failed(FailureReason::MissingToken);
        };

        self.view.set(SessionState::Establishing);

        for strategy in Strategy::ORDER {
            if strategy == Strategy::InstallSession && link.refresh_proof.is_none() {
                tracing::debug!(strategy = strategy.as_str(), "Skipped, no refresh proof");
                continue;
            }

            match self
                .attempt(strategy, proof, link.refresh_proof.as_deref())
                .await
            {
                Ok(session) => {
                    tracing::info!(
                        strategy = strategy.as_str(),
                        user_id = %session.user_id,
                        "Recovery session established"
                    );
                    self.view.set(SessionState::Ready);
                    metrics::record_establish("ready", strategy.as_str());
                    return RecoveryOutcome::Ready;
                }
                Err(failure) => {
                    tracing::debug!(
                        strategy = strategy.as_str(),
                        status = failure.status,
                        code = failure.code.as_deref().unwrap_or(""),
                        "Recovery strategy failed"
                    );
                }
            }
        }

        tracing::warn!("All recovery strategies failed");
        self.view.set(SessionState::Invalid);
        metrics::record_establish("invalid", "none");
        RecoveryOutcome::Failed(FailureReason::InvalidOrExpired)
    }

    async fn attempt(
        &self,
        strategy: Strategy,
        proof: &str,
        refresh_proof: Option<&str>,
    ) -> Result<SessionInfo, ServiceFailure> {
        let call = async {
            match strategy {
                Strategy::ExchangeRecovery => {
                    self.service
                        .exchange_recovery_proof(proof, ProofKind::Recovery)
                        .await
                }
                Strategy::ExchangeSignup => {
                    self.service
                        .exchange_recovery_proof(proof, ProofKind::Signup)
                        .await
                }
                Strategy::ExistingSession => self
                    .service
                    .current_session()
                    .await?
                    .ok_or_else(ServiceFailure::no_session),
                Strategy::InstallSession => match refresh_proof {
                    Some(refresh_proof) => {
                        self.service.install_session(proof, refresh_proof).await
                    }
                    None => Err(ServiceFailure::no_session()),
                },
            }
        };

        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ServiceFailure::timeout(strategy.as_str(), self.call_timeout)),
        }
    }
}
