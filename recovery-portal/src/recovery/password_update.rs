use crate::config::RecoverySettings;
use crate::models::{PasswordCandidate, PasswordPolicy, SessionState, SessionView};
use crate::recovery::error::{RecoveryError, classify_update_failure};
use crate::recovery::guard::InFlight;
use crate::services::metrics;
use crate::services::{ServiceFailure, SessionService};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Signal that the password changed and the browser should move on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordUpdated {
    pub redirect_to: String,
    pub redirect_after: Duration,
}

/// Applies a new password to the session established for one recovery flow.
///
/// Terminal once it has succeeded: the session is signed out and further
/// submissions are refused.
pub struct PasswordUpdateWorkflow<S> {
    service: Arc<S>,
    view: SessionView,
    policy: PasswordPolicy,
    call_timeout: Duration,
    redirect_to: String,
    redirect_after: Duration,
    in_flight: InFlight,
    completed: AtomicBool,
}

impl<S: SessionService> PasswordUpdateWorkflow<S> {
    pub fn new(
        service: Arc<S>,
        view: SessionView,
        policy: PasswordPolicy,
        settings: &RecoverySettings,
    ) -> Self {
        Self {
            service,
            view,
            policy,
            call_timeout: settings.call_timeout(),
            redirect_to: settings.redirect_path.clone(),
            redirect_after: settings.redirect_delay(),
            in_flight: InFlight::new(),
            completed: AtomicBool::new(false),
        }
    }

    pub fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_busy()
    }

    pub async fn submit(
        &self,
        candidate: &PasswordCandidate,
    ) -> Result<PasswordUpdated, RecoveryError> {
        let result = self.run(candidate).await;
        match &result {
            Ok(_) => metrics::record_password_update("success"),
            Err(e) => metrics::record_password_update(e.kind()),
        }
        result
    }

    async fn run(&self, candidate: &PasswordCandidate) -> Result<PasswordUpdated, RecoveryError> {
        if self.is_completed() {
            return Err(RecoveryError::AlreadyCompleted);
        }

        candidate.validate(&self.policy)?;

        let _guard = self
            .in_flight
            .try_acquire()
            .ok_or(RecoveryError::SubmitInFlight)?;

        // A submission may have completed while we were validating.
        if self.is_completed() {
            return Err(RecoveryError::AlreadyCompleted);
        }

        if !self.view.is_ready() {
            return Err(RecoveryError::SessionNotReady);
        }

        let update = tokio::time::timeout(
            self.call_timeout,
            self.service.update_password(&candidate.password),
        )
        .await
        .unwrap_or_else(|_| Err(ServiceFailure::timeout("update_password", self.call_timeout)));

        if let Err(failure) = update {
            let error = classify_update_failure(&failure);
            tracing::warn!(
                kind = error.kind(),
                status = failure.status,
                code = failure.code.as_deref().unwrap_or(""),
                "Password update failed"
            );
            return Err(error);
        }

        match tokio::time::timeout(self.call_timeout, self.service.sign_out()).await {
            Ok(Ok(())) => {}
            Ok(Err(failure)) => {
                tracing::warn!(error = %failure, "Sign-out after password update failed");
            }
            Err(_) => tracing::warn!("Sign-out after password update timed out"),
        }

        self.view.set(SessionState::Invalid);
        self.completed.store(true, Ordering::Release);
        tracing::info!("Password updated through recovery flow");

        Ok(PasswordUpdated {
            redirect_to: self.redirect_to.clone(),
            redirect_after: self.redirect_after,
        })
    }
}
