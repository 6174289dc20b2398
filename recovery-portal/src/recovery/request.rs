use crate::recovery::error::{RecoveryError, RequestFailure, classify_request_failure};
use crate::recovery::guard::KeyedInFlight;
use crate::services::metrics;
use crate::services::{ServiceFailure, SessionService};
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

/// Generic acknowledgment; identical whether or not the account exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryAck;

impl RecoveryAck {
    pub fn message(&self) -> &'static str {
        "If your email is registered, you will receive a password reset link shortly."
    }
}

fn pending_key(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Validate)]
struct RecoveryAddress {
    #[validate(email)]
    email: String,
}

/// Sends the recovery email that starts a password reset.
///
/// Shared by every browser; concurrent requests for the same address
/// collapse into one platform call.
pub struct RecoveryRequestWorkflow<S> {
    service: Arc<S>,
    return_url: String,
    call_timeout: Duration,
    in_flight: KeyedInFlight,
}

impl<S: SessionService> RecoveryRequestWorkflow<S> {
    pub fn new(service: Arc<S>, return_url: impl Into<String>, call_timeout: Duration) -> Self {
        Self {
            service,
            return_url: return_url.into(),
            call_timeout,
            in_flight: KeyedInFlight::new(),
        }
    }

    pub fn is_in_flight(&self, email: &str) -> bool {
        self.in_flight.is_busy(&pending_key(email))
    }

    pub async fn request(&self, email: &str) -> Result<RecoveryAck, RecoveryError> {
        let result = self.run(email).await;
        match &result {
            Ok(_) => metrics::record_recovery_request("acknowledged"),
            Err(e) => metrics::record_recovery_request(e.kind()),
        }
        result
    }

    async fn run(&self, email: &str) -> Result<RecoveryAck, RecoveryError> {
        let email = email.trim();
        RecoveryAddress {
            email: email.to_string(),
        }
        .validate()
        .map_err(|_| RecoveryError::InvalidEmail)?;

        let _guard = self
            .in_flight
            .try_acquire(&pending_key(email))
            .ok_or(RecoveryError::SubmitInFlight)?;

        let sent = tokio::time::timeout(
            self.call_timeout,
            self.service.send_recovery_email(email, &self.return_url),
        )
        .await
        .unwrap_or_else(|_| Err(ServiceFailure::timeout("send_recovery_email", self.call_timeout)));

        let Err(failure) = sent else {
            tracing::info!("Recovery email requested");
            return Ok(RecoveryAck);
        };

        match classify_request_failure(&failure) {
            RequestFailure::Acknowledge => {
                // Same log line as a real send.
                tracing::info!("Recovery email requested");
                Ok(RecoveryAck)
            }
            RequestFailure::Error(error) => {
                tracing::warn!(
                    kind = error.kind(),
                    status = failure.status,
                    code = failure.code.as_deref().unwrap_or(""),
                    "Recovery email request failed"
                );
                Err(error)
            }
        }
    }
}
