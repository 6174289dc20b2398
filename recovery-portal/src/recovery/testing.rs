//! Recording [`SessionService`] double for the workflow tests.

use crate::models::SessionInfo;
use crate::services::{ProofKind, ServiceFailure, SessionService};
use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ExchangeRecovery,
    ExchangeSignup,
    CurrentSession,
    InstallSession,
    UpdatePassword(String),
    SignOut,
    SendRecoveryEmail { email: String, return_url: String },
}

pub struct FakeSessionService {
    pub recovery_exchange: Result<(), ServiceFailure>,
    pub signup_exchange: Result<(), ServiceFailure>,
    pub install: Result<(), ServiceFailure>,
    pub update: Result<(), ServiceFailure>,
    pub sign_out: Result<(), ServiceFailure>,
    pub recovery_email: Result<(), ServiceFailure>,
    /// Held by `update_password` until notified.
    pub update_gate: Option<Arc<Notify>>,
    /// Added to every exchange call, after it is recorded.
    pub exchange_delay: Option<Duration>,
    /// Added to `send_recovery_email`, after it is recorded.
    pub email_delay: Option<Duration>,
    pub held: Mutex<Option<SessionInfo>>,
    pub calls: Mutex<Vec<Call>>,
}

pub fn expired_link() -> ServiceFailure {
    ServiceFailure::from_status(
        403,
        r#"{"code":403,"error_code":"otp_expired","msg":"Email link is invalid or has expired"}"#,
    )
}

pub fn user() -> SessionInfo {
    SessionInfo {
        user_id: "8d2f0c1e-user".to_string(),
        email: Some("jane@example.com".to_string()),
        expires_at: None,
    }
}

impl Default for FakeSessionService {
    fn default() -> Self {
        Self {
            recovery_exchange: Err(expired_link()),
            signup_exchange: Err(expired_link()),
            install: Err(expired_link()),
            update: Ok(()),
            sign_out: Ok(()),
            recovery_email: Ok(()),
            update_gate: None,
            exchange_delay: None,
            email_delay: None,
            held: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeSessionService {
    pub fn with_session(self) -> Self {
        *self.held.lock().unwrap() = Some(user());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn accept(&self, outcome: &Result<(), ServiceFailure>) -> Result<SessionInfo, ServiceFailure> {
        outcome.clone()?;
        let info = user();
        *self.held.lock().unwrap() = Some(info.clone());
        Ok(info)
    }
}

#[async_trait]
impl SessionService for FakeSessionService {
    async fn exchange_recovery_proof(
        &self,
        _proof: &str,
        kind: ProofKind,
    ) -> Result<SessionInfo, ServiceFailure> {
        let outcome = match kind {
            ProofKind::Recovery => {
                self.record(Call::ExchangeRecovery);
                &self.recovery_exchange
            }
            ProofKind::Signup => {
                self.record(Call::ExchangeSignup);
                &self.signup_exchange
            }
        };
        if let Some(delay) = self.exchange_delay {
            tokio::time::sleep(delay).await;
        }
        self.accept(outcome)
    }

    async fn current_session(&self) -> Result<Option<SessionInfo>, ServiceFailure> {
        self.record(Call::CurrentSession);
        Ok(self.held.lock().unwrap().clone())
    }

    async fn install_session(
        &self,
        _proof: &str,
        _refresh_proof: &str,
    ) -> Result<SessionInfo, ServiceFailure> {
        self.record(Call::InstallSession);
        self.accept(&self.install)
    }

    async fn update_password(&self, new_password: &Secret<String>) -> Result<(), ServiceFailure> {
        self.record(Call::UpdatePassword(new_password.expose_secret().clone()));
        if let Some(gate) = &self.update_gate {
            gate.notified().await;
        }
        self.update.clone()
    }

    async fn sign_out(&self) -> Result<(), ServiceFailure> {
        self.record(Call::SignOut);
        *self.held.lock().unwrap() = None;
        self.sign_out.clone()
    }

    async fn send_recovery_email(
        &self,
        email: &str,
        return_url: &str,
    ) -> Result<(), ServiceFailure> {
        self.record(Call::SendRecoveryEmail {
            email: email.to_string(),
            return_url: return_url.to_string(),
        });
        if let Some(delay) = self.email_delay {
            tokio::time::sleep(delay).await;
        }
        self.recovery_email.clone()
    }
}
