use crate::models::SessionInfo;
use crate::services::platform_client::{AuthPlatformClient, PlatformTokens};
use crate::services::session_service::{ProofKind, ServiceFailure, SessionService};
use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Tokens currently held for one recovery flow.
#[derive(Clone)]
struct HeldTokens {
    access_token: Secret<String>,
    refresh_token: Option<Secret<String>>,
    info: SessionInfo,
}

impl From<PlatformTokens> for HeldTokens {
    fn from(tokens: PlatformTokens) -> Self {
        let info = tokens.session_info();
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            info,
        }
    }
}

/// [`SessionService`] backed by the auth platform, holding the session
/// established for a single recovery flow.
pub struct PlatformSession {
    client: Arc<AuthPlatformClient>,
    tokens: RwLock<Option<HeldTokens>>,
}

impl PlatformSession {
    pub fn new(client: Arc<AuthPlatformClient>) -> Self {
        Self {
            client,
            tokens: RwLock::new(None),
        }
    }

    pub async fn has_session(&self) -> bool {
        self.tokens.read().await.is_some()
    }

    async fn hold(&self, tokens: HeldTokens) -> SessionInfo {
        let info = tokens.info.clone();
        *self.tokens.write().await = Some(tokens);
        info
    }

    async fn clear(&self) -> Option<HeldTokens> {
        self.tokens.write().await.take()
    }
}

fn is_rejection(failure: &ServiceFailure) -> bool {
    matches!(failure.status, Some(401) | Some(403))
}

#[async_trait]
impl SessionService for PlatformSession {
    async fn exchange_recovery_proof(
        &self,
        proof: &str,
        kind: ProofKind,
    ) -> Result<SessionInfo, ServiceFailure> {
        let tokens = self.client.verify(proof, kind).await?;
        Ok(self.hold(tokens.into()).await)
    }

    async fn current_session(&self) -> Result<Option<SessionInfo>, ServiceFailure> {
        let held = self.tokens.read().await.clone();
        let Some(held) = held else {
            return Ok(None);
        };

        match self.client.get_user(held.access_token.expose_secret()).await {
            Ok(user) => {
                let mut info = user.session_info();
                info.expires_at = held.info.expires_at;
                Ok(Some(info))
            }
            Err(failure) if is_rejection(&failure) => {
                if let Some(refresh_token) = &held.refresh_token {
                    if let Ok(tokens) = self.client.refresh(refresh_token.expose_secret()).await {
                        return Ok(Some(self.hold(tokens.into()).await));
                    }
                }
                tracing::info!("Held session no longer accepted; dropping it");
                self.clear().await;
                Ok(None)
            }
            Err(failure) => Err(failure),
        }
    }

    async fn install_session(
        &self,
        proof: &str,
        refresh_proof: &str,
    ) -> Result<SessionInfo, ServiceFailure> {
        match self.client.get_user(proof).await {
            Ok(user) => {
                let held = HeldTokens {
                    access_token: Secret::new(proof.to_string()),
                    refresh_token: Some(Secret::new(refresh_proof.to_string())),
                    info: user.session_info(),
                };
                Ok(self.hold(held).await)
            }
            Err(failure) if is_rejection(&failure) => {
                // Expired access token; the refresh proof may still be good.
                let tokens = self.client.refresh(refresh_proof).await?;
                Ok(self.hold(tokens.into()).await)
            }
            Err(failure) => Err(failure),
        }
    }

    async fn update_password(&self, new_password: &Secret<String>) -> Result<(), ServiceFailure> {
        let held = self.tokens.read().await.clone();
        let held = held.ok_or_else(ServiceFailure::no_session)?;

        self.client
            .update_password(held.access_token.expose_secret(), new_password)
            .await
    }

    async fn sign_out(&self) -> Result<(), ServiceFailure> {
        // Local state goes first so a failed revoke still leaves us signed out.
        let Some(held) = self.clear().await else {
            return Ok(());
        };

        match self.client.logout(held.access_token.expose_secret()).await {
            Ok(()) => Ok(()),
            // Already revoked or expired on the platform side.
            Err(failure) if is_rejection(&failure) || failure.status == Some(404) => Ok(()),
            Err(failure) => Err(failure),
        }
    }

    async fn send_recovery_email(
        &self,
        email: &str,
        return_url: &str,
    ) -> Result<(), ServiceFailure> {
        self.client.recover(email, return_url).await
    }
}
