use crate::config::PlatformSettings;
use crate::models::SessionInfo;
use crate::services::session_service::{ProofKind, ServiceFailure};
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use service_core::observability::{TracedClientExt, TracedRequest};
use std::time::Duration;

/// Stateless client for the hosted auth platform's REST API.
///
/// Every call carries the public `apikey` header and is bounded by the
/// configured request timeout. Session state lives in
/// [`PlatformSession`](crate::services::platform_session::PlatformSession).
pub struct AuthPlatformClient {
    client: Client,
    base_url: String,
    anon_key: Secret<String>,
    timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlatformUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Token pair returned by verify, refresh and password grants.
#[derive(Clone, Deserialize)]
pub struct PlatformTokens {
    pub access_token: Secret<String>,
    #[serde(default)]
    pub refresh_token: Option<Secret<String>>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: PlatformUser,
}

impl PlatformTokens {
    pub fn session_info(&self) -> SessionInfo {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .or_else(|| {
                self.expires_in
                    .map(|secs| Utc::now() + chrono::Duration::seconds(secs))
            });

        SessionInfo {
            user_id: self.user.id.clone(),
            email: self.user.email.clone(),
            expires_at,
        }
    }
}

impl PlatformUser {
    pub fn session_info(&self) -> SessionInfo {
        SessionInfo {
            user_id: self.id.clone(),
            email: self.email.clone(),
            expires_at: None,
        }
    }
}

impl AuthPlatformClient {
    pub fn new(settings: &PlatformSettings) -> Self {
        Self {
            client: Client::new(),
            base_url: settings.url.trim_end_matches('/').to_string(),
            anon_key: settings.anon_key.clone(),
            timeout: settings.request_timeout(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.base_url, path)
    }

    fn prepare(&self, request: TracedRequest) -> TracedRequest {
        request
            .header("apikey", self.anon_key.expose_secret())
            .timeout(self.timeout)
    }

    /// Exchange a one-time email proof (`token_hash`) for a session.
    pub async fn verify(
        &self,
        token_hash: &str,
        kind: ProofKind,
    ) -> Result<PlatformTokens, ServiceFailure> {
        let url = self.url("/verify");
        let response = self
            .prepare(self.client.traced_post(&url))
            .json(&json!({ "type": kind.as_str(), "token_hash": token_hash }))
            .send()
            .await
            .map_err(|e| transport_failure("verify", e))?;

        read_json(response).await
    }

    pub async fn get_user(&self, access_token: &str) -> Result<PlatformUser, ServiceFailure> {
        let url = self.url("/user");
        let response = self
            .prepare(self.client.traced_get(&url))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| transport_failure("get_user", e))?;

        read_json(response).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<PlatformTokens, ServiceFailure> {
        let url = self.url("/token");
        let response = self
            .prepare(self.client.traced_post(&url))
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| transport_failure("refresh", e))?;

        read_json(response).await
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &Secret<String>,
    ) -> Result<PlatformTokens, ServiceFailure> {
        let url = self.url("/token");
        let response = self
            .prepare(self.client.traced_post(&url))
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password.expose_secret() }))
            .send()
            .await
            .map_err(|e| transport_failure("sign_in", e))?;

        read_json(response).await
    }

    pub async fn update_password(
        &self,
        access_token: &str,
        new_password: &Secret<String>,
    ) -> Result<(), ServiceFailure> {
        let url = self.url("/user");
        let response = self
            .prepare(self.client.traced_put(&url))
            .bearer_auth(access_token)
            .json(&json!({ "password": new_password.expose_secret() }))
            .send()
            .await
            .map_err(|e| transport_failure("update_password", e))?;

        expect_success(response).await
    }

    pub async fn logout(&self, access_token: &str) -> Result<(), ServiceFailure> {
        let url = self.url("/logout");
        let response = self
            .prepare(self.client.traced_post(&url))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| transport_failure("logout", e))?;

        expect_success(response).await
    }

    /// Ask the platform to send a recovery email pointing at `redirect_to`.
    pub async fn recover(&self, email: &str, redirect_to: &str) -> Result<(), ServiceFailure> {
        let url = self.url("/recover");
        let response = self
            .prepare(self.client.traced_post(&url))
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email }))
            .send()
            .await
            .map_err(|e| transport_failure("recover", e))?;

        expect_success(response).await
    }
}

fn transport_failure(operation: &str, error: reqwest::Error) -> ServiceFailure {
    // Never include the URL: query strings may carry proofs.
    let error = error.without_url();
    if error.is_timeout() {
        tracing::warn!(operation, "Auth platform call timed out");
        ServiceFailure::new(None, Some("timeout".to_string()), error.to_string())
    } else {
        tracing::error!(operation, error = %error, "Auth platform call failed");
        ServiceFailure::transport(error.to_string())
    }
}

async fn failure_from_response(response: Response) -> ServiceFailure {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let failure = ServiceFailure::from_status(status, &body);
    tracing::debug!(
        status,
        code = failure.code.as_deref().unwrap_or(""),
        "Auth platform rejected call"
    );
    failure
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ServiceFailure> {
    if !response.status().is_success() {
        return Err(failure_from_response(response).await);
    }

    let status = response.status().as_u16();
    response.json::<T>().await.map_err(|e| {
        tracing::error!(error = %e, "Unexpected auth platform response body");
        ServiceFailure::new(
            Some(status),
            Some("unexpected_response".to_string()),
            "Unexpected response from auth platform",
        )
    })
}

async fn expect_success(response: Response) -> Result<(), ServiceFailure> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(failure_from_response(response).await)
    }
}
