use crate::handlers::{
    redirect, session_error, NoticeTemplate, ACCESS_TOKEN_KEY, EMAIL_KEY, REFRESH_TOKEN_KEY,
    USER_ID_KEY,
};
use crate::AppState;
use askama::Template;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Form,
};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::error::AppError;
use tower_sessions::Session;

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: Secret<String>,
}

pub async fn login_page() -> impl IntoResponse {
    LoginTemplate {}
}

pub async fn login_handler(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(payload): Form<LoginRequest>,
) -> Result<Response, AppError> {
    let email = payload.email.trim();

    let tokens = match state
        .platform
        .sign_in_with_password(email, &payload.password)
        .await
    {
        Ok(tokens) => tokens,
        Err(failure) if matches!(failure.status, Some(400..=499)) => {
            tracing::info!(status = failure.status, "Sign-in rejected");
            return Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                NoticeTemplate::error("Invalid email or password"),
            )
                .into_response());
        }
        Err(failure) => {
            tracing::error!(error = %failure, "Sign-in failed");
            return Ok((
                StatusCode::BAD_GATEWAY,
                NoticeTemplate::error("Something went wrong. Please try again."),
            )
                .into_response());
        }
    };

    let info = tokens.session_info();

    // New identity, new session id.
    session.cycle_id().await.map_err(session_error)?;
    session
        .insert(ACCESS_TOKEN_KEY, tokens.access_token.expose_secret())
        .await
        .map_err(session_error)?;
    if let Some(refresh_token) = &tokens.refresh_token {
        session
            .insert(REFRESH_TOKEN_KEY, refresh_token.expose_secret())
            .await
            .map_err(session_error)?;
    }
    session
        .insert(USER_ID_KEY, &info.user_id)
        .await
        .map_err(session_error)?;
    session
        .insert(EMAIL_KEY, info.email.as_deref().unwrap_or(email))
        .await
        .map_err(session_error)?;

    tracing::info!(user_id = %info.user_id, "User logged in successfully");

    redirect(&headers, "/")
}

pub async fn logout_handler(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let access_token = session
        .get::<String>(ACCESS_TOKEN_KEY)
        .await
        .map_err(session_error)?;

    // Revocation is best effort; the local session is dropped regardless.
    if let Some(access_token) = access_token {
        match state.platform.logout(&access_token).await {
            Ok(()) => tracing::info!("Token revoked successfully"),
            Err(failure) => tracing::warn!(error = %failure, "Failed to revoke token during logout"),
        }
    }

    session.flush().await.map_err(session_error)?;

    redirect(&headers, "/")
}
