pub mod app;
pub mod auth;
pub mod metrics;
pub mod recovery;

use askama::Template;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use service_core::error::AppError;

/// Session keys for a signed-in user.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const USER_ID_KEY: &str = "user_id";
pub const EMAIL_KEY: &str = "email";

/// Inline status message swapped into a form by HTMX.
#[derive(Template)]
#[template(path = "fragments/notice.html")]
pub struct NoticeTemplate {
    pub tone: &'static str,
    pub message: String,
    pub offer_new_link: bool,
}

impl NoticeTemplate {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            tone: "success",
            message: message.into(),
            offer_new_link: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            tone: "error",
            message: message.into(),
            offer_new_link: false,
        }
    }
}

pub(crate) fn session_error(err: tower_sessions::session::Error) -> AppError {
    AppError::SessionError(err.to_string())
}

/// Redirect that works for both HTMX requests and plain navigation.
pub(crate) fn redirect(headers: &HeaderMap, to: &str) -> Result<Response, AppError> {
    if headers.contains_key("HX-Request") {
        let location = HeaderValue::from_str(to)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("invalid redirect target: {}", e)))?;
        let mut response = StatusCode::OK.into_response();
        response.headers_mut().insert("HX-Redirect", location);
        Ok(response)
    } else {
        Ok(Redirect::to(to).into_response())
    }
}
