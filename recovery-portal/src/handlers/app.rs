use crate::handlers::{session_error, EMAIL_KEY};
use askama::Template;
use axum::response::IntoResponse;
use service_core::error::AppError;
use tower_sessions::Session;

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub email: Option<String>,
}

pub async fn index(session: Session) -> Result<impl IntoResponse, AppError> {
    let email = session
        .get::<String>(EMAIL_KEY)
        .await
        .map_err(session_error)?;

    Ok(IndexTemplate { email })
}

pub async fn health_check() -> &'static str {
    "OK"
}
