use crate::handlers::{session_error, NoticeTemplate, ACCESS_TOKEN_KEY};
use crate::models::{PasswordCandidate, RecoveryLink};
use crate::recovery::{FailureReason, RecoveryError, RecoveryOutcome, FLOW_ID_KEY};
use crate::services::metrics;
use crate::AppState;
use askama::Template;
use axum::{
    extract::{RawQuery, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use service_core::error::AppError;
use tower_sessions::Session;
use uuid::Uuid;

#[derive(Template)]
#[template(path = "reset_request.html")]
pub struct ResetRequestTemplate {}

#[derive(Template)]
#[template(path = "new_password.html")]
pub struct NewPasswordTemplate {
    pub policy_hint: String,
    pub min_length: usize,
}

#[derive(Template)]
#[template(path = "reset_failed.html")]
pub struct ResetFailedTemplate {
    pub message: String,
}

#[derive(Template)]
#[template(path = "fragments/update_success.html")]
pub struct UpdateSuccessTemplate {
    pub redirect_to: String,
    pub delay_secs: u64,
}

#[derive(Deserialize)]
pub struct ResetRequestForm {
    pub email: String,
}

/// Error parameters the platform appends when it refuses a link before
/// redirecting (e.g. `error_code=otp_expired`).
#[derive(Deserialize, Default)]
struct PlatformRedirectError {
    error: Option<String>,
    error_code: Option<String>,
}

fn platform_rejected_link(query: Option<&str>) -> bool {
    query
        .and_then(|q| serde_urlencoded::from_str::<PlatformRedirectError>(q).ok())
        .is_some_and(|e| e.error.is_some() || e.error_code.is_some())
}

fn error_fragment(error: &RecoveryError) -> Response {
    let mut response = (
        error.status_code(),
        NoticeTemplate {
            tone: "error",
            message: error.user_message(),
            offer_new_link: error.needs_new_link(),
        },
    )
        .into_response();

    if let RecoveryError::RateLimited {
        retry_after: Some(secs),
    } = error
    {
        if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
    }

    response
}

fn failure_page(error: RecoveryError) -> Response {
    (
        error.status_code(),
        ResetFailedTemplate {
            message: error.user_message(),
        },
    )
        .into_response()
}

async fn browser_flow_id(session: &Session) -> Result<Option<Uuid>, AppError> {
    session.get::<Uuid>(FLOW_ID_KEY).await.map_err(session_error)
}

/// `GET /reset-password`: recovery link landing, or the forgot-password form.
pub async fn reset_password_page(
    State(state): State<AppState>,
    session: Session,
    RawQuery(query): RawQuery,
) -> Result<Response, AppError> {
    if platform_rejected_link(query.as_deref()) {
        tracing::info!("Recovery link refused by platform before landing");
        return Ok(failure_page(RecoveryError::LinkInvalidOrExpired));
    }

    let link = RecoveryLink::from_parts(query.as_deref(), None);

    if !link.is_recovery_landing() {
        let signed_in = session
            .get::<String>(ACCESS_TOKEN_KEY)
            .await
            .map_err(session_error)?
            .is_some();
        if signed_in {
            return Ok(Redirect::to("/").into_response());
        }
        return Ok(ResetRequestTemplate {}.into_response());
    }

    // Nothing to establish; no flow is registered for this browser.
    if !link.has_proof() {
        tracing::info!(reason = %FailureReason::MissingToken, "Recovery link not usable");
        metrics::record_establish("missing_token", "none");
        return Ok(failure_page(FailureReason::MissingToken.into()));
    }

    let flow = state.flows.get_or_create(browser_flow_id(&session).await?);
    session
        .insert(FLOW_ID_KEY, flow.id())
        .await
        .map_err(session_error)?;

    match flow.establish(&link).await {
        RecoveryOutcome::Ready => {
            let policy = flow.policy();
            Ok(NewPasswordTemplate {
                policy_hint: policy.describe(),
                min_length: policy.min_length,
            }
            .into_response())
        }
        RecoveryOutcome::Failed(reason) => {
            tracing::info!(flow_id = %flow.id(), reason = %reason, "Recovery link not usable");
            Ok(failure_page(reason.into()))
        }
    }
}

/// `POST /reset-password/request`
pub async fn request_reset_handler(
    State(state): State<AppState>,
    Form(form): Form<ResetRequestForm>,
) -> Response {
    match state.reset_requests.request(&form.email).await {
        Ok(ack) => NoticeTemplate::success(ack.message()).into_response(),
        Err(error) => error_fragment(&error),
    }
}

/// `POST /reset-password/update`
pub async fn update_password_handler(
    State(state): State<AppState>,
    session: Session,
    Form(candidate): Form<PasswordCandidate>,
) -> Result<Response, AppError> {
    let flow = browser_flow_id(&session)
        .await?
        .and_then(|id| state.flows.get(&id));

    let Some(flow) = flow else {
        return Ok(error_fragment(&RecoveryError::SessionExpired));
    };

    match flow.submit(&candidate).await {
        Ok(updated) => {
            state.flows.remove(&flow.id());
            session
                .remove::<Uuid>(FLOW_ID_KEY)
                .await
                .map_err(session_error)?;

            Ok(UpdateSuccessTemplate {
                redirect_to: updated.redirect_to,
                delay_secs: updated.redirect_after.as_secs(),
            }
            .into_response())
        }
        Err(error) => Ok(error_fragment(&error)),
    }
}
