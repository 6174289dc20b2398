use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::middleware::{
    rate_limit::ip_rate_limit_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use time::Duration;
use tower_http::trace::TraceLayer;
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};

use crate::handlers::{
    app::{health_check, index},
    auth::{login_handler, login_page, logout_handler},
    metrics::metrics,
    recovery::{request_reset_handler, reset_password_page, update_password_handler},
};
use crate::middleware::metrics::http_metrics_middleware;
use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    // Session setup
    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(state.settings.server.secure_cookies)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(Duration::hours(24)));

    let reset_request = post(request_reset_handler).layer(from_fn_with_state(
        state.reset_request_limit.clone(),
        ip_rate_limit_middleware,
    ));
    let landing = get(reset_password_page).layer(from_fn_with_state(
        state.landing_limit.clone(),
        ip_rate_limit_middleware,
    ));

    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/login", get(login_page).post(login_handler))
        .route("/logout", get(logout_handler))
        .route("/reset-password", landing)
        .route("/reset-password/request", reset_request)
        .route("/reset-password/update", post(update_password_handler))
        .layer(session_layer)
        .layer(from_fn(http_metrics_middleware))
        .layer(from_fn(security_headers_middleware))
        // Add tracing layer
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                // Path only: recovery links carry credentials in the query.
                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    path = %request.uri().path(),
                    version = ?request.version(),
                )
            }),
        )
        // Add tracing middleware for request_id
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
