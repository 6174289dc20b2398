use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request, StatusCode},
};
use http_body_util::BodyExt;
use recovery_portal::config::{
    PlatformSettings, RecoverySettings, ServerSettings, Settings, TelemetrySettings,
};
use recovery_portal::models::PasswordPolicy;
use recovery_portal::startup::build_router;
use recovery_portal::AppState;
use secrecy::Secret;
use std::net::SocketAddr;
use tower::util::ServiceExt;

/// Settings pointing at a platform that is never reached by these tests.
fn offline_settings() -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            public_url: "http://localhost:8080".to_string(),
            secure_cookies: false,
            trust_forwarded_for: false,
        },
        platform: PlatformSettings {
            url: "http://127.0.0.1:9".to_string(),
            anon_key: Secret::new("anon".to_string()),
            request_timeout_ms: 200,
        },
        recovery: RecoverySettings::default(),
        password_policy: PasswordPolicy::default(),
        telemetry: TelemetrySettings::default(),
    }
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn health_check_works() {
    let app = build_router(AppState::new(offline_settings()));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(
        response.headers().get(header::REFERRER_POLICY).unwrap(),
        "no-referrer"
    );
    assert_eq!(body_text(response).await, "OK");
}

#[tokio::test]
async fn reset_page_without_link_shows_request_form() {
    let app = build_router(AppState::new(offline_settings()));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/reset-password")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("Send reset link"));
    assert!(body.contains("/reset-password/request"));
}

#[tokio::test]
async fn recovery_link_without_token_fails_offline() {
    let app = build_router(AppState::new(offline_settings()));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/reset-password?type=recovery")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_text(response).await;
    assert!(body.contains("missing its token"));
    assert!(body.contains("Request a new reset link"));
}

#[tokio::test]
async fn platform_error_redirect_shows_failure_page() {
    let app = build_router(AppState::new(offline_settings()));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/reset-password?error=access_denied&error_code=otp_expired")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body_text(response).await.contains("Invalid or expired reset link"));
}

#[tokio::test]
async fn invalid_email_is_rejected_locally() {
    let app = build_router(AppState::new(offline_settings()));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/reset-password/request")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("email=not-an-email"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_text(response)
        .await
        .contains("Please enter a valid email address."));
}

#[tokio::test]
async fn update_without_flow_asks_for_new_link() {
    let app = build_router(AppState::new(offline_settings()));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/reset-password/update")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("password=Abcdef1&confirm_password=Abcdef1"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_text(response).await;
    assert!(body.contains("Reset session expired"));
    assert!(body.contains("Request a new reset link"));
}

#[tokio::test]
async fn links_without_token_register_no_flow() {
    let state = AppState::new(offline_settings());
    let app = build_router(state.clone());

    for _ in 0..500 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/reset-password?type=recovery")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(!response.headers().contains_key(header::SET_COOKIE));
    }

    assert!(state.flows.is_empty());
}

#[tokio::test]
async fn reset_requests_register_no_flow() {
    let state = AppState::new(offline_settings());
    let app = build_router(state.clone());

    for _ in 0..20 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/reset-password/request")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("email=not-an-email"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    assert!(state.flows.is_empty());
}

#[tokio::test]
async fn landing_page_is_rate_limited_per_peer() {
    let mut settings = offline_settings();
    settings.recovery.landing_rate_limit.attempts = 2;
    let app = build_router(AppState::new(settings));
    let peer: SocketAddr = "198.51.100.9:40000".parse().unwrap();

    let landing = || {
        Request::builder()
            .uri("/reset-password")
            .extension(ConnectInfo(peer))
            .body(Body::empty())
            .unwrap()
    };

    for _ in 0..2 {
        let response = app.clone().oneshot(landing()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.oneshot(landing()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}
