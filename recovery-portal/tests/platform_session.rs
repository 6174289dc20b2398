use recovery_portal::config::PlatformSettings;
use recovery_portal::services::{AuthPlatformClient, PlatformSession, ProofKind, SessionService};
use secrecy::Secret;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session_for(server: &MockServer) -> PlatformSession {
    let client = AuthPlatformClient::new(&PlatformSettings {
        url: server.uri(),
        anon_key: Secret::new("anon-key".to_string()),
        request_timeout_ms: 2000,
    });
    PlatformSession::new(Arc::new(client))
}

fn tokens(access: &str, refresh: &str) -> serde_json::Value {
    json!({
        "access_token": access,
        "token_type": "bearer",
        "expires_in": 3600,
        "expires_at": 1_900_000_000,
        "refresh_token": refresh,
        "user": { "id": "user-1", "email": "jane@example.com" }
    })
}

#[tokio::test]
async fn exchange_holds_session_for_update() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/verify"))
        .and(header("apikey", "anon-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tokens("a-1", "r-1")))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/auth/v1/user"))
        .and(header("authorization", "Bearer a-1"))
        .and(body_partial_json(json!({ "password": "Abcdef1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "user-1" })))
        .expect(1)
        .mount(&server)
        .await;

    let session = session_for(&server);
    let info = session
        .exchange_recovery_proof("hash", ProofKind::Recovery)
        .await
        .unwrap();

    assert_eq!(info.user_id, "user-1");
    assert_eq!(info.expires_at.unwrap().timestamp(), 1_900_000_000);
    assert!(session.has_session().await);

    session
        .update_password(&Secret::new("Abcdef1".to_string()))
        .await
        .unwrap();
}

#[tokio::test]
async fn update_without_session_makes_no_call() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let session = session_for(&server);
    let failure = session
        .update_password(&Secret::new("Abcdef1".to_string()))
        .await
        .unwrap_err();

    assert_eq!(failure.status, None);
    assert_eq!(failure.code.as_deref(), Some("session_not_found"));
}

#[tokio::test]
async fn install_falls_back_to_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header("authorization", "Bearer stale-access"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": 401,
            "error_code": "bad_jwt",
            "msg": "invalid JWT: token is expired"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(body_partial_json(json!({ "refresh_token": "r-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(tokens("fresh-access", "r-2")))
        .expect(1)
        .mount(&server)
        .await;

    let session = session_for(&server);
    let info = session.install_session("stale-access", "r-1").await.unwrap();

    assert_eq!(info.email.as_deref(), Some("jane@example.com"));
    assert!(session.has_session().await);
}

#[tokio::test]
async fn rejected_session_is_dropped() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tokens("a-1", "r-1")))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "code": 403,
            "error_code": "session_not_found",
            "msg": "Session not found"
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid Refresh Token: Already Used"
        })))
        .mount(&server)
        .await;

    let session = session_for(&server);
    session
        .exchange_recovery_proof("hash", ProofKind::Recovery)
        .await
        .unwrap();

    assert_eq!(session.current_session().await.unwrap(), None);
    assert!(!session.has_session().await);
}

#[tokio::test]
async fn sign_out_clears_locally_even_when_revoke_fails() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tokens("a-1", "r-1")))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let session = session_for(&server);
    session
        .exchange_recovery_proof("hash", ProofKind::Recovery)
        .await
        .unwrap();

    let result = session.sign_out().await;

    assert_eq!(result.unwrap_err().status, Some(500));
    assert!(!session.has_session().await);
    // Nothing left to revoke.
    assert!(session.sign_out().await.is_ok());
}

#[tokio::test]
async fn recovery_email_carries_return_url() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/recover"))
        .and(query_param("redirect_to", "https://hr.example.com/reset-password"))
        .and(body_partial_json(json!({ "email": "jane@example.com" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let session = session_for(&server);
    session
        .send_recovery_email("jane@example.com", "https://hr.example.com/reset-password")
        .await
        .unwrap();
}
