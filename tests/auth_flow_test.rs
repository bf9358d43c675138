mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{TestApp, TEST_PASSWORD};
use identity_service::models::{IdentityScope, Role};
use identity_service::services::{RevocationStore, TokenKind};

fn message(body: &serde_json::Value) -> &str {
    body["message"].as_str().unwrap_or("")
}

#[tokio::test]
async fn register_sends_verification_code() {
    let app = TestApp::spawn();

    let (status, body) = app
        .post_json(
            "/auth/user/register",
            json!({ "email": "new@example.com", "password": "longenough1", "name": "New User" }),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "success");
    assert!(body["data"]["userId"].as_str().is_some());
    assert_eq!(app.emails_sent_to("new@example.com"), 1);
}

#[tokio::test]
async fn register_rejects_duplicate_email() {
    let app = TestApp::spawn();
    app.seed_user("dup@example.com", true).await;

    let (status, body) = app
        .post_json(
            "/auth/user/register",
            json!({ "email": "dup@example.com", "password": "longenough1" }),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(message(&body), "Email already registered");
}

#[tokio::test]
async fn register_validates_input() {
    let app = TestApp::spawn();

    let (status, body) = app
        .post_json(
            "/auth/user/register",
            json!({ "email": "not-an-email", "password": "short" }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert!(body["errors"].as_array().map(|a| !a.is_empty()).unwrap_or(false));
}

#[tokio::test]
async fn login_succeeds_for_verified_user() {
    let app = TestApp::spawn();
    app.seed_user("verified@example.com", true).await;

    let (status, body) = app
        .post_json(
            "/auth/user/login",
            json!({ "email": "verified@example.com", "password": TEST_PASSWORD }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["emailVerified"], true);
    assert!(body["data"]["tokens"]["accessToken"].as_str().is_some());
    assert!(body["data"]["tokens"]["refreshToken"].as_str().is_some());
}

#[tokio::test]
async fn login_uses_one_message_for_unknown_email_and_wrong_password() {
    let app = TestApp::spawn();
    app.seed_user("known@example.com", true).await;

    let (status, body) = app
        .post_json(
            "/auth/user/login",
            json!({ "email": "unknown@example.com", "password": TEST_PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let unknown_message = message(&body).to_string();

    let (status, body) = app
        .post_json(
            "/auth/user/login",
            json!({ "email": "known@example.com", "password": "wrong-password" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Neither response may reveal which part was wrong.
    assert_eq!(unknown_message, message(&body));
    assert_eq!(unknown_message, "Invalid email or password");
}

#[tokio::test]
async fn unverified_login_returns_flag_and_sends_code() {
    let app = TestApp::spawn();
    app.seed_user("pending@example.com", false).await;

    let (status, body) = app
        .post_json(
            "/auth/user/login",
            json!({ "email": "pending@example.com", "password": TEST_PASSWORD }),
        )
        .await;

    // Correct password, unverified email: not an error, but no tokens.
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["emailVerified"], false);
    assert!(body["data"]["tokens"].is_null());
    assert_eq!(app.emails_sent_to("pending@example.com"), 1);
}

#[tokio::test]
async fn unverified_login_with_wrong_password_still_rejects() {
    let app = TestApp::spawn();
    app.seed_user("pending2@example.com", false).await;

    let (status, _) = app
        .post_json(
            "/auth/user/login",
            json!({ "email": "pending2@example.com", "password": "wrong-password" }),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.emails_sent_to("pending2@example.com"), 0);
}

#[tokio::test]
async fn verify_email_issues_tokens() {
    let app = TestApp::spawn();
    app.seed_user("confirm@example.com", false).await;

    // Trigger a code send via login.
    app.post_json(
        "/auth/user/login",
        json!({ "email": "confirm@example.com", "password": TEST_PASSWORD }),
    )
    .await;
    let code = app.last_code_sent_to("confirm@example.com").unwrap();
    assert_eq!(code.len(), 6);

    let (status, body) = app
        .post_json(
            "/auth/user/verify-email",
            json!({ "email": "confirm@example.com", "code": code }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["emailVerified"], true);
    let access = body["data"]["tokens"]["accessToken"].as_str().unwrap();
    let claims = app
        .state
        .tokens
        .verify(access, TokenKind::Access)
        .unwrap();
    assert_eq!(claims.email, "confirm@example.com");
}

#[tokio::test]
async fn refresh_returns_a_new_pair() {
    let app = TestApp::spawn();
    let user = app.seed_user("refresh@example.com", true).await;
    let pair = app
        .state
        .tokens
        .issue_pair(&user.id, &user.email, user.role)
        .unwrap();

    let (status, body) = app
        .post_json("/auth/user/refresh", json!({ "refreshToken": pair.refresh_token }))
        .await;

    assert_eq!(status, StatusCode::OK);
    let new_access = body["data"]["tokens"]["accessToken"].as_str().unwrap();
    let claims = app
        .state
        .tokens
        .verify(new_access, TokenKind::Access)
        .unwrap();
    assert_eq!(claims.sub, user.id);
}

#[tokio::test]
async fn refresh_rejects_access_token_in_place_of_refresh() {
    let app = TestApp::spawn();
    let user = app.seed_user("mixed@example.com", true).await;
    let pair = app
        .state
        .tokens
        .issue_pair(&user.id, &user.email, user.role)
        .unwrap();

    let (status, body) = app
        .post_json("/auth/user/refresh", json!({ "refreshToken": pair.access_token }))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(message(&body), "Invalid token");
}

#[tokio::test]
async fn refresh_rejects_blanket_revoked_identity() {
    let app = TestApp::spawn();
    let user = app.seed_user("revoked-refresh@example.com", true).await;
    let pair = app
        .state
        .tokens
        .issue_pair(&user.id, &user.email, user.role)
        .unwrap();

    app.revocations
        .blacklist_identity(&user.id, IdentityScope::User, 3_600)
        .await
        .unwrap();

    let (status, body) = app
        .post_json("/auth/user/refresh", json!({ "refreshToken": pair.refresh_token }))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(message(&body), "User tokens have been revoked");
}

#[tokio::test]
async fn admin_refresh_uses_admin_namespace() {
    let app = TestApp::spawn();
    let admin = app.seed_admin("adm@example.com", Role::Admin, false).await;
    let pair = app
        .state
        .tokens
        .issue_pair(&admin.id, &admin.email, admin.role)
        .unwrap();

    app.revocations
        .blacklist_identity(&admin.id, IdentityScope::Admin, 3_600)
        .await
        .unwrap();

    let (status, body) = app
        .post_json("/auth/admin/refresh", json!({ "refreshToken": pair.refresh_token }))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(message(&body), "Admin tokens have been revoked");
}

#[tokio::test]
async fn logout_blacklists_both_tokens() {
    let app = TestApp::spawn();
    let user = app.seed_user("bye@example.com", true).await;
    let pair = app
        .state
        .tokens
        .issue_pair(&user.id, &user.email, user.role)
        .unwrap();

    let (status, body) = app
        .post_json_bearer(
            "/auth/user/logout",
            &pair.access_token,
            json!({ "refreshToken": pair.refresh_token }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(message(&body), "Logged out successfully");

    assert!(app.revocations.is_token_blacklisted(&pair.access_token).await);
    assert!(app.revocations.is_token_blacklisted(&pair.refresh_token).await);

    // The blacklisted refresh token can no longer be used.
    let (status, body) = app
        .post_json("/auth/user/refresh", json!({ "refreshToken": pair.refresh_token }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(message(&body), "Token has been revoked");
}

#[tokio::test]
async fn logout_reports_success_even_when_the_store_is_down() {
    let app = TestApp::spawn();
    let user = app.seed_user("besteffort@example.com", true).await;
    let pair = app
        .state
        .tokens
        .issue_pair(&user.id, &user.email, user.role)
        .unwrap();

    app.revocations
        .fail_writes
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let (status, body) = app
        .post_json_bearer(
            "/auth/user/logout",
            &pair.access_token,
            json!({ "refreshToken": pair.refresh_token }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
}

#[tokio::test]
async fn admin_login_returns_tokens() {
    let app = TestApp::spawn();
    app.seed_admin("boss@example.com", Role::Admin, true).await;

    let (status, body) = app
        .post_json(
            "/auth/admin/login",
            json!({ "email": "boss@example.com", "password": TEST_PASSWORD }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["tokens"]["accessToken"].as_str().is_some());
}

#[tokio::test]
async fn health_endpoint_reports_store_status() {
    let app = TestApp::spawn();
    let request = axum::http::Request::builder()
        .uri("/health")
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}
