mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{TestApp, TEST_PASSWORD};
use identity_service::models::{IdentityScope, Role};
use identity_service::services::RevocationStore;

fn message(body: &serde_json::Value) -> &str {
    body["message"].as_str().unwrap_or("")
}

#[tokio::test]
async fn moderator_cannot_create_admins() {
    let app = TestApp::spawn();
    let moderator = app
        .seed_admin("mod@example.com", Role::Moderator, false)
        .await;
    let pair = app
        .state
        .tokens
        .issue_pair(&moderator.id, &moderator.email, moderator.role)
        .unwrap();

    let (status, body) = app
        .post_json_bearer(
            "/auth/admin/create",
            &pair.access_token,
            json!({ "email": "newadmin@example.com", "password": "strongpass123", "role": "ADMIN" }),
        )
        .await;

    // 401, not 403, for role mismatches.
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(message(&body), "Insufficient permissions");
}

#[tokio::test]
async fn admin_can_create_admins() {
    let app = TestApp::spawn();
    let admin = app.seed_admin("head@example.com", Role::Admin, true).await;
    let pair = app
        .state
        .tokens
        .issue_pair(&admin.id, &admin.email, admin.role)
        .unwrap();

    let (status, body) = app
        .post_json_bearer(
            "/auth/admin/create",
            &pair.access_token,
            json!({ "email": "second@example.com", "password": "strongpass123", "role": "MODERATOR" }),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(body["data"]["adminId"].as_str().is_some());

    // The new moderator can log in.
    let (status, _) = app
        .post_json(
            "/auth/admin/login",
            json!({ "email": "second@example.com", "password": "strongpass123" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn admin_creation_rejects_the_user_role() {
    let app = TestApp::spawn();
    let admin = app.seed_admin("head2@example.com", Role::Admin, true).await;
    let pair = app
        .state
        .tokens
        .issue_pair(&admin.id, &admin.email, admin.role)
        .unwrap();

    let (status, _) = app
        .post_json_bearer(
            "/auth/admin/create",
            &pair.access_token,
            json!({ "email": "odd@example.com", "password": "strongpass123", "role": "USER" }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unauthenticated_requests_never_reach_the_gate() {
    let app = TestApp::spawn();

    let (status, body) = app
        .post_json(
            "/auth/admin/create",
            json!({ "email": "x@example.com", "password": "strongpass123", "role": "ADMIN" }),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(message(&body), "Authentication header is missing");
}

#[tokio::test]
async fn suspension_revokes_and_reactivation_restores() {
    let app = TestApp::spawn();
    let moderator = app
        .seed_admin("susp-mod@example.com", Role::Moderator, false)
        .await;
    let user = app.seed_user("victim@example.com", true).await;

    let admin_pair = app
        .state
        .tokens
        .issue_pair(&moderator.id, &moderator.email, moderator.role)
        .unwrap();
    let user_pair = app
        .state
        .tokens
        .issue_pair(&user.id, &user.email, user.role)
        .unwrap();

    // Moderators may suspend.
    let (status, _) = app
        .post_json_bearer(
            &format!("/admin/users/{}/suspend", user.id),
            &admin_pair.access_token,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Every outstanding user token is covered by the blanket entry.
    assert!(
        app.revocations
            .is_identity_blacklisted(&user.id, IdentityScope::User)
            .await
    );

    let (status, body) = app
        .post_json(
            "/auth/user/login",
            json!({ "email": "victim@example.com", "password": TEST_PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(message(&body), "Account is deactivated");

    let (status, body) = app
        .post_json(
            "/auth/user/refresh",
            json!({ "refreshToken": user_pair.refresh_token }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(message(&body), "User tokens have been revoked");

    // Reactivation clears the blanket entry and login works again.
    let (status, _) = app
        .post_json_bearer(
            &format!("/admin/users/{}/reactivate", user.id),
            &admin_pair.access_token,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    assert!(
        !app.revocations
            .is_identity_blacklisted(&user.id, IdentityScope::User)
            .await
    );

    let (status, _) = app
        .post_json(
            "/auth/user/login",
            json!({ "email": "victim@example.com", "password": TEST_PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn suspending_a_missing_user_is_not_found() {
    let app = TestApp::spawn();
    let admin = app.seed_admin("adm404@example.com", Role::Admin, false).await;
    let pair = app
        .state
        .tokens
        .issue_pair(&admin.id, &admin.email, admin.role)
        .unwrap();

    let (status, _) = app
        .post_json_bearer(
            "/admin/users/no-such-user/suspend",
            &pair.access_token,
            json!({}),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn user_tokens_do_not_pass_the_admin_guard() {
    let app = TestApp::spawn();
    let user = app.seed_user("justauser@example.com", true).await;
    let pair = app
        .state
        .tokens
        .issue_pair(&user.id, &user.email, user.role)
        .unwrap();

    // The token verifies, but no admin record exists for the subject.
    let (status, body) = app
        .post_json_bearer(
            "/auth/admin/create",
            &pair.access_token,
            json!({ "email": "x@example.com", "password": "strongpass123", "role": "ADMIN" }),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(message(&body), "Account no longer exists");
}
