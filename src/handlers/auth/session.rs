use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::dtos::auth::{LoginRequest, LogoutRequest, RefreshRequest};
use crate::dtos::ApiResponse;
use crate::error::AppError;
use crate::middleware::AuthIdentity;
use crate::models::IdentityScope;
use crate::utils::ValidatedJson;
use crate::AppState;

pub async fn user_login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let data = state.auth.login_user(req).await?;
    let message = if data.email_verified {
        "Login successful"
    } else {
        "Email not verified. A new verification code has been sent."
    };
    Ok((StatusCode::OK, Json(ApiResponse::success(message, data))))
}

pub async fn admin_login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let data = state.auth.login_admin(req).await?;
    Ok((
        StatusCode::OK,
        Json(ApiResponse::success("Login successful", data)),
    ))
}

pub async fn user_refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let data = state
        .auth
        .refresh(IdentityScope::User, &req.refresh_token)
        .await?;
    Ok((
        StatusCode::OK,
        Json(ApiResponse::success("Token refreshed", data)),
    ))
}

pub async fn admin_refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let data = state
        .auth
        .refresh(IdentityScope::Admin, &req.refresh_token)
        .await?;
    Ok((
        StatusCode::OK,
        Json(ApiResponse::success("Token refreshed", data)),
    ))
}

/// Logout is best-effort: the response is success even when the blacklist
/// write fails, since both tokens expire naturally.
pub async fn user_logout(
    State(state): State<AppState>,
    identity: AuthIdentity,
    Json(req): Json<LogoutRequest>,
) -> impl IntoResponse {
    let access_token = identity.token.unwrap_or_default();
    state.auth.logout(&access_token, &req.refresh_token).await;
    (
        StatusCode::OK,
        Json(ApiResponse::message("Logged out successfully")),
    )
}

pub async fn admin_logout(
    State(state): State<AppState>,
    identity: AuthIdentity,
    Json(req): Json<LogoutRequest>,
) -> impl IntoResponse {
    let access_token = identity.token.unwrap_or_default();
    state.auth.logout(&access_token, &req.refresh_token).await;
    (
        StatusCode::OK,
        Json(ApiResponse::message("Logged out successfully")),
    )
}
