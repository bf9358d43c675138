use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::dtos::auth::{
    AdminResetPasswordRequest, ForgotPasswordRequest, ResetPasswordRequest, VerifyResetCodeRequest,
};
use crate::dtos::ApiResponse;
use crate::error::AppError;
use crate::models::IdentityScope;
use crate::utils::ValidatedJson;
use crate::AppState;

pub async fn user_forgot_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .auth
        .forgot_password(IdentityScope::User, &req.email)
        .await?;
    Ok(reset_requested())
}

pub async fn admin_forgot_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .auth
        .forgot_password(IdentityScope::Admin, &req.email)
        .await?;
    Ok(reset_requested())
}

pub async fn user_verify_reset_code(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<VerifyResetCodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let data = state
        .auth
        .verify_reset_code(IdentityScope::User, &req.email, &req.code)
        .await?;
    Ok((
        StatusCode::OK,
        Json(ApiResponse::success("Code verified", data)),
    ))
}

pub async fn admin_verify_reset_code(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<VerifyResetCodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let data = state
        .auth
        .verify_reset_code(IdentityScope::Admin, &req.email, &req.code)
        .await?;
    Ok((
        StatusCode::OK,
        Json(ApiResponse::success("Code verified", data)),
    ))
}

pub async fn user_reset_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .auth
        .reset_password_user(&req.token, &req.new_password)
        .await?;
    Ok((
        StatusCode::OK,
        Json(ApiResponse::message("Password reset successful")),
    ))
}

pub async fn admin_reset_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<AdminResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .auth
        .reset_password_admin(&req.email, &req.new_password)
        .await?;
    Ok((
        StatusCode::OK,
        Json(ApiResponse::message("Password reset successful")),
    ))
}

fn reset_requested() -> (StatusCode, Json<ApiResponse<()>>) {
    (
        StatusCode::OK,
        Json(ApiResponse::message(
            "If the account exists, a reset code has been sent.",
        )),
    )
}
