use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::dtos::auth::{RegisterRequest, ResendVerificationRequest, VerifyEmailRequest};
use crate::dtos::ApiResponse;
use crate::error::AppError;
use crate::utils::ValidatedJson;
use crate::AppState;

pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let data = state.auth.register(req).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            "Registration successful. Please check your email for a verification code.",
            data,
        )),
    ))
}

/// Verification doubles as login: a successful code check returns a token
/// pair immediately.
pub async fn verify_email(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<VerifyEmailRequest>,
) -> Result<impl IntoResponse, AppError> {
    let data = state.auth.verify_email(&req.email, &req.code).await?;
    Ok((
        StatusCode::OK,
        Json(ApiResponse::success("Email verified successfully", data)),
    ))
}

pub async fn resend_verification(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ResendVerificationRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.auth.resend_verification(&req.email).await?;
    Ok((
        StatusCode::OK,
        Json(ApiResponse::message(
            "If the account exists and is unverified, a new code has been sent.",
        )),
    ))
}
