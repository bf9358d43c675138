use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::dtos::auth::CreateAdminRequest;
use crate::dtos::ApiResponse;
use crate::error::AppError;
use crate::utils::ValidatedJson;
use crate::AppState;

pub async fn create_admin(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateAdminRequest>,
) -> Result<impl IntoResponse, AppError> {
    let data = state.auth.create_admin(req).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Admin created", data)),
    ))
}

pub async fn suspend_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.auth.suspend_user(&user_id).await?;
    Ok((
        StatusCode::OK,
        Json(ApiResponse::message("User suspended")),
    ))
}

pub async fn reactivate_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.auth.reactivate_user(&user_id).await?;
    Ok((
        StatusCode::OK,
        Json(ApiResponse::message("User reactivated")),
    ))
}
