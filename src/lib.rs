pub mod config;
pub mod db;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::error::AppError;
use crate::middleware::{
    admin_auth_middleware, role_gate_middleware, user_auth_middleware, RoleGate,
};
use crate::models::Role;
use crate::services::{AuthService, EmailProvider, IdentityStore, RevocationStore, TokenService};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub identities: Arc<dyn IdentityStore>,
    pub revocations: Arc<dyn RevocationStore>,
    pub email: Arc<dyn EmailProvider>,
    pub tokens: TokenService,
    pub auth: AuthService,
}

const ADMIN_ONLY: &[Role] = &[Role::Admin];
const MODERATION: &[Role] = &[Role::Admin, Role::Moderator];

pub fn build_router(state: AppState) -> Router {
    // Guarded session routes, one guard instantiation per scope.
    let user_session = Router::new()
        .route("/auth/user/logout", post(handlers::auth::session::user_logout))
        .layer(from_fn_with_state(state.clone(), user_auth_middleware));

    let admin_session = Router::new()
        .route("/auth/admin/logout", post(handlers::auth::session::admin_logout))
        .layer(from_fn_with_state(state.clone(), admin_auth_middleware));

    // Role-gated administrative operations. The gate runs after the guard.
    let admin_ops = Router::new()
        .route("/auth/admin/create", post(handlers::admin::create_admin))
        .layer(from_fn_with_state(
            RoleGate::allow(ADMIN_ONLY),
            role_gate_middleware,
        ))
        .layer(from_fn_with_state(state.clone(), admin_auth_middleware));

    let moderation_ops = Router::new()
        .route("/admin/users/:user_id/suspend", post(handlers::admin::suspend_user))
        .route(
            "/admin/users/:user_id/reactivate",
            post(handlers::admin::reactivate_user),
        )
        .layer(from_fn_with_state(
            RoleGate::allow(MODERATION),
            role_gate_middleware,
        ))
        .layer(from_fn_with_state(state.clone(), admin_auth_middleware));

    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/user/register", post(handlers::auth::registration::register))
        .route("/auth/user/login", post(handlers::auth::session::user_login))
        .route(
            "/auth/user/verify-email",
            post(handlers::auth::registration::verify_email),
        )
        .route(
            "/auth/user/resend-verification",
            post(handlers::auth::registration::resend_verification),
        )
        .route(
            "/auth/user/forgot-password",
            post(handlers::auth::password::user_forgot_password),
        )
        .route(
            "/auth/user/verify-reset-code",
            post(handlers::auth::password::user_verify_reset_code),
        )
        .route(
            "/auth/user/reset-password",
            post(handlers::auth::password::user_reset_password),
        )
        .route("/auth/user/refresh", post(handlers::auth::session::user_refresh))
        .route("/auth/admin/login", post(handlers::auth::session::admin_login))
        .route(
            "/auth/admin/forgot-password",
            post(handlers::auth::password::admin_forgot_password),
        )
        .route(
            "/auth/admin/verify-reset-code",
            post(handlers::auth::password::admin_verify_reset_code),
        )
        .route(
            "/auth/admin/reset-password",
            post(handlers::auth::password::admin_reset_password),
        )
        .route("/auth/admin/refresh", post(handlers::auth::session::admin_refresh))
        .merge(user_session)
        .merge(admin_session)
        .merge(admin_ops)
        .merge(moderation_ops)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn cors_layer(config: &Config) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(
            config
                .security
                .allowed_origins
                .iter()
                .filter_map(|o| {
                    o.parse::<HeaderValue>()
                        .map_err(|e| {
                            tracing::error!("Invalid CORS origin '{}': {}", o, e);
                            e
                        })
                        .ok()
                })
                .collect::<Vec<HeaderValue>>(),
        )
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Service health check: both stores must respond.
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.identities.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Credential store health check failed");
        AppError::from(e)
    })?;

    state.revocations.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Revocation store health check failed");
        AppError::from(e)
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "checks": {
            "credential_store": "up",
            "revocation_store": "up"
        }
    })))
}
