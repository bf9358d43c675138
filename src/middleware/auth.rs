use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::Engine;

use crate::error::AppError;
use crate::models::{IdentityScope, Role};
use crate::services::{gate_account, ServiceError, TokenKind};
use crate::utils::{verify_password, Password, PasswordHashString};
use crate::AppState;

/// Identity attached to the request after successful authentication.
#[derive(Debug, Clone)]
pub struct AuthIdentity {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub scope: IdentityScope,
    /// Raw bearer token; None on the Basic-auth path.
    pub token: Option<String>,
}

/// Guard for regular identities. Honors the Basic-auth fallback when it is
/// feature-flagged on.
pub async fn user_auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    authenticate(state, IdentityScope::User, req, next).await
}

/// Guard for privileged identities. Never takes the Basic-auth path.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    authenticate(state, IdentityScope::Admin, req, next).await
}

async fn authenticate(
    state: AppState,
    scope: IdentityScope,
    mut req: Request,
    next: Next,
) -> Response {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_owned());
    match run_guard(&state, scope, header_value).await {
        Ok(identity) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(err) => AppError::from(err).into_response(),
    }
}

/// The per-request authentication state machine, shared by both scopes.
async fn run_guard(
    state: &AppState,
    scope: IdentityScope,
    header_value: Option<String>,
) -> Result<AuthIdentity, ServiceError> {
    let header_value = header_value.ok_or(ServiceError::AuthHeaderMissing)?;

    let (scheme, value) = header_value
        .split_once(' ')
        .ok_or(ServiceError::AuthHeaderMissing)?;
    let value = value.trim();

    let basic_allowed = scope == IdentityScope::User && state.config.security.basic_auth_enabled;
    if scheme.eq_ignore_ascii_case("Basic") && basic_allowed {
        return basic_auth(state, scope, value).await;
    }

    if !scheme.eq_ignore_ascii_case("Bearer") || value.is_empty() {
        return Err(ServiceError::InvalidAuthType);
    }
    let token = value;

    // Revocation is checked before the (more expensive) signature check.
    if state.revocations.is_token_blacklisted(token).await {
        return Err(ServiceError::TokenRevoked);
    }

    let claims = state.tokens.verify(token, TokenKind::Access)?;
    if claims.sub.is_empty() {
        return Err(ServiceError::InvalidToken);
    }

    if state
        .revocations
        .is_identity_blacklisted(&claims.sub, scope)
        .await
    {
        return Err(ServiceError::IdentityRevoked(scope));
    }

    let record = state
        .identities
        .find_identity_by_id(scope, &claims.sub)
        .await?
        .ok_or(ServiceError::AccountGone)?;
    gate_account(&record)?;

    Ok(AuthIdentity {
        id: record.id().to_string(),
        email: record.email().to_string(),
        role: record.role(),
        scope,
        token: Some(token.to_string()),
    })
}

async fn basic_auth(
    state: &AppState,
    scope: IdentityScope,
    value: &str,
) -> Result<AuthIdentity, ServiceError> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(value)
        .map_err(|_| ServiceError::InvalidAuthType)?;
    let decoded = String::from_utf8(decoded).map_err(|_| ServiceError::InvalidAuthType)?;
    let (email, password) = decoded
        .split_once(':')
        .ok_or(ServiceError::InvalidAuthType)?;

    let record = state
        .identities
        .find_identity_by_email(scope, email)
        .await?
        .ok_or(ServiceError::InvalidCredentials)?;
    gate_account(&record)?;

    let hash = record
        .password_hash()
        .ok_or(ServiceError::InvalidCredentials)?;
    verify_password(
        &Password::new(password.to_string()),
        &PasswordHashString::new(hash.to_string()),
    )
    .map_err(|_| ServiceError::InvalidCredentials)?;

    Ok(AuthIdentity {
        id: record.id().to_string(),
        email: record.email().to_string(),
        role: record.role(),
        scope,
        token: None,
    })
}

/// Extractor for handlers running behind a guard.
#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthIdentity>().cloned().ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "auth identity missing from request extensions"
            ))
        })
    }
}
