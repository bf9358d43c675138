use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::middleware::AuthIdentity;
use crate::models::Role;
use crate::services::ServiceError;

/// Per-route set of allowed roles, evaluated after the guard. An empty set
/// means no restriction.
#[derive(Clone)]
pub struct RoleGate {
    allowed: &'static [Role],
}

impl RoleGate {
    pub fn allow(roles: &'static [Role]) -> Self {
        Self { allowed: roles }
    }
}

pub async fn role_gate_middleware(
    State(gate): State<RoleGate>,
    req: Request,
    next: Next,
) -> Response {
    if gate.allowed.is_empty() {
        return next.run(req).await;
    }

    let identity = req.extensions().get::<AuthIdentity>();
    if identity
        .map(|i| gate.allowed.contains(&i.role))
        .unwrap_or(false)
    {
        return next.run(req).await;
    }

    // Audit signal, not a retryable condition.
    let identity_id = identity.map(|i| i.id.as_str()).unwrap_or("unknown");
    tracing::warn!(
        identity = %identity_id,
        ip = %source_ip(&req),
        "Rejected request with insufficient permissions"
    );

    AppError::from(ServiceError::InsufficientPermissions).into_response()
}

fn source_ip(req: &Request) -> String {
    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|c| c.0.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}
