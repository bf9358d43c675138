mod auth;
mod authorize;

pub use auth::{admin_auth_middleware, user_auth_middleware, AuthIdentity};
pub use authorize::{role_gate_middleware, RoleGate};
