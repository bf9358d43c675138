use thiserror::Error;

use crate::error::AppError;
use crate::models::IdentityScope;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is deactivated")]
    AccountInactive,

    #[error("Account no longer exists")]
    AccountGone,

    #[error("Account not found")]
    AccountNotFound,

    #[error("Authentication header is missing")]
    AuthHeaderMissing,

    #[error("Invalid authentication type")]
    InvalidAuthType,

    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token")]
    MalformedToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Authentication failed")]
    AuthFailed,

    #[error("{} tokens have been revoked", .0.label())]
    IdentityRevoked(IdentityScope),

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Email already registered")]
    EmailAlreadyRegistered,

    #[error("Invalid verification code")]
    CodeMismatch,

    #[error("Code has expired, please request a new one")]
    CodeExpired,

    #[error("Too many attempts, please request a new code")]
    TooManyAttempts,

    #[error("Code has not been verified")]
    CodeNotVerified,

    #[error("Email error: {0}")]
    Email(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        use ServiceError::*;
        match err {
            Database(e) => AppError::Internal(anyhow::Error::new(e)),
            Redis(e) => AppError::Internal(anyhow::Error::new(e)),
            Internal(e) => AppError::Internal(e),
            Email(msg) => AppError::Internal(anyhow::anyhow!("email delivery failed: {}", msg)),
            EmailAlreadyRegistered => AppError::Conflict("Email already registered".to_string()),
            AccountNotFound => AppError::NotFound("Account not found".to_string()),
            Validation(msg) => AppError::BadRequest(msg),
            e @ (CodeMismatch | CodeExpired | TooManyAttempts | CodeNotVerified) => {
                AppError::BadRequest(e.to_string())
            }
            // Everything else is an authentication/authorization failure.
            e => AppError::Unauthorized(e.to_string()),
        }
    }
}
