//! Business-logic services: tokens, revocation, credential storage, email,
//! and the auth flows that orchestrate them.

mod auth;
mod email;
pub mod error;
mod jwt;
mod revocation;
mod store;

pub use auth::{gate_account, AuthService};
pub use email::{EmailKind, EmailProvider, MockEmailService, SentEmail, SmtpEmailService};
pub use error::ServiceError;
pub use jwt::{
    parse_expiry, ResetTokenClaims, TokenClaims, TokenError, TokenKind, TokenPair, TokenService,
    DEFAULT_TOKEN_TTL_SECS, PASSWORD_RESET_PURPOSE, RESET_TOKEN_TTL_SECS,
};
pub use revocation::{MemoryRevocationStore, RedisRevocationStore, RevocationStore};
pub use store::{IdentityStore, MemoryIdentityStore, MongoIdentityStore};
