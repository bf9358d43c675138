use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::TokenConfig;
use crate::models::Role;
use crate::services::ServiceError;

/// Fallback lifetime when an expiry string cannot be parsed: 7 days.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 604_800;

/// Lifetime of the special-purpose password-reset token.
pub const RESET_TOKEN_TTL_SECS: i64 = 900;

pub const PASSWORD_RESET_PURPOSE: &str = "password-reset";

/// Verification failure, keeping expiry distinguishable from tampering so
/// callers can surface different messages.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token malformed")]
    Malformed,
    #[error("token invalid: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => TokenError::Malformed,
            _ => TokenError::Invalid(err),
        }
    }
}

impl From<TokenError> for ServiceError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => ServiceError::TokenExpired,
            TokenError::Malformed => ServiceError::MalformedToken,
            TokenError::Invalid(_) => ServiceError::AuthFailed,
        }
    }
}

/// Which secret and lifetime a token was minted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims carried by both session tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Claims for the user password-reset token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetTokenClaims {
    pub sub: String,
    pub email: String,
    pub purpose: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues and verifies the stateless session tokens. Access and refresh
/// tokens use independent secrets and expiry policies.
#[derive(Clone)]
pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl TokenService {
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(config.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            access_ttl_secs: parse_expiry(&config.access_expiry),
            refresh_ttl_secs: parse_expiry(&config.refresh_expiry),
        }
    }

    /// Sign an access/refresh pair for the given subject.
    pub fn issue_pair(
        &self,
        subject_id: &str,
        email: &str,
        role: Role,
    ) -> Result<TokenPair, anyhow::Error> {
        let access_token = self.sign(subject_id, email, role, TokenKind::Access)?;
        let refresh_token = self.sign(subject_id, email, role, TokenKind::Refresh)?;
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    fn sign(
        &self,
        subject_id: &str,
        email: &str,
        role: Role,
        kind: TokenKind,
    ) -> Result<String, anyhow::Error> {
        let now = Utc::now().timestamp();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl_secs,
            TokenKind::Refresh => self.refresh_ttl_secs,
        };
        let claims = TokenClaims {
            sub: subject_id.to_string(),
            email: email.to_string(),
            role,
            iat: now,
            exp: now + ttl,
        };
        encode(&Header::new(Algorithm::HS256), &claims, self.encoding_key(kind))
            .map_err(|e| anyhow::anyhow!("Failed to encode token: {}", e))
    }

    /// Cryptographic signature check plus expiry check.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = decode::<TokenClaims>(token, self.decoding_key(kind), &validation)?;
        Ok(data.claims)
    }

    /// Non-verifying decode, used only to read claims (e.g. remaining
    /// lifetime during logout). Never an authorization decision.
    pub fn decode_unverified(&self, token: &str) -> Option<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.set_required_spec_claims::<&str>(&[]);
        decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
            .ok()
            .map(|data| data.claims)
    }

    /// Short-lived token required by the user password-reset flow.
    pub fn issue_reset_token(&self, subject_id: &str, email: &str) -> Result<String, anyhow::Error> {
        let now = Utc::now().timestamp();
        let claims = ResetTokenClaims {
            sub: subject_id.to_string(),
            email: email.to_string(),
            purpose: PASSWORD_RESET_PURPOSE.to_string(),
            iat: now,
            exp: now + RESET_TOKEN_TTL_SECS,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.access_encoding)
            .map_err(|e| anyhow::anyhow!("Failed to encode reset token: {}", e))
    }

    pub fn verify_reset_token(&self, token: &str) -> Result<ResetTokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = decode::<ResetTokenClaims>(token, &self.access_decoding, &validation)?;
        if data.claims.purpose != PASSWORD_RESET_PURPOSE {
            return Err(TokenError::Malformed);
        }
        Ok(data.claims)
    }

    /// Lifetime of the longest-lived token type; blanket revocations use
    /// this so they outlive every token the identity could present.
    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh_ttl_secs
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    fn encoding_key(&self, kind: TokenKind) -> &EncodingKey {
        match kind {
            TokenKind::Access => &self.access_encoding,
            TokenKind::Refresh => &self.refresh_encoding,
        }
    }

    fn decoding_key(&self, kind: TokenKind) -> &DecodingKey {
        match kind {
            TokenKind::Access => &self.access_decoding,
            TokenKind::Refresh => &self.refresh_decoding,
        }
    }
}

/// Parse an expiry string such as `"7d"` or `"12h"` into seconds. Bare
/// integers are taken as seconds. Anything unparseable falls back to
/// [`DEFAULT_TOKEN_TTL_SECS`].
pub fn parse_expiry(input: &str) -> i64 {
    let trimmed = input.trim();
    if !trimmed.is_ascii() || trimmed.is_empty() {
        tracing::warn!(input = %input, "Unparseable token expiry, using default");
        return DEFAULT_TOKEN_TTL_SECS;
    }

    if let Ok(secs) = trimmed.parse::<i64>() {
        if secs > 0 {
            return secs;
        }
    }

    let (value, unit) = trimmed.split_at(trimmed.len() - 1);
    let multiplier = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        "w" => 604_800,
        _ => {
            tracing::warn!(input = %input, "Unknown expiry unit, using default");
            return DEFAULT_TOKEN_TTL_SECS;
        }
    };

    match value.parse::<i64>() {
        Ok(v) if v > 0 => v * multiplier,
        _ => {
            tracing::warn!(input = %input, "Unparseable token expiry, using default");
            DEFAULT_TOKEN_TTL_SECS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESS_SECRET: &str = "test-access-secret-0123456789abcdef";
    const REFRESH_SECRET: &str = "test-refresh-secret-0123456789abcdef";

    fn test_service() -> TokenService {
        TokenService::new(&TokenConfig {
            access_secret: ACCESS_SECRET.to_string(),
            refresh_secret: REFRESH_SECRET.to_string(),
            access_expiry: "12h".to_string(),
            refresh_expiry: "7d".to_string(),
        })
    }

    fn encode_expired(secret: &str) -> String {
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            sub: "user_1".to_string(),
            email: "test@example.com".to_string(),
            role: Role::User,
            iat: now - 7_200,
            exp: now - 3_600,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn pair_round_trips_claims() {
        let service = test_service();
        let pair = service
            .issue_pair("user_1", "test@example.com", Role::User)
            .unwrap();

        let access = service.verify(&pair.access_token, TokenKind::Access).unwrap();
        assert_eq!(access.sub, "user_1");
        assert_eq!(access.email, "test@example.com");
        assert_eq!(access.role, Role::User);

        let refresh = service
            .verify(&pair.refresh_token, TokenKind::Refresh)
            .unwrap();
        assert_eq!(refresh.sub, "user_1");
    }

    #[test]
    fn secrets_are_independent() {
        let service = test_service();
        let pair = service
            .issue_pair("user_1", "test@example.com", Role::User)
            .unwrap();

        // An access token does not verify under the refresh secret.
        let err = service
            .verify(&pair.access_token, TokenKind::Refresh)
            .unwrap_err();
        assert!(matches!(err, TokenError::Malformed));
    }

    #[test]
    fn expired_token_is_distinguished() {
        let service = test_service();
        let token = encode_expired(ACCESS_SECRET);
        let err = service.verify(&token, TokenKind::Access).unwrap_err();
        assert!(matches!(err, TokenError::Expired));
    }

    #[test]
    fn garbage_token_is_malformed() {
        let service = test_service();
        let err = service
            .verify("not-a-token", TokenKind::Access)
            .unwrap_err();
        assert!(matches!(err, TokenError::Malformed));
    }

    #[test]
    fn decode_unverified_reads_expired_claims() {
        let service = test_service();
        let token = encode_expired(ACCESS_SECRET);
        let claims = service.decode_unverified(&token).unwrap();
        assert_eq!(claims.sub, "user_1");
        assert!(claims.exp < Utc::now().timestamp());
    }

    #[test]
    fn reset_token_requires_purpose() {
        let service = test_service();
        let token = service
            .issue_reset_token("user_1", "test@example.com")
            .unwrap();
        let claims = service.verify_reset_token(&token).unwrap();
        assert_eq!(claims.purpose, PASSWORD_RESET_PURPOSE);

        // A plain access token is not accepted as a reset token.
        let pair = service
            .issue_pair("user_1", "test@example.com", Role::User)
            .unwrap();
        assert!(service.verify_reset_token(&pair.access_token).is_err());
    }

    #[test]
    fn expiry_strings_parse_to_seconds() {
        assert_eq!(parse_expiry("45s"), 45);
        assert_eq!(parse_expiry("10m"), 600);
        assert_eq!(parse_expiry("12h"), 43_200);
        assert_eq!(parse_expiry("7d"), 604_800);
        assert_eq!(parse_expiry("2w"), 1_209_600);
        assert_eq!(parse_expiry("3600"), 3_600);
    }

    #[test]
    fn unparseable_expiry_falls_back_to_default() {
        assert_eq!(parse_expiry(""), DEFAULT_TOKEN_TTL_SECS);
        assert_eq!(parse_expiry("soon"), DEFAULT_TOKEN_TTL_SECS);
        assert_eq!(parse_expiry("-5d"), DEFAULT_TOKEN_TTL_SECS);
        assert_eq!(parse_expiry("7y"), DEFAULT_TOKEN_TTL_SECS);
    }
}
