//! One-time codes for email verification and password reset.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Attempt cap. A record that reaches it is deleted and a fresh code must
/// be requested.
pub const MAX_OTP_ATTEMPTS: i32 = 3;

/// Discriminates both the purpose and the identity kind, so a user reset
/// code can never satisfy the admin flow for the same address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpKind {
    Signup,
    UserPasswordReset,
    AdminPasswordReset,
}

impl OtpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpKind::Signup => "signup",
            OtpKind::UserPasswordReset => "user_password_reset",
            OtpKind::AdminPasswordReset => "admin_password_reset",
        }
    }
}

/// At most one record exists per `(email, kind)`; a new request replaces
/// the previous record rather than accumulating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpCode {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub kind: OtpKind,
    pub code: String,
    pub attempts: i32,
    pub verified_at: Option<mongodb::bson::DateTime>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl OtpCode {
    pub fn new(email: &str, kind: OtpKind, code: String, expiry_minutes: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            kind,
            code,
            attempts: 0,
            verified_at: None,
            expires_at: now + Duration::minutes(expiry_minutes),
            created_at: now,
        }
    }

    /// Generate a numeric code of the given length.
    pub fn generate_code(len: usize) -> String {
        let mut rng = rand::thread_rng();
        (0..len)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect()
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    pub fn is_verified(&self) -> bool {
        self.verified_at.is_some()
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= MAX_OTP_ATTEMPTS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_numeric_and_sized() {
        for len in [4, 6] {
            let code = OtpCode::generate_code(len);
            assert_eq!(code.len(), len);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn fresh_code_is_valid() {
        let otp = OtpCode::new("a@b.c", OtpKind::Signup, "123456".to_string(), 5);
        assert!(!otp.is_expired());
        assert!(!otp.is_verified());
        assert!(!otp.attempts_exhausted());
    }

    #[test]
    fn negative_expiry_window_is_expired() {
        let otp = OtpCode::new("a@b.c", OtpKind::UserPasswordReset, "123456".to_string(), -1);
        assert!(otp.is_expired());
    }

    #[test]
    fn attempt_cap_is_reached_at_three() {
        let mut otp = OtpCode::new("a@b.c", OtpKind::AdminPasswordReset, "1234".to_string(), 5);
        otp.attempts = 2;
        assert!(!otp.attempts_exhausted());
        otp.attempts = 3;
        assert!(otp.attempts_exhausted());
    }
}
