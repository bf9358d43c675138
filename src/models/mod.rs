pub mod identity;
pub mod otp_code;

pub use identity::{Admin, IdentityRecord, IdentityScope, IdentityStatus, Role, User};
pub use otp_code::{OtpCode, OtpKind, MAX_OTP_ATTEMPTS};
