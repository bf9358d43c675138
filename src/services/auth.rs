use std::sync::Arc;

use chrono::Utc;

use crate::dtos::auth::{
    AdminData, CreateAdminRequest, LoginData, LoginRequest, RegisterData, RegisterRequest,
    SessionData, VerifyCodeData,
};
use crate::models::{
    Admin, IdentityRecord, IdentityScope, IdentityStatus, OtpCode, OtpKind, Role, User,
    MAX_OTP_ATTEMPTS,
};
use crate::services::{
    EmailProvider, IdentityStore, RevocationStore, ServiceError, TokenKind, TokenService,
};
use crate::utils::{hash_password, verify_password, Password, PasswordHashString};

const USER_CODE_LEN: usize = 6;
const ADMIN_CODE_LEN: usize = 4;

/// Reject identities that must never authenticate: soft-deleted records are
/// gone, anything not active is inactive.
pub fn gate_account(record: &IdentityRecord) -> Result<(), ServiceError> {
    if record.is_deleted() || record.status() == IdentityStatus::Deleted {
        return Err(ServiceError::AccountGone);
    }
    if record.status() != IdentityStatus::Active {
        return Err(ServiceError::AccountInactive);
    }
    Ok(())
}

/// Orchestrates login, refresh, logout, registration and the two-phase
/// reset flows over the injected stores.
#[derive(Clone)]
pub struct AuthService {
    identities: Arc<dyn IdentityStore>,
    revocations: Arc<dyn RevocationStore>,
    email: Arc<dyn EmailProvider>,
    tokens: TokenService,
    otp_expiry_minutes: i64,
}

impl AuthService {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        revocations: Arc<dyn RevocationStore>,
        email: Arc<dyn EmailProvider>,
        tokens: TokenService,
        otp_expiry_minutes: i64,
    ) -> Self {
        Self {
            identities,
            revocations,
            email,
            tokens,
            otp_expiry_minutes,
        }
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<RegisterData, ServiceError> {
        if self
            .identities
            .find_user_by_email(&req.email)
            .await?
            .is_some()
        {
            return Err(ServiceError::EmailAlreadyRegistered);
        }

        let password_hash = hash_password(&Password::new(req.password))?;
        let user = User::new(req.email.clone(), Some(password_hash.into_string()), req.name);
        self.identities.insert_user(&user).await?;

        tracing::info!(user_id = %user.id, "User registered");

        self.issue_signup_code(&user.email).await?;

        Ok(RegisterData { user_id: user.id })
    }

    pub async fn login_user(&self, req: LoginRequest) -> Result<LoginData, ServiceError> {
        let user = self
            .identities
            .find_user_by_email(&req.email)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        gate_account(&IdentityRecord::User(user.clone()))?;
        check_password(user.password_hash.as_deref(), &req.password)?;

        if !user.email_verified {
            // Not an error: the caller gets a flag and a fresh code instead
            // of tokens.
            self.issue_signup_code(&user.email).await?;
            return Ok(LoginData {
                email_verified: false,
                tokens: None,
            });
        }

        let tokens = self.tokens.issue_pair(&user.id, &user.email, user.role)?;
        tracing::info!(user_id = %user.id, "User logged in");

        Ok(LoginData {
            email_verified: true,
            tokens: Some(tokens),
        })
    }

    pub async fn login_admin(&self, req: LoginRequest) -> Result<SessionData, ServiceError> {
        let admin = self
            .identities
            .find_admin_by_email(&req.email)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        gate_account(&IdentityRecord::Admin(admin.clone()))?;
        check_password(admin.password_hash.as_deref(), &req.password)?;

        let tokens = self.tokens.issue_pair(&admin.id, &admin.email, admin.role)?;
        tracing::info!(admin_id = %admin.id, "Admin logged in");

        Ok(SessionData { tokens })
    }

    /// Issue a fresh pair off a valid refresh token. The presented refresh
    /// token stays usable until it expires; there is no rotation-reuse
    /// detection.
    pub async fn refresh(
        &self,
        scope: IdentityScope,
        refresh_token: &str,
    ) -> Result<SessionData, ServiceError> {
        if self.revocations.is_token_blacklisted(refresh_token).await {
            return Err(ServiceError::TokenRevoked);
        }

        let claims = self.tokens.verify(refresh_token, TokenKind::Refresh)?;
        if claims.sub.is_empty() {
            return Err(ServiceError::InvalidToken);
        }

        if self
            .revocations
            .is_identity_blacklisted(&claims.sub, scope)
            .await
        {
            return Err(ServiceError::IdentityRevoked(scope));
        }

        let record = self
            .identities
            .find_identity_by_id(scope, &claims.sub)
            .await?
            .ok_or(ServiceError::AccountGone)?;
        gate_account(&record)?;

        let tokens = self
            .tokens
            .issue_pair(record.id(), record.email(), record.role())?;

        Ok(SessionData { tokens })
    }

    /// Best-effort revocation of both presented tokens. Never fails: a
    /// token that cannot be blacklisted expires naturally, so failures are
    /// logged and the caller still reports success.
    pub async fn logout(&self, access_token: &str, refresh_token: &str) {
        for (label, token) in [("access", access_token), ("refresh", refresh_token)] {
            if token.is_empty() {
                continue;
            }
            let Some(claims) = self.tokens.decode_unverified(token) else {
                tracing::debug!(token = label, "Skipping blacklist of undecodable token");
                continue;
            };

            let remaining = claims.exp - Utc::now().timestamp();
            if remaining <= 0 {
                continue;
            }

            if let Err(e) = self.revocations.blacklist_token(token, remaining).await {
                tracing::warn!(error = %e, token = label, "Failed to blacklist token during logout");
            } else {
                tracing::info!(subject = %claims.sub, token = label, "Token blacklisted on logout");
            }
        }
    }

    /// Upsert a reset code and email it. Unknown addresses succeed silently
    /// so the endpoint cannot be used to enumerate accounts.
    pub async fn forgot_password(
        &self,
        scope: IdentityScope,
        email: &str,
    ) -> Result<(), ServiceError> {
        let Some(record) = self.identities.find_identity_by_email(scope, email).await? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(());
        };

        if record.is_deleted() || record.status() == IdentityStatus::Deleted {
            return Ok(());
        }

        let len = match scope {
            IdentityScope::User => USER_CODE_LEN,
            IdentityScope::Admin => ADMIN_CODE_LEN,
        };
        let code = OtpCode::generate_code(len);
        let otp = OtpCode::new(email, reset_kind(scope), code.clone(), self.otp_expiry_minutes);
        self.identities.upsert_otp(&otp).await?;

        if let Err(e) = self.email.send_password_reset_code(email, &code).await {
            tracing::warn!(error = %e, "Failed to send password reset email");
        }

        tracing::info!(identity = %record.id(), scope = scope.as_str(), "Password reset requested");
        Ok(())
    }

    /// Phase one of the reset: check the code. The user flow additionally
    /// mints the short-lived token that `reset_password_user` requires.
    pub async fn verify_reset_code(
        &self,
        scope: IdentityScope,
        email: &str,
        code: &str,
    ) -> Result<VerifyCodeData, ServiceError> {
        let kind = reset_kind(scope);
        self.check_code(email, kind, code).await?;
        self.identities.mark_otp_verified(email, kind).await?;

        let reset_token = match scope {
            IdentityScope::User => {
                let user = self
                    .identities
                    .find_user_by_email(email)
                    .await?
                    .ok_or(ServiceError::AccountGone)?;
                Some(self.tokens.issue_reset_token(&user.id, email)?)
            }
            IdentityScope::Admin => None,
        };

        Ok(VerifyCodeData {
            verified: true,
            reset_token,
        })
    }

    pub async fn reset_password_user(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        let claims = self.tokens.verify_reset_token(token)?;
        self.finish_reset(IdentityScope::User, &claims.email, &claims.sub, new_password)
            .await
    }

    pub async fn reset_password_admin(
        &self,
        email: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        let admin = self
            .identities
            .find_admin_by_email(email)
            .await?
            .ok_or(ServiceError::AccountGone)?;
        let admin_id = admin.id.clone();
        self.finish_reset(IdentityScope::Admin, email, &admin_id, new_password)
            .await
    }

    async fn finish_reset(
        &self,
        scope: IdentityScope,
        email: &str,
        identity_id: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        let kind = reset_kind(scope);
        let otp = self
            .identities
            .find_otp(email, kind)
            .await?
            .ok_or(ServiceError::CodeNotVerified)?;

        if otp.is_expired() {
            self.identities.delete_otp(email, kind).await?;
            return Err(ServiceError::CodeExpired);
        }
        if !otp.is_verified() {
            return Err(ServiceError::CodeNotVerified);
        }

        let password_hash = hash_password(&Password::new(new_password.to_string()))?;
        self.identities
            .set_identity_password(scope, identity_id, password_hash.as_str())
            .await?;
        self.identities.delete_otp(email, kind).await?;

        tracing::info!(identity = %identity_id, scope = scope.as_str(), "Password reset successful");
        Ok(())
    }

    /// Confirm the signup code. Verification doubles as login, so a pair is
    /// issued immediately.
    pub async fn verify_email(&self, email: &str, code: &str) -> Result<LoginData, ServiceError> {
        self.check_code(email, OtpKind::Signup, code).await?;

        let user = self
            .identities
            .find_user_by_email(email)
            .await?
            .ok_or(ServiceError::AccountGone)?;

        self.identities.mark_user_email_verified(&user.id).await?;
        self.identities.delete_otp(email, OtpKind::Signup).await?;

        let tokens = self.tokens.issue_pair(&user.id, &user.email, user.role)?;
        tracing::info!(user_id = %user.id, "Email verified");

        Ok(LoginData {
            email_verified: true,
            tokens: Some(tokens),
        })
    }

    /// Fresh signup code iff the account exists and is still unverified;
    /// the response is success either way.
    pub async fn resend_verification(&self, email: &str) -> Result<(), ServiceError> {
        match self.identities.find_user_by_email(email).await? {
            Some(user) if !user.email_verified => self.issue_signup_code(email).await,
            _ => Ok(()),
        }
    }

    pub async fn create_admin(&self, req: CreateAdminRequest) -> Result<AdminData, ServiceError> {
        if req.role == Role::User {
            return Err(ServiceError::Validation(
                "Admin accounts cannot carry the USER role".to_string(),
            ));
        }

        if self
            .identities
            .find_admin_by_email(&req.email)
            .await?
            .is_some()
        {
            return Err(ServiceError::EmailAlreadyRegistered);
        }

        let password_hash = hash_password(&Password::new(req.password))?;
        let admin = Admin::new(
            req.email,
            Some(password_hash.into_string()),
            req.role,
            req.is_super,
        );
        self.identities.insert_admin(&admin).await?;

        tracing::info!(admin_id = %admin.id, role = ?admin.role, "Admin created");
        Ok(AdminData { admin_id: admin.id })
    }

    /// Deactivate the account and blanket-revoke every token it could
    /// present. The TTL covers the longest-lived token type.
    pub async fn suspend_user(&self, user_id: &str) -> Result<(), ServiceError> {
        self.identities
            .find_user_by_id(user_id)
            .await?
            .ok_or(ServiceError::AccountNotFound)?;

        self.identities
            .set_user_status(user_id, IdentityStatus::Deactivated)
            .await?;
        self.revocations
            .blacklist_identity(user_id, IdentityScope::User, self.tokens.refresh_ttl_secs())
            .await?;

        tracing::info!(user_id = %user_id, "User suspended");
        Ok(())
    }

    pub async fn reactivate_user(&self, user_id: &str) -> Result<(), ServiceError> {
        self.identities
            .find_user_by_id(user_id)
            .await?
            .ok_or(ServiceError::AccountNotFound)?;

        self.identities
            .set_user_status(user_id, IdentityStatus::Active)
            .await?;
        self.revocations
            .clear_identity(user_id, IdentityScope::User)
            .await?;

        tracing::info!(user_id = %user_id, "User reactivated");
        Ok(())
    }

    /// Expiry, attempt-cap and match checks for a stored code. Expired and
    /// capped records are deleted so the client has to start over.
    async fn check_code(
        &self,
        email: &str,
        kind: OtpKind,
        code: &str,
    ) -> Result<(), ServiceError> {
        let otp = self
            .identities
            .find_otp(email, kind)
            .await?
            .ok_or(ServiceError::CodeMismatch)?;

        if otp.is_expired() {
            self.identities.delete_otp(email, kind).await?;
            return Err(ServiceError::CodeExpired);
        }

        if otp.attempts_exhausted() {
            self.identities.delete_otp(email, kind).await?;
            return Err(ServiceError::TooManyAttempts);
        }

        if otp.code != code {
            self.identities.record_otp_attempt(email, kind).await?;
            if otp.attempts + 1 >= MAX_OTP_ATTEMPTS {
                self.identities.delete_otp(email, kind).await?;
                return Err(ServiceError::TooManyAttempts);
            }
            return Err(ServiceError::CodeMismatch);
        }

        Ok(())
    }

    async fn issue_signup_code(&self, email: &str) -> Result<(), ServiceError> {
        let code = OtpCode::generate_code(USER_CODE_LEN);
        let otp = OtpCode::new(email, OtpKind::Signup, code.clone(), self.otp_expiry_minutes);
        self.identities.upsert_otp(&otp).await?;

        if let Err(e) = self.email.send_verification_code(email, &code).await {
            tracing::warn!(error = %e, "Failed to send verification email");
        }
        Ok(())
    }
}

fn reset_kind(scope: IdentityScope) -> OtpKind {
    match scope {
        IdentityScope::User => OtpKind::UserPasswordReset,
        IdentityScope::Admin => OtpKind::AdminPasswordReset,
    }
}

fn check_password(stored_hash: Option<&str>, presented: &str) -> Result<(), ServiceError> {
    let hash = stored_hash.ok_or(ServiceError::InvalidCredentials)?;
    verify_password(
        &Password::new(presented.to_string()),
        &PasswordHashString::new(hash.to_string()),
    )
    .map_err(|_| ServiceError::InvalidCredentials)
}
