use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, Message,
    SmtpTransport, Transport,
};

use crate::config::SmtpConfig;
use crate::services::ServiceError;

/// Outbound-mail collaborator. Auth flows treat delivery as fire-and-forget:
/// failures are logged by the caller and never block a response.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_verification_code(&self, to_email: &str, code: &str)
        -> Result<(), ServiceError>;

    async fn send_password_reset_code(
        &self,
        to_email: &str,
        code: &str,
    ) -> Result<(), ServiceError>;
}

#[derive(Clone)]
pub struct SmtpEmailService {
    mailer: SmtpTransport,
    from_email: String,
}

impl SmtpEmailService {
    pub fn new(config: &SmtpConfig) -> Result<Self, ServiceError> {
        let creds = Credentials::new(config.user.clone(), config.password.clone());

        let mailer = SmtpTransport::relay(&config.host)
            .map_err(|e| ServiceError::Email(e.to_string()))?
            .credentials(creds)
            .port(587)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.host, "Email service initialized");

        Ok(Self {
            mailer,
            from_email: config.user.clone(),
        })
    }

    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        body: String,
    ) -> Result<(), ServiceError> {
        let email = Message::builder()
            .from(
                self.from_email
                    .parse()
                    .map_err(|e: lettre::address::AddressError| {
                        ServiceError::Email(e.to_string())
                    })?,
            )
            .to(to_email
                .parse()
                .map_err(|e: lettre::address::AddressError| ServiceError::Email(e.to_string()))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| ServiceError::Email(e.to_string()))?;

        // The blocking SMTP client must not stall the async runtime.
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| ServiceError::Email(e.to_string()))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %to_email, subject = %subject, "Email sent successfully");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, to = %to_email, "Failed to send email");
                Err(ServiceError::Email(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl EmailProvider for SmtpEmailService {
    async fn send_verification_code(
        &self,
        to_email: &str,
        code: &str,
    ) -> Result<(), ServiceError> {
        let body = format!(
            "Welcome!\n\nYour email verification code is: {}\n\nIt expires shortly. If you didn't request this, please ignore this email.",
            code
        );
        self.send_email(to_email, "Verify Your Email Address", body)
            .await
    }

    async fn send_password_reset_code(
        &self,
        to_email: &str,
        code: &str,
    ) -> Result<(), ServiceError> {
        let body = format!(
            "We received a request to reset your password.\n\nYour reset code is: {}\n\nIt expires shortly. If you didn't request this, please ignore this email.",
            code
        );
        self.send_email(to_email, "Reset Your Password", body).await
    }
}

/// What kind of message a mock send represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailKind {
    Verification,
    PasswordReset,
}

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub kind: EmailKind,
    pub code: String,
}

/// Recording mock, so tests can observe that a flow triggered a send.
#[derive(Default)]
pub struct MockEmailService {
    pub sent: Mutex<Vec<SentEmail>>,
}

impl MockEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, to: &str, kind: EmailKind, code: &str) -> Result<(), ServiceError> {
        self.sent
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("mutex poisoned: {}", e)))?
            .push(SentEmail {
                to: to.to_string(),
                kind,
                code: code.to_string(),
            });
        Ok(())
    }
}

#[async_trait]
impl EmailProvider for MockEmailService {
    async fn send_verification_code(
        &self,
        to_email: &str,
        code: &str,
    ) -> Result<(), ServiceError> {
        self.record(to_email, EmailKind::Verification, code)
    }

    async fn send_password_reset_code(
        &self,
        to_email: &str,
        code: &str,
    ) -> Result<(), ServiceError> {
        self.record(to_email, EmailKind::PasswordReset, code)
    }
}
