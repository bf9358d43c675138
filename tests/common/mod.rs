//! Test helpers: an app instance wired to in-memory stores.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::util::ServiceExt;

use identity_service::{
    build_router,
    config::{
        Config, Environment, MongoConfig, OtpConfig, RedisConfig, SecurityConfig, SmtpConfig,
        TokenConfig,
    },
    models::{Admin, IdentityStatus, Role, User},
    services::{
        AuthService, EmailProvider, IdentityStore, MemoryIdentityStore, MemoryRevocationStore,
        MockEmailService, RevocationStore, TokenService,
    },
    utils::{hash_password, Password},
    AppState,
};

pub const ACCESS_SECRET: &str = "test-access-secret-0123456789abcdef";
pub const REFRESH_SECRET: &str = "test-refresh-secret-0123456789abcdef";
pub const TEST_PASSWORD: &str = "correct-horse-battery";

pub fn test_config() -> Config {
    Config {
        environment: Environment::Dev,
        service_name: "identity-service".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        port: 8080,
        mongodb: MongoConfig {
            uri: "mongodb://unused".to_string(),
            database: "unused".to_string(),
        },
        redis: RedisConfig {
            url: "redis://unused".to_string(),
        },
        tokens: TokenConfig {
            access_secret: ACCESS_SECRET.to_string(),
            refresh_secret: REFRESH_SECRET.to_string(),
            access_expiry: "12h".to_string(),
            refresh_expiry: "7d".to_string(),
        },
        security: SecurityConfig {
            basic_auth_enabled: false,
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        otp: OtpConfig { expiry_minutes: 5 },
        smtp: SmtpConfig {
            host: "unused".to_string(),
            user: "noreply@example.com".to_string(),
            password: "unused".to_string(),
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub identities: Arc<MemoryIdentityStore>,
    pub revocations: Arc<MemoryRevocationStore>,
    pub email: Arc<MockEmailService>,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::spawn_with(|_| {})
    }

    pub fn spawn_with(mutate: impl FnOnce(&mut Config)) -> Self {
        let mut config = test_config();
        mutate(&mut config);

        let identities = Arc::new(MemoryIdentityStore::new());
        let revocations = Arc::new(MemoryRevocationStore::new());
        let email = Arc::new(MockEmailService::new());

        let identities_dyn: Arc<dyn IdentityStore> = identities.clone();
        let revocations_dyn: Arc<dyn RevocationStore> = revocations.clone();
        let email_dyn: Arc<dyn EmailProvider> = email.clone();

        let tokens = TokenService::new(&config.tokens);
        let auth = AuthService::new(
            identities_dyn.clone(),
            revocations_dyn.clone(),
            email_dyn.clone(),
            tokens.clone(),
            config.otp.expiry_minutes,
        );

        let state = AppState {
            config,
            identities: identities_dyn,
            revocations: revocations_dyn,
            email: email_dyn,
            tokens,
            auth,
        };

        let router = build_router(state.clone());

        Self {
            router,
            state,
            identities,
            revocations,
            email,
        }
    }

    pub async fn seed_user(&self, email: &str, verified: bool) -> User {
        let hash = hash_password(&Password::new(TEST_PASSWORD.to_string())).unwrap();
        let mut user = User::new(email.to_string(), Some(hash.into_string()), None);
        user.email_verified = verified;
        self.identities.insert_user(&user).await.unwrap();
        user
    }

    pub async fn seed_user_with_status(
        &self,
        email: &str,
        status: IdentityStatus,
        is_deleted: bool,
    ) -> User {
        let mut user = self.seed_user(email, true).await;
        user.status = status;
        user.is_deleted = is_deleted;
        self.identities.insert_user(&user).await.unwrap();
        user
    }

    pub async fn seed_admin(&self, email: &str, role: Role, is_super: bool) -> Admin {
        let hash = hash_password(&Password::new(TEST_PASSWORD.to_string())).unwrap();
        let admin = Admin::new(email.to_string(), Some(hash.into_string()), role, is_super);
        self.identities.insert_admin(&admin).await.unwrap();
        admin
    }

    pub async fn post_json(
        &self,
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn post_json_bearer(
        &self,
        uri: &str,
        token: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }

    /// The most recent code emailed to the given address.
    pub fn last_code_sent_to(&self, email: &str) -> Option<String> {
        self.email
            .sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|m| m.to == email)
            .map(|m| m.code.clone())
    }

    pub fn emails_sent_to(&self, email: &str) -> usize {
        self.email
            .sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.to == email)
            .count()
    }
}
