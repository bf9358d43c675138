use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub port: u16,
    pub mongodb: MongoConfig,
    pub redis: RedisConfig,
    pub tokens: TokenConfig,
    pub security: SecurityConfig,
    pub otp: OtpConfig,
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

/// Session-token configuration. Expiries are duration strings such as
/// `"12h"` or `"7d"`; unparseable values fall back to a fixed default at
/// token-service construction.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_expiry: String,
    pub refresh_expiry: String,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Allows the Basic-auth fallback path on the user guard.
    pub basic_auth_enabled: bool,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct OtpConfig {
    pub expiry_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub user: String,
    pub password: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::Config(e))?;

        let is_prod = environment == Environment::Prod;

        let config = Config {
            environment,
            service_name: get_env("SERVICE_NAME", Some("identity-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            port: get_env("PORT", Some("8080"), is_prod)?
                .parse()
                .map_err(|e: std::num::ParseIntError| AppError::Config(e.to_string()))?,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", None, is_prod)?,
                database: get_env("MONGODB_DATABASE", None, is_prod)?,
            },
            redis: RedisConfig {
                url: get_env("REDIS_URL", None, is_prod)?,
            },
            tokens: TokenConfig {
                access_secret: get_env("ACCESS_TOKEN_SECRET", None, is_prod)?,
                refresh_secret: get_env("REFRESH_TOKEN_SECRET", None, is_prod)?,
                access_expiry: get_env("ACCESS_TOKEN_EXPIRY", Some("12h"), is_prod)?,
                refresh_expiry: get_env("REFRESH_TOKEN_EXPIRY", Some("7d"), is_prod)?,
            },
            security: SecurityConfig {
                basic_auth_enabled: get_env("BASIC_AUTH_ENABLED", Some("false"), is_prod)?
                    .parse()
                    .unwrap_or(false),
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            },
            otp: OtpConfig {
                expiry_minutes: get_env("OTP_EXPIRY_MINUTES", Some("5"), is_prod)?
                    .parse()
                    .map_err(|e: std::num::ParseIntError| AppError::Config(e.to_string()))?,
            },
            smtp: SmtpConfig {
                host: get_env("SMTP_HOST", None, is_prod)?,
                user: get_env("SMTP_USER", None, is_prod)?,
                password: get_env("SMTP_PASSWORD", None, is_prod)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.port == 0 {
            return Err(AppError::Config("PORT must be greater than 0".to_string()));
        }

        if self.tokens.access_secret.is_empty() || self.tokens.refresh_secret.is_empty() {
            return Err(AppError::Config(
                "ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must be set".to_string(),
            ));
        }

        if self.tokens.access_secret == self.tokens.refresh_secret {
            return Err(AppError::Config(
                "ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ".to_string(),
            ));
        }

        if self.otp.expiry_minutes <= 0 {
            return Err(AppError::Config(
                "OTP_EXPIRY_MINUTES must be positive".to_string(),
            ));
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::Config(
                    "Wildcard CORS origin not allowed in production".to_string(),
                ));
            }

            if self.tokens.access_secret.len() < 32 || self.tokens.refresh_secret.len() < 32 {
                return Err(AppError::Config(
                    "Token secrets must be at least 32 bytes in production".to_string(),
                ));
            }
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::Config(format!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::Config(format!("{} is required but not set", key)))
            }
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
