//! Identity records - user and admin accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity kind. Selects the credential collection and the revocation
/// namespace, so a user id can never cross-revoke an admin sharing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityScope {
    User,
    Admin,
}

impl IdentityScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityScope::User => "user",
            IdentityScope::Admin => "admin",
        }
    }

    /// Capitalized form used in client-facing messages.
    pub fn label(&self) -> &'static str {
        match self {
            IdentityScope::User => "User",
            IdentityScope::Admin => "Admin",
        }
    }
}

/// Account lifecycle state. Only `Active` may authenticate; `Deleted` is a
/// soft-delete marker, records are never physically removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityStatus {
    Active,
    Deactivated,
    Deleted,
}

impl IdentityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityStatus::Active => "active",
            IdentityStatus::Deactivated => "deactivated",
            IdentityStatus::Deleted => "deleted",
        }
    }
}

/// Closed role set. `User` is the only user-scope role; admins carry
/// `Admin` or `Moderator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Admin,
    Moderator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    /// None for OAuth-only accounts that never set a password.
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub role: Role,
    pub status: IdentityStatus,
    pub is_deleted: bool,
    pub email_verified: bool,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, password_hash: Option<String>, name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            email,
            password_hash,
            name,
            role: Role::User,
            status: IdentityStatus::Active,
            is_deleted: false,
            email_verified: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == IdentityStatus::Active && !self.is_deleted
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admin {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub role: Role,
    pub is_super: bool,
    pub status: IdentityStatus,
    pub is_deleted: bool,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Admin {
    pub fn new(email: String, password_hash: Option<String>, role: Role, is_super: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            email,
            password_hash,
            role,
            is_super,
            status: IdentityStatus::Active,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Either identity kind, for code shared between the two guard
/// instantiations.
#[derive(Debug, Clone)]
pub enum IdentityRecord {
    User(User),
    Admin(Admin),
}

impl IdentityRecord {
    pub fn id(&self) -> &str {
        match self {
            IdentityRecord::User(u) => &u.id,
            IdentityRecord::Admin(a) => &a.id,
        }
    }

    pub fn email(&self) -> &str {
        match self {
            IdentityRecord::User(u) => &u.email,
            IdentityRecord::Admin(a) => &a.email,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            IdentityRecord::User(u) => u.role,
            IdentityRecord::Admin(a) => a.role,
        }
    }

    pub fn status(&self) -> IdentityStatus {
        match self {
            IdentityRecord::User(u) => u.status,
            IdentityRecord::Admin(a) => a.status,
        }
    }

    pub fn is_deleted(&self) -> bool {
        match self {
            IdentityRecord::User(u) => u.is_deleted,
            IdentityRecord::Admin(a) => a.is_deleted,
        }
    }

    pub fn password_hash(&self) -> Option<&str> {
        match self {
            IdentityRecord::User(u) => u.password_hash.as_deref(),
            IdentityRecord::Admin(a) => a.password_hash.as_deref(),
        }
    }
}
