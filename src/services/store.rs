use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::options::ReplaceOptions;

use crate::db::MongoDb;
use crate::models::{Admin, IdentityRecord, IdentityScope, IdentityStatus, OtpCode, OtpKind, User};
use crate::services::ServiceError;

/// Credential and one-time-code repository, consumed by the guard and the
/// auth flows. The production implementation is MongoDB-backed; tests use
/// the in-memory variant.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError>;
    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, ServiceError>;
    async fn insert_user(&self, user: &User) -> Result<(), ServiceError>;
    async fn set_user_password(&self, id: &str, password_hash: &str) -> Result<(), ServiceError>;
    async fn mark_user_email_verified(&self, id: &str) -> Result<(), ServiceError>;
    async fn set_user_status(&self, id: &str, status: IdentityStatus) -> Result<(), ServiceError>;

    async fn find_admin_by_email(&self, email: &str) -> Result<Option<Admin>, ServiceError>;
    async fn find_admin_by_id(&self, id: &str) -> Result<Option<Admin>, ServiceError>;
    async fn insert_admin(&self, admin: &Admin) -> Result<(), ServiceError>;
    async fn set_admin_password(&self, id: &str, password_hash: &str) -> Result<(), ServiceError>;

    async fn upsert_otp(&self, otp: &OtpCode) -> Result<(), ServiceError>;
    async fn find_otp(&self, email: &str, kind: OtpKind) -> Result<Option<OtpCode>, ServiceError>;
    async fn delete_otp(&self, email: &str, kind: OtpKind) -> Result<(), ServiceError>;
    async fn record_otp_attempt(&self, email: &str, kind: OtpKind) -> Result<(), ServiceError>;
    async fn mark_otp_verified(&self, email: &str, kind: OtpKind) -> Result<(), ServiceError>;

    async fn health_check(&self) -> Result<(), ServiceError>;

    /// Scope-dispatched lookup shared by the two guard instantiations.
    async fn find_identity_by_email(
        &self,
        scope: IdentityScope,
        email: &str,
    ) -> Result<Option<IdentityRecord>, ServiceError> {
        Ok(match scope {
            IdentityScope::User => self
                .find_user_by_email(email)
                .await?
                .map(IdentityRecord::User),
            IdentityScope::Admin => self
                .find_admin_by_email(email)
                .await?
                .map(IdentityRecord::Admin),
        })
    }

    async fn find_identity_by_id(
        &self,
        scope: IdentityScope,
        id: &str,
    ) -> Result<Option<IdentityRecord>, ServiceError> {
        Ok(match scope {
            IdentityScope::User => self.find_user_by_id(id).await?.map(IdentityRecord::User),
            IdentityScope::Admin => self.find_admin_by_id(id).await?.map(IdentityRecord::Admin),
        })
    }

    async fn set_identity_password(
        &self,
        scope: IdentityScope,
        id: &str,
        password_hash: &str,
    ) -> Result<(), ServiceError> {
        match scope {
            IdentityScope::User => self.set_user_password(id, password_hash).await,
            IdentityScope::Admin => self.set_admin_password(id, password_hash).await,
        }
    }
}

#[derive(Clone)]
pub struct MongoIdentityStore {
    db: MongoDb,
}

impl MongoIdentityStore {
    pub fn new(db: MongoDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl IdentityStore for MongoIdentityStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        Ok(self
            .db
            .users()
            .find_one(doc! { "email": email }, None)
            .await?)
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, ServiceError> {
        Ok(self.db.users().find_one(doc! { "_id": id }, None).await?)
    }

    async fn insert_user(&self, user: &User) -> Result<(), ServiceError> {
        self.db.users().insert_one(user, None).await?;
        Ok(())
    }

    async fn set_user_password(&self, id: &str, password_hash: &str) -> Result<(), ServiceError> {
        self.db
            .users()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": {
                    "password_hash": password_hash,
                    "updated_at": mongodb::bson::DateTime::now(),
                } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn mark_user_email_verified(&self, id: &str) -> Result<(), ServiceError> {
        self.db
            .users()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": {
                    "email_verified": true,
                    "updated_at": mongodb::bson::DateTime::now(),
                } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn set_user_status(&self, id: &str, status: IdentityStatus) -> Result<(), ServiceError> {
        self.db
            .users()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": {
                    "status": status.as_str(),
                    "updated_at": mongodb::bson::DateTime::now(),
                } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn find_admin_by_email(&self, email: &str) -> Result<Option<Admin>, ServiceError> {
        Ok(self
            .db
            .admins()
            .find_one(doc! { "email": email }, None)
            .await?)
    }

    async fn find_admin_by_id(&self, id: &str) -> Result<Option<Admin>, ServiceError> {
        Ok(self.db.admins().find_one(doc! { "_id": id }, None).await?)
    }

    async fn insert_admin(&self, admin: &Admin) -> Result<(), ServiceError> {
        self.db.admins().insert_one(admin, None).await?;
        Ok(())
    }

    async fn set_admin_password(&self, id: &str, password_hash: &str) -> Result<(), ServiceError> {
        self.db
            .admins()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": {
                    "password_hash": password_hash,
                    "updated_at": mongodb::bson::DateTime::now(),
                } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn upsert_otp(&self, otp: &OtpCode) -> Result<(), ServiceError> {
        self.db
            .otp_codes()
            .replace_one(
                doc! { "email": &otp.email, "kind": otp.kind.as_str() },
                otp,
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await?;
        Ok(())
    }

    async fn find_otp(&self, email: &str, kind: OtpKind) -> Result<Option<OtpCode>, ServiceError> {
        Ok(self
            .db
            .otp_codes()
            .find_one(doc! { "email": email, "kind": kind.as_str() }, None)
            .await?)
    }

    async fn delete_otp(&self, email: &str, kind: OtpKind) -> Result<(), ServiceError> {
        self.db
            .otp_codes()
            .delete_one(doc! { "email": email, "kind": kind.as_str() }, None)
            .await?;
        Ok(())
    }

    async fn record_otp_attempt(&self, email: &str, kind: OtpKind) -> Result<(), ServiceError> {
        self.db
            .otp_codes()
            .update_one(
                doc! { "email": email, "kind": kind.as_str() },
                doc! { "$inc": { "attempts": 1 } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn mark_otp_verified(&self, email: &str, kind: OtpKind) -> Result<(), ServiceError> {
        self.db
            .otp_codes()
            .update_one(
                doc! { "email": email, "kind": kind.as_str() },
                doc! { "$set": { "verified_at": mongodb::bson::DateTime::now() } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        self.db.health_check().await
    }
}

/// In-memory store used by tests.
#[derive(Default)]
pub struct MemoryIdentityStore {
    users: Mutex<HashMap<String, User>>,
    admins: Mutex<HashMap<String, Admin>>,
    otps: Mutex<HashMap<(String, OtpKind), OtpCode>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned(e: impl std::fmt::Display) -> ServiceError {
        ServiceError::Internal(anyhow::anyhow!("mutex poisoned: {}", e))
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let users = self.users.lock().map_err(Self::poisoned)?;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, ServiceError> {
        let users = self.users.lock().map_err(Self::poisoned)?;
        Ok(users.get(id).cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<(), ServiceError> {
        self.users
            .lock()
            .map_err(Self::poisoned)?
            .insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn set_user_password(&self, id: &str, password_hash: &str) -> Result<(), ServiceError> {
        if let Some(user) = self.users.lock().map_err(Self::poisoned)?.get_mut(id) {
            user.password_hash = Some(password_hash.to_string());
            user.updated_at = chrono::Utc::now();
        }
        Ok(())
    }

    async fn mark_user_email_verified(&self, id: &str) -> Result<(), ServiceError> {
        if let Some(user) = self.users.lock().map_err(Self::poisoned)?.get_mut(id) {
            user.email_verified = true;
            user.updated_at = chrono::Utc::now();
        }
        Ok(())
    }

    async fn set_user_status(&self, id: &str, status: IdentityStatus) -> Result<(), ServiceError> {
        if let Some(user) = self.users.lock().map_err(Self::poisoned)?.get_mut(id) {
            user.status = status;
            user.updated_at = chrono::Utc::now();
        }
        Ok(())
    }

    async fn find_admin_by_email(&self, email: &str) -> Result<Option<Admin>, ServiceError> {
        let admins = self.admins.lock().map_err(Self::poisoned)?;
        Ok(admins.values().find(|a| a.email == email).cloned())
    }

    async fn find_admin_by_id(&self, id: &str) -> Result<Option<Admin>, ServiceError> {
        let admins = self.admins.lock().map_err(Self::poisoned)?;
        Ok(admins.get(id).cloned())
    }

    async fn insert_admin(&self, admin: &Admin) -> Result<(), ServiceError> {
        self.admins
            .lock()
            .map_err(Self::poisoned)?
            .insert(admin.id.clone(), admin.clone());
        Ok(())
    }

    async fn set_admin_password(&self, id: &str, password_hash: &str) -> Result<(), ServiceError> {
        if let Some(admin) = self.admins.lock().map_err(Self::poisoned)?.get_mut(id) {
            admin.password_hash = Some(password_hash.to_string());
            admin.updated_at = chrono::Utc::now();
        }
        Ok(())
    }

    async fn upsert_otp(&self, otp: &OtpCode) -> Result<(), ServiceError> {
        self.otps
            .lock()
            .map_err(Self::poisoned)?
            .insert((otp.email.clone(), otp.kind), otp.clone());
        Ok(())
    }

    async fn find_otp(&self, email: &str, kind: OtpKind) -> Result<Option<OtpCode>, ServiceError> {
        let otps = self.otps.lock().map_err(Self::poisoned)?;
        Ok(otps.get(&(email.to_string(), kind)).cloned())
    }

    async fn delete_otp(&self, email: &str, kind: OtpKind) -> Result<(), ServiceError> {
        self.otps
            .lock()
            .map_err(Self::poisoned)?
            .remove(&(email.to_string(), kind));
        Ok(())
    }

    async fn record_otp_attempt(&self, email: &str, kind: OtpKind) -> Result<(), ServiceError> {
        if let Some(otp) = self
            .otps
            .lock()
            .map_err(Self::poisoned)?
            .get_mut(&(email.to_string(), kind))
        {
            otp.attempts += 1;
        }
        Ok(())
    }

    async fn mark_otp_verified(&self, email: &str, kind: OtpKind) -> Result<(), ServiceError> {
        if let Some(otp) = self
            .otps
            .lock()
            .map_err(Self::poisoned)?
            .get_mut(&(email.to_string(), kind))
        {
            otp.verified_at = Some(mongodb::bson::DateTime::now());
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}
