//! MongoDB connection management and typed collection access.

use std::time::Duration;

use mongodb::{
    bson::doc, options::IndexOptions, Client as MongoClient, Collection, Database, IndexModel,
};

use crate::models::{Admin, OtpCode, User};
use crate::services::ServiceError;

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, ServiceError> {
        tracing::info!(uri = %uri, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB at {}: {}", uri, e);
            ServiceError::Database(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), ServiceError> {
        tracing::info!("Creating MongoDB indexes");

        let unique_email = |name: &str| {
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(
                    IndexOptions::builder()
                        .name(name.to_string())
                        .unique(true)
                        .build(),
                )
                .build()
        };

        self.users()
            .create_index(unique_email("user_email_unique"), None)
            .await?;
        self.admins()
            .create_index(unique_email("admin_email_unique"), None)
            .await?;

        // One active record per (email, kind); a new request replaces it.
        let otp_key_index = IndexModel::builder()
            .keys(doc! { "email": 1, "kind": 1 })
            .options(
                IndexOptions::builder()
                    .name("otp_email_kind_unique".to_string())
                    .unique(true)
                    .build(),
            )
            .build();
        self.otp_codes().create_index(otp_key_index, None).await?;

        // Expired codes are swept by the server.
        let otp_ttl_index = IndexModel::builder()
            .keys(doc! { "expires_at": 1 })
            .options(
                IndexOptions::builder()
                    .name("otp_expiry_ttl".to_string())
                    .expire_after(Duration::from_secs(0))
                    .build(),
            )
            .build();
        self.otp_codes().create_index(otp_ttl_index, None).await?;

        tracing::info!("MongoDB indexes created");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), ServiceError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                ServiceError::Database(e)
            })?;
        Ok(())
    }

    pub fn users(&self) -> Collection<User> {
        self.db.collection("users")
    }

    pub fn admins(&self) -> Collection<Admin> {
        self.db.collection("admins")
    }

    pub fn otp_codes(&self) -> Collection<OtpCode> {
        self.db.collection("otp_codes")
    }
}
