use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;

use identity_service::{
    build_router,
    config::Config,
    db::MongoDb,
    observability::logging::init_tracing,
    services::{
        AuthService, MongoIdentityStore, RedisRevocationStore, SmtpEmailService, TokenService,
    },
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), identity_service::error::AppError> {
    dotenvy::dotenv().ok();

    // Load configuration - fail fast if invalid.
    let config = Config::from_env()?;

    init_tracing(&config.log_level);

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting identity service"
    );

    let db = MongoDb::connect(&config.mongodb.uri, &config.mongodb.database).await?;
    db.initialize_indexes().await?;
    tracing::info!("Database initialized successfully");

    let identities: Arc<dyn identity_service::services::IdentityStore> =
        Arc::new(MongoIdentityStore::new(db));

    let revocations: Arc<dyn identity_service::services::RevocationStore> =
        Arc::new(RedisRevocationStore::new(&config.redis).await?);
    tracing::info!("Revocation store initialized");

    let email: Arc<dyn identity_service::services::EmailProvider> =
        Arc::new(SmtpEmailService::new(&config.smtp)?);
    tracing::info!("Email service initialized");

    let tokens = TokenService::new(&config.tokens);

    let auth = AuthService::new(
        identities.clone(),
        revocations.clone(),
        email.clone(),
        tokens.clone(),
        config.otp.expiry_minutes,
    );

    let state = AppState {
        config: config.clone(),
        identities,
        revocations,
        email,
        tokens,
        auth,
    };

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
