use latchkey_identity::{
    MemorySessionStore, MemoryUserStore, SessionManager, SessionStore, UserStore,
};
use latchkey_server::{
    app,
    auth::{AppState, OidcClient},
    config::ServerConfig,
    db::{PgSessionStore, PgUserStore},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    let cookie_key = config
        .session
        .cookie_key()
        .expect("invalid session secret");
    if config.session.secret.is_none() {
        tracing::warn!("SESSION__SECRET not set; sessions will not survive a restart");
    }

    let (users, sessions): (Arc<dyn UserStore>, Arc<dyn SessionStore>) =
        match &config.database_url {
            Some(database_url) => {
                let db_pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect(database_url)
                    .await
                    .expect("failed to connect to database");

                tracing::info!("Running database migrations...");
                sqlx::migrate!("./migrations")
                    .run(&db_pool)
                    .await
                    .expect("failed to run migrations");

                (
                    Arc::new(PgUserStore::new(db_pool.clone())),
                    Arc::new(PgSessionStore::new(db_pool)),
                )
            }
            None => {
                tracing::warn!("DATABASE_URL not set; accounts and sessions are kept in memory");
                (
                    Arc::new(MemoryUserStore::new()),
                    Arc::new(MemorySessionStore::new()),
                )
            }
        };

    // Cleanup expired sessions on startup and periodically afterwards
    let cleanup = SessionManager::new(sessions.clone(), users.clone(), config.session.duration());
    let cleanup_interval_secs = config.session.cleanup_interval_seconds;
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(cleanup_interval_secs));
        loop {
            // The first tick completes immediately, covering startup.
            interval.tick().await;
            if let Err(e) = cleanup.purge_expired().await {
                tracing::warn!(error = %e, "Failed to cleanup expired sessions");
            }
        }
    });

    // Initialize OIDC client
    tracing::info!(issuer = config.oidc.issuer_url(), "Discovering OIDC provider...");
    let oidc_client = OidcClient::discover(config.oidc.clone(), &config.public_url)
        .await
        .expect("failed to discover OIDC provider");

    let state = AppState::new(
        users,
        sessions,
        Arc::new(oidc_client),
        config.session.clone(),
        cookie_key,
    );
    let app = app::router(state, &config.public_dir);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.bind_addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
