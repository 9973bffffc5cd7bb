/// Authentication engine - main entry point
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use auth_engine::{
    app,
    clock::SystemClock,
    config::Config,
    db::postgres::{PgPrincipalStore, PgSessionStore},
    services::AuthService,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    tracing::info!(
        "starting auth engine on {}:{}",
        config.server_host,
        config.server_port
    );

    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    tracing::info!("database connection pool initialized");

    let principals = Arc::new(PgPrincipalStore::new(db_pool.clone()));
    let sessions = Arc::new(PgSessionStore::new(db_pool));

    let auth = Arc::new(AuthService::new(
        principals,
        sessions,
        config.keyring()?,
        config.auth(),
        Arc::new(SystemClock),
    ));

    spawn_session_sweep(
        auth.clone(),
        StdDuration::from_secs(config.sweep_interval_secs),
        chrono::Duration::days(config.session_retention_days),
    );

    let state = AppState { auth };
    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", addr);

    axum::serve(listener, app(state)).await?;

    Ok(())
}

/// Periodic storage hygiene: archive sessions that have been revoked or
/// expired for longer than the retention period. Correctness never depends
/// on this job; lookups already filter on revocation and expiry.
fn spawn_session_sweep(
    auth: Arc<AuthService>,
    every: StdDuration,
    retention: chrono::Duration,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match auth.purge_expired_sessions(retention).await {
                Ok(0) => {}
                Ok(purged) => tracing::info!(purged, "archived dead session rows"),
                Err(err) => tracing::warn!(error = %err, "session sweep failed"),
            }
        }
    });
}
