//! Gate API server binary.
//!
//! Connects to Postgres (or keeps everything in memory with `--in-memory`),
//! runs migrations, provisions the bootstrap admin and serves the API until
//! Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use gate_api::config::ApiConfig;
use gate_core::bootstrap::ensure_bootstrap_admin;
use gate_core::store::{AuditLog, CredentialStore, MemoryCredentialStore, PgCredentialStore};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

/// CLI arguments for the API server. Everything not listed here is read
/// from the environment by [`ApiConfig::from_env`].
#[derive(Parser, Debug)]
#[command(name = "gate_server", about = "Gate access-control API server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:8080")]
    bind: String,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/gate"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 5)]
    max_connections: u32,

    /// Keep users and admins in process memory instead of Postgres.
    #[arg(long, default_value_t = false)]
    in_memory: bool,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,gate_api=debug,gate_core=debug".into()),
        )
        .init();

    let args = Args::parse();
    let mut config = ApiConfig::from_env()?;
    config.bind_addr = args.bind;
    config.pg_connection_url = args.database_url;

    info!(bind = %config.bind_addr, in_memory = args.in_memory, "starting gate_server");

    let (store, audit): (Arc<dyn CredentialStore>, Arc<dyn AuditLog>) = if args.in_memory {
        warn!("using in-memory store, data is lost on exit");
        let store = Arc::new(MemoryCredentialStore::new());
        (store.clone(), store)
    } else {
        info!(max_connections = args.max_connections, "configuring connection pool");
        let pool = PgPoolOptions::new()
            .max_connections(args.max_connections)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(&config.pg_connection_url)
            .await?;

        info!("running database migrations");
        gate_api::migrate(&pool).await?;
        let store = Arc::new(PgCredentialStore::new(pool));
        (store.clone(), store)
    };

    let state = gate_api::AppState::new(store, audit, config.clone());
    ensure_bootstrap_admin(
        state.store.as_ref(),
        state.hasher.clone(),
        &config.bootstrap_admin,
    )
    .await?;

    let app = gate_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    // Peer address feeds the audit log when no proxy header is present.
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}
