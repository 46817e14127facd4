use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use keygate::config::Config;
use keygate::db::{AppState, create_pool, init_db, queries};
use keygate::handlers;
use keygate::models::KeyType;
use keygate::notify::Notifier;

#[derive(Parser, Debug)]
#[command(name = "keygate")]
#[command(about = "License key issuance, HWID binding and validation service")]
struct Cli {
    /// Issue a handful of dev keys on startup and print them (dev mode only)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Issue a few keys of each type for local testing and print them in a
/// copy-paste friendly block.
fn seed_dev_keys(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    let count = queries::count_keys(&conn).expect("Failed to count keys");
    if count > 0 {
        tracing::info!("Database already has keys, skipping seed");
        return;
    }

    tracing::info!("============================================");
    tracing::info!("SEEDING DEV KEYS");
    tracing::info!("============================================");

    let mut lifetime = Vec::new();
    let mut single_use = Vec::new();
    for _ in 0..3 {
        let key = queries::insert_new_key(&conn, KeyType::Lifetime, None, None)
            .expect("Failed to seed lifetime key");
        lifetime.push(key.key_code);
        let key = queries::insert_new_key(&conn, KeyType::SingleUse, None, None)
            .expect("Failed to seed single_use key");
        single_use.push(key.key_code);
    }

    println!();
    println!("--- COPY FROM HERE ---");
    for code in &lifetime {
        println!("  lifetime:   {}", code);
    }
    for code in &single_use {
        println!("  single_use: {}", code);
    }
    println!("--- END COPY ---");
    println!();
}

/// Spawns a background task that periodically clears expired transfer
/// verification codes. Key records themselves are never purged - expiry of
/// single_use keys is evaluated at validation time.
fn spawn_cleanup_task(state: AppState) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(5 * 60); // 5 minutes

        loop {
            tokio::time::sleep(interval).await;

            match state.db.get() {
                Ok(conn) => match queries::cleanup_expired_transfer_codes(&conn) {
                    Ok(count) => {
                        if count > 0 {
                            tracing::debug!("Cleared {} expired transfer codes", count);
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to clear transfer codes: {}", e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to get db connection for cleanup: {}", e);
                }
            }
        }
    });

    tracing::info!("Background cleanup task started (runs every 5 minutes)");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keygate=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    if config.notify_webhook_url.is_none() {
        tracing::info!("No notification webhook configured; issued keys are only returned inline");
    }

    // Create the database pool and initialize the schema
    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let state = AppState {
        db: db_pool,
        issuance_key: config.issuance_key.clone(),
        admin_key: config.admin_key.clone(),
        notifier: Arc::new(Notifier::new(config.notify_webhook_url.clone())),
    };

    // Clear any transfer codes that expired while the service was down
    {
        let conn = state.db.get().expect("Failed to get connection for cleanup");
        match queries::cleanup_expired_transfer_codes(&conn) {
            Ok(count) if count > 0 => {
                tracing::info!("Cleared {} expired transfer codes on startup", count);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Failed to clear transfer codes on startup: {}", e);
            }
        }
    }

    // Seed dev keys if --seed is passed (only in dev mode)
    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set KEYGATE_ENV=dev)");
        } else {
            seed_dev_keys(&state);
        }
    }

    spawn_cleanup_task(state.clone());

    // Build the application router
    let app = Router::new()
        // Public endpoints (no auth, per-IP rate limits)
        .merge(handlers::public::router(&config.rate_limit))
        // Issuance and admin endpoints (shared-secret auth)
        .merge(handlers::admin::router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start the server
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();

    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("Keygate server listening on {}", addr);

    // Run server with graceful shutdown
    // Use into_make_service_with_connect_info to enable IP-based rate limiting
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        } else {
            tracing::info!("Removed {}", db_path);
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
