use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use kurz::auth::IdentityService;
use kurz::config::{Config, DatabaseBackend};
use kurz::service::LinkService;
use kurz::storage::{CachedStore, PostgresStore, SqliteStore, Store};
use kurz::{api, redirect};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage backend
    let backend: Arc<dyn Store> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.database.url);
            Arc::new(SqliteStore::new(&config.database.url, config.database.max_connections).await?)
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage: {}", config.database.url);
            Arc::new(
                PostgresStore::new(&config.database.url, config.database.max_connections).await?,
            )
        }
    };

    info!("Initializing database...");
    backend.init().await?;
    info!("Database initialized successfully");

    // Wrap the backend with the read cache and click buffer
    let cached = Arc::new(CachedStore::new(
        Arc::clone(&backend),
        config.cache.max_entries,
        config.cache.click_flush_secs,
    ));
    let store: Arc<dyn Store> = Arc::clone(&cached) as Arc<dyn Store>;

    let service = Arc::new(LinkService::new(store));

    let identity = Arc::new(IdentityService::new(
        config.identity.header.clone(),
        config.identity.dev_owner.clone(),
    ));
    if let Some(ref dev_owner) = config.identity.dev_owner {
        info!("🔓 Requests without '{}' run as '{}'", config.identity.header, dev_owner);
    } else {
        info!("🔐 API requests require the '{}' header", config.identity.header);
    }

    // Create routers
    let api_router = api::create_api_router(Arc::clone(&service), identity);
    let redirect_router = redirect::create_redirect_router(Arc::clone(&service));

    // Start API server
    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("🚀 API server listening on http://{}", api_addr);

    // Start redirect server
    let redirect_addr = format!(
        "{}:{}",
        config.redirect_server.host, config.redirect_server.port
    );
    let redirect_listener = tokio::net::TcpListener::bind(&redirect_addr).await?;
    info!("🚀 Redirect server listening on http://{}", redirect_addr);

    // Run both servers until one fails or the process is interrupted
    tokio::select! {
        result = async {
            tokio::try_join!(
                axum::serve(api_listener, api_router),
                axum::serve(redirect_listener, redirect_router),
            )
        } => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down, flushing buffered clicks...");
            cached.shutdown();
            // Give the flush task a beat to drain the buffer
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        }
    }

    Ok(())
}
