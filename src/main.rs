use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use flixhub_api::{
    api::{create_router, AppState, Settings},
    config::Config,
    db::{create_pool, create_redis_client, Cache, MemoryStore, PgStore, Repository},
    services::providers::OmdbProvider,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flixhub_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let repo: Arc<dyn Repository> = match &config.database_url {
        Some(url) => {
            let pool = create_pool(url, config.database_max_connections)
                .await
                .context("Failed to connect to PostgreSQL")?;
            tracing::info!("Using PostgreSQL store");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let mut state = AppState::new(repo, Settings::from_config(&config));

    let mut cache_writer = None;
    if let Some(url) = &config.redis_url {
        let client = create_redis_client(url)?;
        let (cache, handle) = Cache::new(client).await;
        state = state.with_cache(cache);
        cache_writer = Some(handle);
        tracing::info!("Redis cache enabled");
    }

    if let Some(api_key) = &config.omdb_api_key {
        let provider = OmdbProvider::new(
            api_key.clone(),
            config.omdb_api_url.clone(),
            state.cache.clone(),
        );
        state = state.with_metadata(Arc::new(provider));
        tracing::info!("OMDb metadata provider enabled");
    }

    let app = create_router(state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    tracing::info!(%address, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = cache_writer {
        handle.shutdown().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
