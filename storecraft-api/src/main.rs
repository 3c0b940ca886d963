//! # Storecraft API Server
//!
//! Multi-tenant storefront backend: store dashboards (catalog, customers,
//! orders, notifications) and the public storefront API resolved by host.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/storecraft \
//! JWT_SECRET=$(openssl rand -hex 32) \
//! cargo run -p storecraft-api
//! ```

use anyhow::Context;
use std::{net::SocketAddr, sync::Arc};
use storecraft_api::{
    app::{build_router, AppState},
    config::Config,
};
use storecraft_shared::{
    db::{
        migrations::run_migrations,
        pool::{create_pool, DatabaseConfig},
    },
    media::LocalMediaStore,
    redis::{RedisClient, RedisConfig},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "storecraft_api=debug,storecraft_shared=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn connect_redis(url: &str) -> Option<RedisClient> {
    let client = match RedisClient::new(RedisConfig::new(url)).await {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(error = %e, "Redis unavailable, rate limiting disabled");
            return None;
        }
    };

    if let Err(e) = client.ping().await {
        tracing::warn!(error = %e, "Redis ping failed, requests will be allowed until it recovers");
    }

    Some(client)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;
    init_tracing();

    tracing::info!("Storecraft API v{} starting", env!("CARGO_PKG_VERSION"));

    let db = create_pool(DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..Default::default()
    })
    .await
    .context("failed to connect to PostgreSQL")?;

    if config.database.run_migrations {
        run_migrations(&db).await.context("failed to run migrations")?;
    }

    let redis = connect_redis(&config.redis.url).await;

    tokio::fs::create_dir_all(&config.media.upload_dir)
        .await
        .with_context(|| format!("failed to create upload dir {}", config.media.upload_dir))?;
    let media = Arc::new(LocalMediaStore::new(&config.media.upload_dir));

    let addr = config.bind_address();
    let state = AppState::new(db, redis, config, media);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
