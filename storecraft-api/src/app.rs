//! Application state and router builder
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use storecraft_api::{app::{build_router, AppState}, config::Config};
//! use storecraft_shared::db::pool::{create_pool, DatabaseConfig};
//! use storecraft_shared::media::LocalMediaStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! let pool = create_pool(DatabaseConfig::from_url(&config.database.url)).await?;
//! let media = Arc::new(LocalMediaStore::new(&config.media.upload_dir));
//! let app = build_router(AppState::new(pool, None, config, media));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

use crate::{config::Config, middleware, routes};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use storecraft_shared::auth::middleware::create_jwt_middleware;
use storecraft_shared::media::{MediaStore, MAX_IMAGE_BYTES};
use storecraft_shared::redis::RedisClient;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Images accepted in one upload request
pub const MAX_IMAGES_PER_UPLOAD: usize = 8;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,

    /// None when Redis is not reachable at startup; rate limiting is then off
    pub redis: Option<RedisClient>,

    pub config: Arc<Config>,
    pub media: Arc<dyn MediaStore>,
}

impl AppState {
    pub fn new(
        db: PgPool,
        redis: Option<RedisClient>,
        config: Config,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            db,
            redis,
            config: Arc::new(config),
            media,
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete router
///
/// ```text
/// /
/// ├── /health                        public
/// ├── /uploads/*                     uploaded images (static)
/// └── /v1
///     ├── /auth                      register, login, refresh, logout, me
///     ├── /store                     current store settings        (session)
///     ├── /products, /customers,
///     │   /orders, /notifications    store dashboard               (session + rate limit)
///     └── /storefront                public, store resolved from Host
/// ```
///
/// Middleware, outermost first: security headers, CORS, compression,
/// tracing, then per-group auth, store resolution and rate limiting.
pub fn build_router(state: AppState) -> Router {
    let jwt = from_fn(create_jwt_middleware(state.config.jwt.secret.clone()));

    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh))
        .route("/logout", post(routes::auth::logout))
        .route("/me", get(routes::auth::me).layer(jwt.clone()));

    let image_upload = post(routes::products::upload_images)
        .layer::<_, std::convert::Infallible>(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(
            MAX_IMAGES_PER_UPLOAD * MAX_IMAGE_BYTES + 64 * 1024,
        ));

    let dashboard_routes = Router::new()
        .route(
            "/store",
            get(routes::store::get_store).patch(routes::store::update_store),
        )
        .route(
            "/products",
            get(routes::products::list_products).post(routes::products::create_product),
        )
        .route(
            "/products/:id",
            get(routes::products::get_product)
                .patch(routes::products::update_product)
                .delete(routes::products::delete_product),
        )
        .route("/products/:id/variants", post(routes::products::create_variant))
        .route(
            "/products/:id/variants/:variant_id",
            patch(routes::products::update_variant).delete(routes::products::delete_variant),
        )
        .route("/products/:id/images", image_upload)
        .route(
            "/customers",
            get(routes::customers::list_customers).post(routes::customers::create_customer),
        )
        .route(
            "/customers/:id",
            get(routes::customers::get_customer)
                .patch(routes::customers::update_customer)
                .delete(routes::customers::delete_customer),
        )
        .route(
            "/orders",
            get(routes::orders::list_orders).post(routes::orders::create_order),
        )
        .route("/orders/:id", get(routes::orders::get_order))
        .route("/orders/:id/status", patch(routes::orders::update_status))
        .route("/orders/:id/payment", patch(routes::orders::update_payment))
        .route("/orders/:id/invoices", post(routes::orders::add_invoice))
        .route("/notifications", get(routes::notifications::list_notifications))
        .route(
            "/notifications/unread-count",
            get(routes::notifications::unread_count),
        )
        .route(
            "/notifications/read-all",
            post(routes::notifications::mark_all_read),
        )
        .route(
            "/notifications/:id/read",
            post(routes::notifications::mark_read),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::rate_limit::tenant_rate_limit,
        ))
        .layer(jwt);

    let checkout = post(routes::storefront::place_order).layer(from_fn_with_state(
        state.clone(),
        middleware::rate_limit::checkout_rate_limit,
    ));

    let storefront_routes = Router::new()
        .route("/store", get(routes::storefront::get_store))
        .route("/products", get(routes::storefront::list_products))
        .route("/products/:slug", get(routes::storefront::get_product))
        .route("/orders", checkout)
        .layer(from_fn_with_state(
            state.clone(),
            middleware::store_host::resolve_store,
        ));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/storefront", storefront_routes)
        .merge(dashboard_routes);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/v1", v1_routes)
        .nest_service("/uploads", ServeDir::new(&state.config.media.upload_dir))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config))
        .layer(middleware::security::SecurityHeadersLayer::new(
            state.config.api.production,
        ))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.cors_allows_any() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    // Credentials are allowed so the session cookie crosses origins
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-store-host"),
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
