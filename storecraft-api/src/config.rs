//! Configuration management for the API server
//!
//! Loaded from environment variables, with a `.env` file honored in
//! development.
//!
//! # Environment Variables
//!
//! - `API_HOST` / `API_PORT`: bind address (default 0.0.0.0:8080)
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DATABASE_MAX_CONNECTIONS`: pool size (default 10)
//! - `RUN_MIGRATIONS`: apply migrations at startup (default true)
//! - `JWT_SECRET`: HS256 signing secret, at least 32 characters (required)
//! - `REDIS_URL`: Redis for rate limiting (default redis://127.0.0.1:6379)
//! - `BASE_DOMAIN`: platform domain stores are subdomains of (default localhost)
//! - `UPLOAD_DIR`: where uploaded images are stored (default ./uploads)
//! - `CORS_ORIGINS`: comma-separated allowed origins, `*` for any (default *)
//! - `PRODUCTION`: enables HSTS and `Secure` cookies (default false)
//!
//! # Example
//!
//! ```no_run
//! use storecraft_api::config::Config;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! println!("Server will listen on {}", config.bind_address());
//! # Ok(())
//! # }
//! ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub redis: RedisSettings,
    pub storefront: StorefrontConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Production mode: HSTS and `Secure` cookies
    pub production: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// HS256 secret, at least 32 bytes. Generate with `openssl rand -hex 32`.
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorefrontConfig {
    /// Platform domain; `<store>.<base_domain>` resolves to a store
    pub base_domain: String,

    /// Checkout attempts per minute for one client IP in one store
    pub checkout_per_minute: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    pub upload_dir: String,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does
    /// not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port = var_or("API_PORT", "8080")
            .parse::<u16>()
            .context("API_PORT must be a port number")?;

        let max_connections = var_or("DATABASE_MAX_CONNECTIONS", "10")
            .parse::<u32>()
            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?;
        if max_connections == 0 {
            anyhow::bail!("DATABASE_MAX_CONNECTIONS must be at least 1");
        }

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let jwt_secret = lookup("JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let cors_origins: Vec<String> = var_or("CORS_ORIGINS", "*")
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Self {
            api: ApiConfig {
                host: var_or("API_HOST", "0.0.0.0"),
                port,
                cors_origins,
                production: parse_bool(&var_or("PRODUCTION", "false"))
                    .context("PRODUCTION must be true or false")?,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
                run_migrations: parse_bool(&var_or("RUN_MIGRATIONS", "true"))
                    .context("RUN_MIGRATIONS must be true or false")?,
            },
            jwt: JwtConfig { secret: jwt_secret },
            redis: RedisSettings {
                url: var_or("REDIS_URL", "redis://127.0.0.1:6379"),
            },
            storefront: StorefrontConfig {
                base_domain: var_or("BASE_DOMAIN", "localhost").to_ascii_lowercase(),
                checkout_per_minute: 10,
            },
            media: MediaConfig {
                upload_dir: var_or("UPLOAD_DIR", "./uploads"),
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Whether any origin may call the API
    pub fn cors_allows_any(&self) -> bool {
        self.api.cors_origins.iter().any(|origin| origin == "*")
    }
}

fn parse_bool(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("invalid boolean '{}'", other),
    }
}
