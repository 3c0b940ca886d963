//! Database models for Storecraft
//!
//! Every model exposes async associated functions taking a `PgPool` (or an
//! executor, when the call has to join a transaction). Store-owned rows are
//! always looked up together with their `tenant_id`.
//!
//! # Models
//!
//! - `tenant`: stores, found by id, subdomain or custom domain
//! - `user`: dashboard accounts
//! - `membership`: user roles per store
//! - `product`: catalog products and their variants
//! - `customer`: shoppers, deduplicated by email or phone
//! - `order`: order placement and lifecycle
//! - `notification`: dashboard notifications
//!
//! # Example
//!
//! ```no_run
//! use storecraft_shared::models::user::{User, CreateUser};
//! use storecraft_shared::db::pool::{create_pool, DatabaseConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = create_pool(DatabaseConfig::default()).await?;
//!
//! let user = User::create(&pool, CreateUser {
//!     email: "owner@example.com".to_string(),
//!     password_hash: "$argon2id$...".to_string(),
//!     name: Some("Jane Doe".to_string()),
//! }).await?;
//! # Ok(())
//! # }
//! ```

pub mod customer;
pub mod membership;
pub mod notification;
pub mod order;
pub mod product;
pub mod tenant;
pub mod user;

/// `ILIKE` pattern matching `term` anywhere, with `\`, `%` and `_` taken literally
pub(crate) fn contains_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}
