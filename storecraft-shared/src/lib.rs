//! # Storecraft Shared Library
//!
//! Domain types, persistence and business rules for the Storecraft
//! storefront backend. The HTTP layer lives in `storecraft-api`.
//!
//! ## Module Organization
//!
//! - `commerce`: order lifecycle, payment derivation, pricing, host routing
//! - `models`: database models and tenant-scoped queries
//! - `auth`: sessions, passwords and role checks
//! - `db`: connection pool and migrations
//! - `redis`: Redis client and rate limiting
//! - `media`: product image storage

pub mod auth;
pub mod commerce;
pub mod db;
pub mod media;
pub mod models;
pub mod redis;

/// Current version of the Storecraft shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
