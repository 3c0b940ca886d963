//! Middleware for the API server
//!
//! - `security`: security response headers
//! - `store_host`: resolves the storefront's store from the request host
//! - `rate_limit`: Redis token buckets per store and per checkout client

pub mod rate_limit;
pub mod security;
pub mod store_host;
