//! API route handlers, one module per resource
//!
//! - `health`: health check
//! - `auth`: register, login, refresh, logout, me
//! - `store`: settings of the signed-in store
//! - `products`, `customers`, `orders`, `notifications`: store dashboard
//! - `storefront`: public, host-resolved catalog and checkout

pub mod auth;
pub mod customers;
pub mod health;
pub mod notifications;
pub mod orders;
pub mod products;
pub mod store;
pub mod storefront;

use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Clamps client paging input to `(limit, offset)`
pub fn page_bounds(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    (
        limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        offset.unwrap_or(0).max(0),
    )
}

/// One page of a listing
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Tells an absent field (`None`) from an explicit `null` (`Some(None)`)
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
