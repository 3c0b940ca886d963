//! Storefront business rules that do not touch the database
//!
//! - `lifecycle`: order status machine and payment-status derivation
//! - `pricing`: line items, variant selection, order totals
//! - `host`: store resolution from the `Host` header

pub mod host;
pub mod lifecycle;
pub mod pricing;
