//! Redis access: a reconnecting client and the rate limiter built on it

pub mod client;
pub mod rate_limit;

pub use client::{RedisClient, RedisClientError, RedisConfig};
pub use rate_limit::{check_rate_limit, RateLimit, RateLimitDecision};
