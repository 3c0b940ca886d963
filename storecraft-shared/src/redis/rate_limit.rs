//! Token-bucket rate limiting in Redis
//!
//! Each key owns a bucket of `capacity` tokens refilled continuously at
//! `capacity / window` tokens per second. The check-and-take runs as one Lua
//! script, so concurrent API instances share a consistent bucket.

use redis::Script;
use std::time::{SystemTime, UNIX_EPOCH};

use super::client::{RedisClient, RedisClientError};

const TOKEN_BUCKET_SCRIPT: &str = r#"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local refill_per_ms = tonumber(ARGV[2])
local now = tonumber(ARGV[3])
local ttl = tonumber(ARGV[4])

local bucket = redis.call('HMGET', key, 'tokens', 'ts')
local tokens = tonumber(bucket[1])
local ts = tonumber(bucket[2])

if not tokens then
    tokens = capacity
    ts = now
end

tokens = math.min(capacity, tokens + math.max(0, now - ts) * refill_per_ms)

local allowed = 0
if tokens >= 1 then
    tokens = tokens - 1
    allowed = 1
end

redis.call('HSET', key, 'tokens', tostring(tokens), 'ts', now)
redis.call('PEXPIRE', key, ttl)

local retry_ms = 0
if allowed == 0 then
    retry_ms = math.ceil((1 - tokens) / refill_per_ms)
end

return {allowed, math.floor(tokens), retry_ms}
"#;

/// Bucket size and refill window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Requests allowed per window (also the burst size)
    pub capacity: u32,

    pub window_secs: u64,
}

impl RateLimit {
    pub fn per_minute(capacity: u32) -> Self {
        Self {
            capacity,
            window_secs: 60,
        }
    }

    fn refill_per_ms(&self) -> f64 {
        self.capacity as f64 / (self.window_secs.max(1) * 1000) as f64
    }
}

/// Outcome of one check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,

    /// Seconds until one token is available again (0 when allowed)
    pub retry_after_secs: u64,
}

impl RateLimitDecision {
    /// Decision used when Redis cannot be reached
    pub fn fail_open(limit: RateLimit) -> Self {
        Self {
            allowed: true,
            limit: limit.capacity,
            remaining: limit.capacity,
            retry_after_secs: 0,
        }
    }

    fn from_script(limit: RateLimit, reply: &[i64]) -> Self {
        let allowed = reply.first().copied().unwrap_or(1) == 1;
        let remaining = reply.get(1).copied().unwrap_or(0).max(0) as u32;
        let retry_ms = reply.get(2).copied().unwrap_or(0).max(0) as u64;

        Self {
            allowed,
            limit: limit.capacity,
            remaining,
            retry_after_secs: if allowed { 0 } else { retry_ms.div_ceil(1000).max(1) },
        }
    }
}

/// Takes one token from the bucket under `key`
///
/// # Errors
///
/// Returns an error when Redis is unreachable or slower than the client's
/// command timeout; callers decide whether to fail open.
pub async fn check_rate_limit(
    client: &RedisClient,
    key: &str,
    limit: RateLimit,
) -> Result<RateLimitDecision, RedisClientError> {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let ttl_ms = limit.window_secs.max(1) * 2 * 1000;

    let mut conn = client.connection();
    let script = Script::new(TOKEN_BUCKET_SCRIPT);
    let mut invocation = script.key(key);
    invocation
        .arg(limit.capacity)
        .arg(limit.refill_per_ms())
        .arg(now_ms)
        .arg(ttl_ms);

    let reply: Vec<i64> = tokio::time::timeout(
        client.command_timeout(),
        invocation.invoke_async(&mut conn),
    )
    .await
    .map_err(|_| RedisClientError::Timeout)??;

    Ok(RateLimitDecision::from_script(limit, &reply))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refill_rate() {
        let limit = RateLimit::per_minute(60);
        assert!((limit.refill_per_ms() - 0.001).abs() < f64::EPSILON);
    }

    #[test]
    fn test_decision_from_allowed_reply() {
        let decision = RateLimitDecision::from_script(RateLimit::per_minute(10), &[1, 7, 0]);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 7);
        assert_eq!(decision.retry_after_secs, 0);
    }

    #[test]
    fn test_decision_from_denied_reply_rounds_up() {
        let decision = RateLimitDecision::from_script(RateLimit::per_minute(10), &[0, 0, 4200]);
        assert!(!decision.allowed);
        assert_eq!(decision.retry_after_secs, 5);

        let decision = RateLimitDecision::from_script(RateLimit::per_minute(10), &[0, 0, 0]);
        assert_eq!(decision.retry_after_secs, 1);
    }

    #[test]
    fn test_fail_open() {
        let decision = RateLimitDecision::fail_open(RateLimit::per_minute(300));
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 300);
    }

    #[tokio::test]
    #[ignore = "requires a running Redis instance"]
    async fn test_bucket_empties() {
        use super::super::client::RedisConfig;

        let client = RedisClient::new(RedisConfig::new("redis://127.0.0.1:6379"))
            .await
            .unwrap();
        let key = format!("test:ratelimit:{}", uuid::Uuid::new_v4());
        let limit = RateLimit::per_minute(3);

        for _ in 0..3 {
            assert!(check_rate_limit(&client, &key, limit).await.unwrap().allowed);
        }
        let denied = check_rate_limit(&client, &key, limit).await.unwrap();
        assert!(!denied.allowed);
        assert!(denied.retry_after_secs >= 1);
    }
}
