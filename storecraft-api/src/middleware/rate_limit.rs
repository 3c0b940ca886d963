//! Rate limiting middleware
//!
//! Token buckets live in Redis (see `storecraft_shared::redis::rate_limit`),
//! so every API instance shares them.
//!
//! # Limits
//!
//! - Dashboard routes: per store, sized by plan (trial 60/min, entry 300/min,
//!   pro 1200/min, enterprise 6000/min)
//! - Storefront checkout: per store and client IP, `checkout_per_minute`
//!
//! # Headers
//!
//! - `X-RateLimit-Limit`: requests allowed per minute
//! - `X-RateLimit-Remaining`: tokens left in the bucket
//! - `Retry-After`: seconds to wait (429 responses only)
//!
//! When Redis is not configured or does not answer in time, requests are let
//! through and a warning is logged.

use crate::app::AppState;
use crate::error::ApiError;
use axum::{
    extract::{ConnectInfo, Extension, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use storecraft_shared::auth::middleware::AuthContext;
use storecraft_shared::models::tenant::{Tenant, TenantPlan};
use storecraft_shared::redis::{check_rate_limit, RateLimit, RateLimitDecision};
use uuid::Uuid;

pub fn plan_limit(plan: TenantPlan) -> RateLimit {
    RateLimit::per_minute(plan.requests_per_minute())
}

pub fn tenant_key(tenant_id: Uuid) -> String {
    format!("ratelimit:tenant:{}", tenant_id)
}

pub fn checkout_key(tenant_id: Uuid, client: &str) -> String {
    format!("ratelimit:checkout:{}:{}", tenant_id, client)
}

/// Client address: first `X-Forwarded-For` hop, else the peer address
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

async fn decide(state: &AppState, key: &str, limit: RateLimit) -> RateLimitDecision {
    let Some(redis) = state.redis.as_ref() else {
        return RateLimitDecision::fail_open(limit);
    };

    match check_rate_limit(redis, key, limit).await {
        Ok(decision) => decision,
        Err(e) => {
            tracing::warn!(error = %e, key = %key, "Rate limiter unavailable, allowing request");
            RateLimitDecision::fail_open(limit)
        }
    }
}

fn enforce(decision: RateLimitDecision) -> Result<(), ApiError> {
    if decision.allowed {
        return Ok(());
    }

    Err(ApiError::RateLimitExceeded {
        retry_after: decision.retry_after_secs,
        message: format!(
            "Rate limit of {} requests per minute exceeded",
            decision.limit
        ),
    })
}

fn add_headers(response: &mut Response, decision: RateLimitDecision) {
    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(decision.limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(decision.remaining));
}

/// Per-store limit for authenticated dashboard routes
///
/// Must run after the JWT middleware, which provides the `AuthContext`.
pub async fn tenant_rate_limit(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if state.redis.is_none() {
        return Ok(next.run(request).await);
    }

    let plan = Tenant::find_by_id(&state.db, auth.tenant_id)
        .await?
        .map(|tenant| tenant.plan)
        .ok_or_else(|| ApiError::Unauthorized("Store no longer exists".to_string()))?;

    let decision = decide(&state, &tenant_key(auth.tenant_id), plan_limit(plan)).await;
    if !decision.allowed {
        tracing::info!(tenant_id = %auth.tenant_id, plan = plan.as_str(), "Store rate limited");
    }
    enforce(decision)?;

    let mut response = next.run(request).await;
    add_headers(&mut response, decision);
    Ok(response)
}

/// Per-client limit for storefront checkout
///
/// Must run after the store-host middleware, which provides the `Tenant`.
pub async fn checkout_rate_limit(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let client = client_ip(request.headers(), peer);
    let limit = RateLimit::per_minute(state.config.storefront.checkout_per_minute);

    let decision = decide(&state, &checkout_key(tenant.id, &client), limit).await;
    if !decision.allowed {
        tracing::info!(tenant_id = %tenant.id, client = %client, "Checkout rate limited");
    }
    enforce(decision)?;

    let mut response = next.run(request).await;
    add_headers(&mut response, decision);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_limits() {
        assert_eq!(plan_limit(TenantPlan::Trial).capacity, 60);
        assert_eq!(plan_limit(TenantPlan::Entry).capacity, 300);
        assert_eq!(plan_limit(TenantPlan::Pro).capacity, 1200);
        assert_eq!(plan_limit(TenantPlan::Enterprise).capacity, 6000);
    }

    #[test]
    fn test_keys() {
        let id = Uuid::nil();
        assert_eq!(
            tenant_key(id),
            "ratelimit:tenant:00000000-0000-0000-0000-000000000000"
        );
        assert!(checkout_key(id, "10.0.0.1").ends_with(":10.0.0.1"));
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "192.168.1.5:5000".parse().unwrap();

        assert_eq!(client_ip(&headers, Some(peer)), "192.168.1.5");
        assert_eq!(client_ip(&headers, None), "unknown");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        assert_eq!(client_ip(&headers, Some(peer)), "203.0.113.9");
    }

    #[test]
    fn test_enforce() {
        let limit = RateLimit::per_minute(10);
        assert!(enforce(RateLimitDecision::fail_open(limit)).is_ok());

        let denied = RateLimitDecision {
            allowed: false,
            limit: 10,
            remaining: 0,
            retry_after_secs: 6,
        };
        assert!(matches!(
            enforce(denied),
            Err(ApiError::RateLimitExceeded { retry_after: 6, .. })
        ));
    }
}
