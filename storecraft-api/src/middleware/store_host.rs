//! Storefront store resolution
//!
//! Public storefront routes belong to whichever store the request's host
//! names: `<subdomain>.<BASE_DOMAIN>` or a store's custom domain. Behind a
//! proxy that rewrites `Host`, the original host may be sent as
//! `X-Store-Host`. The resolved [`Tenant`] is put in the request extensions.

use crate::app::AppState;
use crate::error::ApiError;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use storecraft_shared::commerce::host::{resolve_host, HostTarget};
use storecraft_shared::models::tenant::Tenant;

pub const STORE_HOST_HEADER: &str = "x-store-host";

/// Host the storefront request was addressed to
pub fn request_host(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(STORE_HOST_HEADER)
        .or_else(|| headers.get(header::HOST))
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|host| !host.is_empty())
}

pub async fn resolve_store(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let host = request_host(request.headers())
        .or_else(|| request.uri().host())
        .unwrap_or_default()
        .to_string();

    let target = resolve_host(&host, &state.config.storefront.base_domain);
    if target == HostTarget::Platform {
        return Err(ApiError::NotFound("Store not found".to_string()));
    }

    let tenant = Tenant::find_by_host(&state.db, &target)
        .await?
        .ok_or_else(|| {
            tracing::debug!(host = %host, "No store for host");
            ApiError::NotFound("Store not found".to_string())
        })?;

    tracing::debug!(tenant_id = %tenant.id, host = %host, "Resolved storefront store");
    request.extensions_mut().insert(tenant);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_request_host_prefers_store_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("api.internal:8080"));
        assert_eq!(request_host(&headers), Some("api.internal:8080"));

        headers.insert(STORE_HOST_HEADER, HeaderValue::from_static("shop.example.com"));
        assert_eq!(request_host(&headers), Some("shop.example.com"));
    }

    #[test]
    fn test_request_host_missing() {
        assert_eq!(request_host(&HeaderMap::new()), None);
    }
}
