//! Store resolution from the HTTP `Host` header
//!
//! Every store is reachable at `<subdomain>.<base_domain>`, and optionally at
//! a custom domain the owner points at the platform. The platform itself
//! answers on the bare base domain and a few reserved subdomains.
//!
//! # Example
//!
//! ```
//! use storecraft_shared::commerce::host::{resolve_host, HostTarget};
//!
//! assert_eq!(
//!     resolve_host("acme.shops.test:8080", "shops.test"),
//!     HostTarget::Subdomain("acme".to_string())
//! );
//! assert_eq!(
//!     resolve_host("www.acme-clothing.com", "shops.test"),
//!     HostTarget::CustomDomain("www.acme-clothing.com".to_string())
//! );
//! ```

/// Subdomains that belong to the platform, never to a store
pub const RESERVED_SUBDOMAINS: &[&str] = &["www", "api", "admin", "app"];

/// What a `Host` header points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostTarget {
    /// A store addressed by its platform subdomain
    Subdomain(String),

    /// A store addressed by its own domain
    CustomDomain(String),

    /// The platform itself (no store)
    Platform,
}

/// Lowercases and strips the port and trailing dot from a host value
pub fn normalize_host(host: &str) -> String {
    let host = host.trim();

    // IPv6 literals keep their brackets; only a port after them is dropped
    let without_port = if host.starts_with('[') {
        match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        }
    } else {
        host.split(':').next().unwrap_or(host)
    };

    without_port.trim_end_matches('.').to_ascii_lowercase()
}

/// Resolves a `Host` header against the platform base domain
pub fn resolve_host(host: &str, base_domain: &str) -> HostTarget {
    let host = normalize_host(host);
    let base = normalize_host(base_domain);

    if host.is_empty() || host == base {
        return HostTarget::Platform;
    }

    if let Some(sub) = host.strip_suffix(&format!(".{}", base)) {
        // Only one label deep: "a.b.base" is not a store
        if sub.contains('.') || RESERVED_SUBDOMAINS.contains(&sub) {
            return HostTarget::Platform;
        }
        return HostTarget::Subdomain(sub.to_string());
    }

    HostTarget::CustomDomain(host)
}

/// Checks a requested store subdomain
///
/// # Errors
///
/// Returns a human-readable reason when the subdomain is unusable.
pub fn validate_subdomain(subdomain: &str) -> Result<(), String> {
    if subdomain.len() < 3 || subdomain.len() > 63 {
        return Err("Subdomain must be 3-63 characters long".to_string());
    }

    if !subdomain
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("Subdomain may only contain lowercase letters, digits and hyphens".to_string());
    }

    if subdomain.starts_with('-') || subdomain.ends_with('-') {
        return Err("Subdomain cannot start or end with a hyphen".to_string());
    }

    if RESERVED_SUBDOMAINS.contains(&subdomain) {
        return Err(format!("Subdomain '{}' is reserved", subdomain));
    }

    Ok(())
}

/// Checks a custom domain before it is attached to a store
pub fn validate_custom_domain(domain: &str, base_domain: &str) -> Result<String, String> {
    let domain = normalize_host(domain);

    if domain.len() > 253 || !domain.contains('.') {
        return Err("Custom domain must be a fully qualified domain name".to_string());
    }

    if domain
        .split('.')
        .any(|label| label.is_empty() || label.starts_with('-') || label.ends_with('-'))
    {
        return Err("Custom domain has an invalid label".to_string());
    }

    if !domain
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
    {
        return Err("Custom domain contains invalid characters".to_string());
    }

    if matches!(resolve_host(&domain, base_domain), HostTarget::Subdomain(_) | HostTarget::Platform) {
        return Err("Custom domain cannot be under the platform domain".to_string());
    }

    Ok(domain)
}

/// Derives a subdomain candidate from a store name ("Acme Shoes!" → "acme-shoes")
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }

    slug.trim_end_matches('-').chars().take(63).collect::<String>().trim_end_matches('-').to_string()
}
