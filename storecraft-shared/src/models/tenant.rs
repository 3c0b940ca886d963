//! Tenant (store) model and database operations
//!
//! A tenant is one store. Every product, customer, order and notification
//! row carries the owning tenant's id, and users reach a tenant through a
//! [`Membership`](super::membership::Membership).
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE tenants (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     name VARCHAR(255) NOT NULL,
//!     subdomain VARCHAR(63) NOT NULL UNIQUE,
//!     custom_domain VARCHAR(255) UNIQUE,
//!     plan tenant_plan NOT NULL DEFAULT 'trial',
//!     currency VARCHAR(3) NOT NULL DEFAULT 'USD',
//!     low_stock_threshold INTEGER NOT NULL DEFAULT 5,
//!     settings JSONB NOT NULL DEFAULT '{}',
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```
//!
//! # Example
//!
//! ```no_run
//! use storecraft_shared::models::tenant::{Tenant, CreateTenant, TenantPlan};
//! use storecraft_shared::db::pool::{create_pool, DatabaseConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = create_pool(DatabaseConfig::default()).await?;
//!
//! let tenant = Tenant::create(&pool, CreateTenant {
//!     name: "Acme Shoes".to_string(),
//!     subdomain: "acme-shoes".to_string(),
//!     plan: TenantPlan::Trial,
//!     currency: "USD".to_string(),
//! }).await?;
//!
//! let same = Tenant::find_by_subdomain(&pool, "acme-shoes").await?;
//! assert_eq!(same.map(|t| t.id), Some(tenant.id));
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::commerce::host::HostTarget;

const TENANT_COLUMNS: &str = "id, name, subdomain, custom_domain, plan, currency, \
                              low_stock_threshold, settings, created_at, updated_at";

/// Subscription plan
///
/// Plans size the per-store API rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "tenant_plan", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TenantPlan {
    Trial,
    Entry,
    Pro,
    Enterprise,
}

impl TenantPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantPlan::Trial => "trial",
            TenantPlan::Entry => "entry",
            TenantPlan::Pro => "pro",
            TenantPlan::Enterprise => "enterprise",
        }
    }

    /// Admin API requests allowed per minute
    pub fn requests_per_minute(&self) -> u32 {
        match self {
            TenantPlan::Trial => 60,
            TenantPlan::Entry => 300,
            TenantPlan::Pro => 1200,
            TenantPlan::Enterprise => 6000,
        }
    }
}

/// A store
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tenant {
    pub id: Uuid,

    /// Display name of the store
    pub name: String,

    /// Platform subdomain (`<subdomain>.<base_domain>`)
    pub subdomain: String,

    /// Owner's own domain, if attached
    pub custom_domain: Option<String>,

    pub plan: TenantPlan,

    /// ISO 4217 code used for every order of the store
    pub currency: String,

    /// Stock level at or below which a low-stock notification is raised
    pub low_stock_threshold: i32,

    /// Free-form store settings (JSONB, merged on update)
    pub settings: JsonValue,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenant {
    pub name: String,
    pub subdomain: String,

    #[serde(default = "default_plan")]
    pub plan: TenantPlan,

    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_plan() -> TenantPlan {
    TenantPlan::Trial
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Input for updating a store
///
/// `custom_domain: Some(None)` detaches the custom domain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTenant {
    pub name: Option<String>,
    pub custom_domain: Option<Option<String>>,
    pub plan: Option<TenantPlan>,
    pub currency: Option<String>,
    pub low_stock_threshold: Option<i32>,

    /// Merged into existing settings
    pub settings: Option<JsonValue>,
}

impl Tenant {
    /// Creates a store
    ///
    /// Accepts any executor so registration can create the store, the owner
    /// and the membership in one transaction.
    ///
    /// # Errors
    ///
    /// Returns a unique violation if the subdomain is taken.
    pub async fn create<'e, E>(executor: E, data: CreateTenant) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Tenant>(&format!(
            "INSERT INTO tenants (name, subdomain, plan, currency) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            TENANT_COLUMNS
        ))
        .bind(data.name)
        .bind(data.subdomain)
        .bind(data.plan)
        .bind(data.currency.to_uppercase())
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tenant>(&format!(
            "SELECT {} FROM tenants WHERE id = $1",
            TENANT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_subdomain(
        pool: &PgPool,
        subdomain: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tenant>(&format!(
            "SELECT {} FROM tenants WHERE subdomain = $1",
            TENANT_COLUMNS
        ))
        .bind(subdomain.to_ascii_lowercase())
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_custom_domain(
        pool: &PgPool,
        domain: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tenant>(&format!(
            "SELECT {} FROM tenants WHERE custom_domain = $1",
            TENANT_COLUMNS
        ))
        .bind(domain.to_ascii_lowercase())
        .fetch_optional(pool)
        .await
    }

    /// Finds the store a resolved host points at
    ///
    /// Platform hosts never resolve to a store.
    pub async fn find_by_host(
        pool: &PgPool,
        target: &HostTarget,
    ) -> Result<Option<Self>, sqlx::Error> {
        match target {
            HostTarget::Subdomain(sub) => Self::find_by_subdomain(pool, sub).await,
            HostTarget::CustomDomain(domain) => Self::find_by_custom_domain(pool, domain).await,
            HostTarget::Platform => Ok(None),
        }
    }

    pub async fn subdomain_exists(pool: &PgPool, subdomain: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tenants WHERE subdomain = $1)")
            .bind(subdomain)
            .fetch_one(pool)
            .await
    }

    /// Updates a store
    ///
    /// Only the fields set in `data` change. Settings are merged with the
    /// existing settings (`jsonb ||`), not replaced.
    ///
    /// # Returns
    ///
    /// The updated store, or None if it does not exist
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateTenant,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE tenants SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${}", bind_count));
        }
        if data.custom_domain.is_some() {
            bind_count += 1;
            query.push_str(&format!(", custom_domain = ${}", bind_count));
        }
        if data.plan.is_some() {
            bind_count += 1;
            query.push_str(&format!(", plan = ${}", bind_count));
        }
        if data.currency.is_some() {
            bind_count += 1;
            query.push_str(&format!(", currency = ${}", bind_count));
        }
        if data.low_stock_threshold.is_some() {
            bind_count += 1;
            query.push_str(&format!(", low_stock_threshold = ${}", bind_count));
        }
        if data.settings.is_some() {
            bind_count += 1;
            query.push_str(&format!(", settings = settings || ${}", bind_count));
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {}", TENANT_COLUMNS));

        let mut q = sqlx::query_as::<_, Tenant>(&query).bind(id);

        if let Some(name) = data.name {
            q = q.bind(name);
        }
        if let Some(domain) = data.custom_domain {
            q = q.bind(domain.map(|d| d.to_ascii_lowercase()));
        }
        if let Some(plan) = data.plan {
            q = q.bind(plan);
        }
        if let Some(currency) = data.currency {
            q = q.bind(currency.to_uppercase());
        }
        if let Some(threshold) = data.low_stock_threshold {
            q = q.bind(threshold);
        }
        if let Some(settings) = data.settings {
            q = q.bind(settings);
        }

        q.fetch_optional(pool).await
    }

    /// Deletes a store and, by cascade, everything it owns
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tenants WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_plan_as_str() {
        assert_eq!(TenantPlan::Trial.as_str(), "trial");
        assert_eq!(TenantPlan::Entry.as_str(), "entry");
        assert_eq!(TenantPlan::Pro.as_str(), "pro");
        assert_eq!(TenantPlan::Enterprise.as_str(), "enterprise");
    }

    #[test]
    fn test_plan_rate_limits_increase() {
        let limits: Vec<u32> = [
            TenantPlan::Trial,
            TenantPlan::Entry,
            TenantPlan::Pro,
            TenantPlan::Enterprise,
        ]
        .iter()
        .map(|p| p.requests_per_minute())
        .collect();

        assert_eq!(limits, vec![60, 300, 1200, 6000]);
    }

    #[test]
    fn test_create_tenant_defaults() {
        let create: CreateTenant =
            serde_json::from_str(r#"{"name": "Acme", "subdomain": "acme"}"#).unwrap();
        assert_eq!(create.plan, TenantPlan::Trial);
        assert_eq!(create.currency, "USD");
    }

    #[test]
    fn test_update_tenant_default() {
        let update = UpdateTenant::default();
        assert!(update.name.is_none());
        assert!(update.custom_domain.is_none());
        assert!(update.settings.is_none());
    }
}
