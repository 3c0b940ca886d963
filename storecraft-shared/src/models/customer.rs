//! Customer model and the dedup-or-create rule used at checkout
//!
//! Customers are shoppers of one store. They are matched by email first
//! (case-insensitive), then by phone (digits and a leading `+` only), so a
//! returning shopper keeps a single record and accumulates order stats.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

const CUSTOMER_COLUMNS: &str = "id, tenant_id, name, email, phone, address, order_count, \
                                total_spent, created_at, updated_at";

/// Matches when `$2` is NULL or any contact field contains it
const SEARCH_CLAUSE: &str =
    "($2::TEXT IS NULL OR name ILIKE $2 OR email ILIKE $2 OR phone ILIKE $2)";

/// Postal address, stored as JSONB
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub line1: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,

    #[serde(default)]
    pub city: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,

    #[serde(default)]
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Customer {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,

    /// Lower-cased email
    pub email: Option<String>,

    /// Normalized phone number
    pub phone: Option<String>,

    pub address: Option<Json<Address>>,

    /// Orders placed, maintained by order creation
    pub order_count: i32,

    /// Sum of order totals
    pub total_spent: Decimal,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateCustomer {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Address>,
}

/// Input for updating a customer
///
/// Double options clear the field when set to `Some(None)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCustomer {
    pub name: Option<String>,
    pub email: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub address: Option<Option<Address>>,
}

/// Lower-cases and trims an email; blank input becomes None
pub fn normalize_email(email: Option<&str>) -> Option<String> {
    email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
}

/// Keeps digits and a leading `+`; input without digits becomes None
pub fn normalize_phone(phone: Option<&str>) -> Option<String> {
    let phone = phone?.trim();
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.is_empty() {
        return None;
    }

    if phone.starts_with('+') {
        Some(format!("+{}", digits))
    } else {
        Some(digits)
    }
}

impl CreateCustomer {
    fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: normalize_email(self.email.as_deref()),
            phone: normalize_phone(self.phone.as_deref()),
            address: self.address,
        }
    }
}

impl Customer {
    /// Creates a customer
    ///
    /// # Errors
    ///
    /// Returns a unique violation when a customer with the same email
    /// already exists in the store.
    pub async fn create<'e, E>(
        executor: E,
        tenant_id: Uuid,
        data: CreateCustomer,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let data = data.normalized();

        sqlx::query_as::<_, Customer>(&format!(
            "INSERT INTO customers (tenant_id, name, email, phone, address) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            CUSTOMER_COLUMNS
        ))
        .bind(tenant_id)
        .bind(data.name)
        .bind(data.email)
        .bind(data.phone)
        .bind(data.address.map(Json))
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id_and_tenant(
        pool: &PgPool,
        id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Customer>(&format!(
            "SELECT {} FROM customers WHERE id = $1 AND tenant_id = $2",
            CUSTOMER_COLUMNS
        ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_email<'e, E>(
        executor: E,
        tenant_id: Uuid,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Customer>(&format!(
            "SELECT {} FROM customers WHERE tenant_id = $1 AND email = $2",
            CUSTOMER_COLUMNS
        ))
        .bind(tenant_id)
        .bind(email.trim().to_lowercase())
        .fetch_optional(executor)
        .await
    }

    /// Finds the oldest customer with a phone number
    pub async fn find_by_phone<'e, E>(
        executor: E,
        tenant_id: Uuid,
        phone: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Customer>(&format!(
            "SELECT {} FROM customers WHERE tenant_id = $1 AND phone = $2 \
             ORDER BY created_at ASC LIMIT 1",
            CUSTOMER_COLUMNS
        ))
        .bind(tenant_id)
        .bind(phone)
        .fetch_optional(executor)
        .await
    }

    /// Returns the store's existing customer for this contact, or creates one
    ///
    /// A match on email wins over a match on phone. A reused record only gets
    /// its blank fields filled in (email, phone, address); a name or contact
    /// detail already on file is never overwritten by checkout input.
    ///
    /// Runs on the caller's connection so it joins the order transaction.
    /// Concurrent first orders with the same email are serialized by the
    /// unique `(tenant_id, email)` index plus `ON CONFLICT`.
    pub async fn find_or_create(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        data: CreateCustomer,
    ) -> Result<Self, sqlx::Error> {
        let data = data.normalized();

        let mut existing = None;
        if let Some(email) = data.email.as_deref() {
            existing = Self::find_by_email(&mut *conn, tenant_id, email).await?;
        }
        if existing.is_none() {
            if let Some(phone) = data.phone.as_deref() {
                existing = Self::find_by_phone(&mut *conn, tenant_id, phone).await?;
            }
        }

        if let Some(customer) = existing {
            tracing::debug!(customer_id = %customer.id, "Reusing existing customer");
            return Self::fill_missing(conn, customer.id, data).await;
        }

        let customer = sqlx::query_as::<_, Customer>(&format!(
            "INSERT INTO customers (tenant_id, name, email, phone, address) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (tenant_id, email) WHERE email IS NOT NULL \
             DO UPDATE SET updated_at = NOW() \
             RETURNING {}",
            CUSTOMER_COLUMNS
        ))
        .bind(tenant_id)
        .bind(&data.name)
        .bind(&data.email)
        .bind(&data.phone)
        .bind(data.address.clone().map(Json))
        .fetch_one(&mut *conn)
        .await?;

        tracing::debug!(customer_id = %customer.id, "Created customer");
        Ok(customer)
    }

    async fn fill_missing(
        conn: &mut PgConnection,
        id: Uuid,
        data: CreateCustomer,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Customer>(&format!(
            r#"
            UPDATE customers
            SET email = COALESCE(email, $2),
                phone = COALESCE(phone, $3),
                address = COALESCE(address, $4),
                name = CASE WHEN name = '' THEN $5 ELSE name END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            CUSTOMER_COLUMNS
        ))
        .bind(id)
        .bind(data.email)
        .bind(data.phone)
        .bind(data.address.map(Json))
        .bind(data.name)
        .fetch_one(conn)
        .await
    }

    /// Adds a placed order to the customer's stats
    pub async fn record_order(
        conn: &mut PgConnection,
        id: Uuid,
        total: Decimal,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE customers
            SET order_count = order_count + 1,
                total_spent = total_spent + $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(total)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Lists a store's customers, newest first
    ///
    /// `search` matches name, email or phone, case-insensitively.
    pub async fn list_by_tenant(
        pool: &PgPool,
        tenant_id: Uuid,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Customer>(&format!(
            "SELECT {} FROM customers WHERE tenant_id = $1 AND {} \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4",
            CUSTOMER_COLUMNS, SEARCH_CLAUSE
        ))
        .bind(tenant_id)
        .bind(search.map(super::contains_pattern))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn count_by_tenant(
        pool: &PgPool,
        tenant_id: Uuid,
        search: Option<&str>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM customers WHERE tenant_id = $1 AND {}",
            SEARCH_CLAUSE
        ))
        .bind(tenant_id)
        .bind(search.map(super::contains_pattern))
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        tenant_id: Uuid,
        data: UpdateCustomer,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE customers SET updated_at = NOW()");
        let mut bind_count = 2;

        if data.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${}", bind_count));
        }
        if data.email.is_some() {
            bind_count += 1;
            query.push_str(&format!(", email = ${}", bind_count));
        }
        if data.phone.is_some() {
            bind_count += 1;
            query.push_str(&format!(", phone = ${}", bind_count));
        }
        if data.address.is_some() {
            bind_count += 1;
            query.push_str(&format!(", address = ${}", bind_count));
        }

        query.push_str(&format!(
            " WHERE id = $1 AND tenant_id = $2 RETURNING {}",
            CUSTOMER_COLUMNS
        ));

        let mut q = sqlx::query_as::<_, Customer>(&query).bind(id).bind(tenant_id);

        if let Some(name) = data.name {
            q = q.bind(name.trim().to_string());
        }
        if let Some(email) = data.email {
            q = q.bind(normalize_email(email.as_deref()));
        }
        if let Some(phone) = data.phone {
            q = q.bind(normalize_phone(phone.as_deref()));
        }
        if let Some(address) = data.address {
            q = q.bind(address.map(Json));
        }

        q.fetch_optional(pool).await
    }

    /// Deletes a customer; their orders keep existing without a customer link
    pub async fn delete(pool: &PgPool, id: Uuid, tenant_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email(Some("  Jane.Doe@Example.COM ")).as_deref(),
            Some("jane.doe@example.com")
        );
        assert_eq!(normalize_email(Some("   ")), None);
        assert_eq!(normalize_email(None), None);
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(
            normalize_phone(Some("+1 (555) 010-9999")).as_deref(),
            Some("+15550109999")
        );
        assert_eq!(normalize_phone(Some("0555 01 02")).as_deref(), Some("05550102"));
        assert_eq!(normalize_phone(Some("n/a")), None);
    }

    #[test]
    fn test_create_customer_normalized() {
        let data = CreateCustomer {
            name: "  Jane Doe ".to_string(),
            email: Some("JANE@example.com".to_string()),
            phone: Some("".to_string()),
            address: None,
        }
        .normalized();

        assert_eq!(data.name, "Jane Doe");
        assert_eq!(data.email.as_deref(), Some("jane@example.com"));
        assert!(data.phone.is_none());
    }

    #[test]
    fn test_address_skips_empty_optionals() {
        let address = Address {
            line1: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            country: "US".to_string(),
            ..Default::default()
        };

        let json = serde_json::to_value(&address).unwrap();
        assert!(json.get("line2").is_none());
        assert_eq!(json["city"], "Springfield");
    }
}
