//! Dashboard notifications
//!
//! Written by the order flow (new orders, status changes, low stock) and
//! read by store staff. Notifications are per store, not per user: marking
//! one read marks it read for everyone on the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

const NOTIFICATION_COLUMNS: &str =
    "id, tenant_id, kind, title, message, order_id, product_id, read, created_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewOrder,
    OrderStatus,
    LowStock,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::NewOrder => "new_order",
            NotificationKind::OrderStatus => "order_status",
            NotificationKind::LowStock => "low_stock",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub order_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNotification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub order_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
}

impl CreateNotification {
    pub fn new_order(order_id: Uuid, order_number: i64, total: &str, currency: &str) -> Self {
        Self {
            kind: NotificationKind::NewOrder,
            title: format!("New order #{}", order_number),
            message: format!("Order #{} was placed for {} {}", order_number, total, currency),
            order_id: Some(order_id),
            product_id: None,
        }
    }

    pub fn order_status(order_id: Uuid, order_number: i64, status: &str) -> Self {
        Self {
            kind: NotificationKind::OrderStatus,
            title: format!("Order #{} {}", order_number, status),
            message: format!("Order #{} is now {}", order_number, status),
            order_id: Some(order_id),
            product_id: None,
        }
    }

    pub fn low_stock(product_id: Uuid, product_name: &str, stock: i32) -> Self {
        Self {
            kind: NotificationKind::LowStock,
            title: format!("Low stock: {}", product_name),
            message: if stock == 0 {
                format!("{} is out of stock", product_name)
            } else {
                format!("Only {} left of {}", stock, product_name)
            },
            order_id: None,
            product_id: Some(product_id),
        }
    }
}

impl Notification {
    pub async fn create<'e, E>(
        executor: E,
        tenant_id: Uuid,
        data: CreateNotification,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Notification>(&format!(
            "INSERT INTO notifications (tenant_id, kind, title, message, order_id, product_id) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            NOTIFICATION_COLUMNS
        ))
        .bind(tenant_id)
        .bind(data.kind)
        .bind(data.title)
        .bind(data.message)
        .bind(data.order_id)
        .bind(data.product_id)
        .fetch_one(executor)
        .await
    }

    /// Lists a store's notifications, newest first
    pub async fn list_by_tenant(
        pool: &PgPool,
        tenant_id: Uuid,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(&format!(
            "SELECT {} FROM notifications \
             WHERE tenant_id = $1 AND ($2 = FALSE OR read = FALSE) \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4",
            NOTIFICATION_COLUMNS
        ))
        .bind(tenant_id)
        .bind(unread_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn unread_count(pool: &PgPool, tenant_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE tenant_id = $1 AND read = FALSE")
            .bind(tenant_id)
            .fetch_one(pool)
            .await
    }

    /// Marks one notification read
    ///
    /// # Returns
    ///
    /// The notification, or None if it does not exist in the store
    pub async fn mark_read(
        pool: &PgPool,
        id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(&format!(
            "UPDATE notifications SET read = TRUE WHERE id = $1 AND tenant_id = $2 RETURNING {}",
            NOTIFICATION_COLUMNS
        ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    /// Marks every unread notification of the store read, returning how many changed
    pub async fn mark_all_read(pool: &PgPool, tenant_id: Uuid) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("UPDATE notifications SET read = TRUE WHERE tenant_id = $1 AND read = FALSE")
                .bind(tenant_id)
                .execute(pool)
                .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&NotificationKind::LowStock).unwrap(),
            "\"low_stock\""
        );
        assert_eq!(NotificationKind::NewOrder.as_str(), "new_order");
    }

    #[test]
    fn test_new_order_message() {
        let order_id = Uuid::new_v4();
        let n = CreateNotification::new_order(order_id, 1001, "49.00", "USD");
        assert_eq!(n.title, "New order #1001");
        assert_eq!(n.message, "Order #1001 was placed for 49.00 USD");
        assert_eq!(n.order_id, Some(order_id));
    }

    #[test]
    fn test_low_stock_message() {
        let id = Uuid::new_v4();
        assert_eq!(
            CreateNotification::low_stock(id, "Linen Shirt", 0).message,
            "Linen Shirt is out of stock"
        );
        assert_eq!(
            CreateNotification::low_stock(id, "Linen Shirt", 2).message,
            "Only 2 left of Linen Shirt"
        );
    }
}
