//! Order model: placement, status changes, payment and invoices
//!
//! Every write here runs in a transaction. Placement allocates the order
//! number from a per-store counter row, so concurrent checkouts in one store
//! are numbered consecutively and never collide. Status and payment changes
//! lock the order row first, so the stock movement attached to a transition
//! is applied exactly once.
//!
//! # Example
//!
//! ```no_run
//! use storecraft_shared::commerce::lifecycle::{OrderStatus, PaymentMethod};
//! use storecraft_shared::models::customer::CreateCustomer;
//! use storecraft_shared::models::order::{NewOrder, NewOrderItem, Order};
//! # use sqlx::PgPool;
//! # use uuid::Uuid;
//!
//! # async fn example(pool: PgPool, tenant_id: Uuid, product_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
//! let order = Order::create(&pool, tenant_id, NewOrder {
//!     customer: CreateCustomer {
//!         name: "Jane Doe".to_string(),
//!         email: Some("jane@example.com".to_string()),
//!         ..Default::default()
//!     },
//!     items: vec![NewOrderItem::new(product_id, 2)],
//!     payment_method: PaymentMethod::CashOnDelivery,
//!     ..Default::default()
//! }).await?;
//!
//! Order::update_status(&pool, tenant_id, order.id, OrderStatus::Confirmed).await?;
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::commerce::lifecycle::{
    initial_payment_status, plan_payment_change, plan_transition, InventoryEffect, OrderError,
    OrderStatus, PaymentMethod, PaymentStatus,
};
use crate::commerce::pricing::{
    check_amounts, compute_totals, select_variant, OrderItem, VariantSelection,
};
use crate::models::customer::{Address, CreateCustomer, Customer};
use crate::models::notification::{CreateNotification, Notification};
use crate::models::product::{Product, ProductVariant, StockLevel};

/// Number given to the first order of every store
pub const FIRST_ORDER_NUMBER: i64 = 1001;

const ORDER_COLUMNS: &str = "id, tenant_id, order_number, customer_id, status, payment_status, \
                             payment_method, items, invoices, currency, subtotal, shipping_fee, \
                             discount, total, shipping_address, note, delivered_at, cancelled_at, \
                             created_at, updated_at";

/// An invoice issued against an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// `<order_number>-<sequence>`, e.g. `1001-2`
    pub invoice_number: String,
    pub amount: Decimal,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub tenant_id: Uuid,

    /// Human-facing number, sequential per store
    pub order_number: i64,

    /// None once the customer record has been deleted
    pub customer_id: Option<Uuid>,

    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,

    /// Line items as priced at checkout
    pub items: Json<Vec<OrderItem>>,

    pub invoices: Json<Vec<Invoice>>,
    pub currency: String,
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub shipping_address: Option<Json<Address>>,
    pub note: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A requested line: product, optional variant selection, quantity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: Uuid,

    #[serde(flatten)]
    pub variant: VariantSelection,

    pub quantity: i32,
}

impl NewOrderItem {
    pub fn new(product_id: Uuid, quantity: i32) -> Self {
        Self {
            product_id,
            variant: VariantSelection::default(),
            quantity,
        }
    }
}

/// Input for placing an order
///
/// Prices are never taken from here; they come from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer: CreateCustomer,
    pub items: Vec<NewOrderItem>,
    pub payment_method: PaymentMethod,

    /// Payment already captured by the provider (online orders only)
    #[serde(default)]
    pub paid_upfront: bool,

    #[serde(default)]
    pub shipping_fee: Decimal,

    #[serde(default)]
    pub discount: Decimal,

    /// Defaults to the customer address
    #[serde(default)]
    pub shipping_address: Option<Address>,

    #[serde(default)]
    pub note: Option<String>,
}

impl Default for NewOrder {
    fn default() -> Self {
        Self {
            customer: CreateCustomer::default(),
            items: Vec::new(),
            payment_method: PaymentMethod::CashOnDelivery,
            paid_upfront: false,
            shipping_fee: Decimal::ZERO,
            discount: Decimal::ZERO,
            shipping_address: None,
            note: None,
        }
    }
}

/// Listing filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub customer_id: Option<Uuid>,
}

impl OrderFilter {
    /// Appends WHERE conditions after `tenant_id = $1`, returning the last bind index
    fn push_conditions(&self, query: &mut String) -> usize {
        let mut bind_count = 1;
        if self.status.is_some() {
            bind_count += 1;
            query.push_str(&format!(" AND status = ${}", bind_count));
        }
        if self.payment_status.is_some() {
            bind_count += 1;
            query.push_str(&format!(" AND payment_status = ${}", bind_count));
        }
        if self.customer_id.is_some() {
            bind_count += 1;
            query.push_str(&format!(" AND customer_id = ${}", bind_count));
        }
        bind_count
    }
}

/// Errors from order persistence
#[derive(Debug, thiserror::Error)]
pub enum OrderStoreError {
    /// A business rule rejected the operation
    #[error(transparent)]
    Rule(#[from] OrderError),

    /// Order (or its store) does not exist for this tenant
    #[error("Order not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Prices one requested line against a product and its variants
///
/// Products without variants ignore color/size and sell their own stock; an
/// explicit variant id on such a product is an error.
pub fn price_line(
    product: &Product,
    variants: &[ProductVariant],
    request: &NewOrderItem,
) -> Result<OrderItem, OrderError> {
    if !product.is_purchasable() {
        return Err(OrderError::ProductUnavailable(product.id));
    }

    if variants.is_empty() {
        if request.variant.variant_id.is_some() {
            return Err(OrderError::VariantNotFound(product.id));
        }
        return OrderItem::priced(product, None, request.quantity);
    }

    let variant = select_variant(variants, &request.variant)
        .ok_or(OrderError::VariantNotFound(product.id))?;

    OrderItem::priced(product, Some(variant), request.quantity)
}

/// Builds the next invoice for an order
///
/// # Errors
///
/// Returns `OrderError::InvalidInvoiceAmount` for a non-positive amount.
pub fn next_invoice(order: &Order, amount: Option<Decimal>) -> Result<Invoice, OrderError> {
    let amount = amount.unwrap_or(order.total);
    if amount <= Decimal::ZERO {
        return Err(OrderError::InvalidInvoiceAmount);
    }

    Ok(Invoice {
        invoice_number: format!("{}-{}", order.order_number, order.invoices.len() + 1),
        amount,
        issued_at: Utc::now(),
    })
}

impl Order {
    pub fn items(&self) -> &[OrderItem] {
        &self.items.0
    }

    /// Places an order
    ///
    /// In one transaction: prices the lines from the catalog, finds or
    /// creates the customer, allocates the next order number, inserts the
    /// order, updates the customer's stats and raises a `new_order`
    /// notification.
    ///
    /// # Errors
    ///
    /// - `OrderStoreError::Rule` for an empty order, a bad quantity, an
    ///   unavailable product, an unknown variant or amounts too large to store
    /// - `OrderStoreError::NotFound` if the store does not exist
    pub async fn create(
        pool: &PgPool,
        tenant_id: Uuid,
        data: NewOrder,
    ) -> Result<Self, OrderStoreError> {
        if data.items.is_empty() {
            return Err(OrderError::EmptyOrder.into());
        }

        let mut tx = pool.begin().await?;

        let currency: String = sqlx::query_scalar("SELECT currency FROM tenants WHERE id = $1")
            .bind(tenant_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(OrderStoreError::NotFound)?;

        let mut items = Vec::with_capacity(data.items.len());
        for request in &data.items {
            let product = Product::find_by_id_and_tenant(&mut *tx, request.product_id, tenant_id)
                .await?
                .ok_or(OrderError::ProductUnavailable(request.product_id))?;
            let variants = ProductVariant::list_by_product(&mut *tx, product.id, tenant_id).await?;

            items.push(price_line(&product, &variants, request)?);
        }

        let totals = compute_totals(&items, data.shipping_fee, data.discount);
        check_amounts(&totals)?;

        let shipping_address = data
            .shipping_address
            .clone()
            .or_else(|| data.customer.address.clone());
        let customer = Customer::find_or_create(&mut tx, tenant_id, data.customer).await?;

        let order_number = allocate_order_number(&mut tx, tenant_id).await?;

        let order = sqlx::query_as::<_, Order>(&format!(
            "INSERT INTO orders (tenant_id, order_number, customer_id, status, payment_status, \
             payment_method, items, currency, subtotal, shipping_fee, discount, total, \
             shipping_address, note) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {}",
            ORDER_COLUMNS
        ))
        .bind(tenant_id)
        .bind(order_number)
        .bind(customer.id)
        .bind(OrderStatus::Pending)
        .bind(initial_payment_status(data.payment_method, data.paid_upfront))
        .bind(data.payment_method)
        .bind(Json(&items))
        .bind(currency)
        .bind(totals.subtotal)
        .bind(totals.shipping_fee)
        .bind(totals.discount)
        .bind(totals.total)
        .bind(shipping_address.map(Json))
        .bind(data.note)
        .fetch_one(&mut *tx)
        .await?;

        Customer::record_order(&mut tx, customer.id, order.total).await?;

        Notification::create(
            &mut *tx,
            tenant_id,
            CreateNotification::new_order(
                order.id,
                order.order_number,
                &order.total.to_string(),
                &order.currency,
            ),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            order_id = %order.id,
            order_number = order.order_number,
            total = %order.total,
            "Order placed"
        );

        Ok(order)
    }

    /// Finds an order within a store
    pub async fn find_by_id_and_tenant(
        pool: &PgPool,
        id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE id = $1 AND tenant_id = $2",
            ORDER_COLUMNS
        ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_number(
        pool: &PgPool,
        tenant_id: Uuid,
        order_number: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE tenant_id = $1 AND order_number = $2",
            ORDER_COLUMNS
        ))
        .bind(tenant_id)
        .bind(order_number)
        .fetch_optional(pool)
        .await
    }

    /// Lists a store's orders, newest first
    pub async fn list_by_tenant(
        pool: &PgPool,
        tenant_id: Uuid,
        filter: &OrderFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut query = format!("SELECT {} FROM orders WHERE tenant_id = $1", ORDER_COLUMNS);
        let bind_count = filter.push_conditions(&mut query);
        query.push_str(&format!(
            " ORDER BY created_at DESC, order_number DESC LIMIT ${} OFFSET ${}",
            bind_count + 1,
            bind_count + 2
        ));

        let mut q = sqlx::query_as::<_, Order>(&query).bind(tenant_id);
        if let Some(status) = filter.status {
            q = q.bind(status);
        }
        if let Some(payment_status) = filter.payment_status {
            q = q.bind(payment_status);
        }
        if let Some(customer_id) = filter.customer_id {
            q = q.bind(customer_id);
        }

        q.bind(limit).bind(offset).fetch_all(pool).await
    }

    pub async fn count_by_tenant(
        pool: &PgPool,
        tenant_id: Uuid,
        filter: &OrderFilter,
    ) -> Result<i64, sqlx::Error> {
        let mut query = String::from("SELECT COUNT(*) FROM orders WHERE tenant_id = $1");
        filter.push_conditions(&mut query);

        let mut q = sqlx::query_scalar::<_, i64>(&query).bind(tenant_id);
        if let Some(status) = filter.status {
            q = q.bind(status);
        }
        if let Some(payment_status) = filter.payment_status {
            q = q.bind(payment_status);
        }
        if let Some(customer_id) = filter.customer_id {
            q = q.bind(customer_id);
        }

        q.fetch_one(pool).await
    }

    /// Moves an order to a new status
    ///
    /// Locks the order row, validates the transition, applies the derived
    /// payment status and the stock movement, and raises notifications
    /// (`order_status`, plus `low_stock` for lines whose stock fell to the
    /// store threshold or below).
    ///
    /// # Errors
    ///
    /// - `OrderStoreError::NotFound` if the order is not in this store
    /// - `OrderStoreError::Rule(OrderError::InvalidTransition)` if the state
    ///   machine forbids the change
    pub async fn update_status(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
        target: OrderStatus,
    ) -> Result<Self, OrderStoreError> {
        let mut tx = pool.begin().await?;

        let order = lock_order(&mut tx, id, tenant_id).await?;
        let plan = plan_transition(order.status, order.payment_status, order.payment_method, target)?;

        if plan.inventory != InventoryEffect::None {
            let threshold: i32 =
                sqlx::query_scalar("SELECT low_stock_threshold FROM tenants WHERE id = $1")
                    .bind(tenant_id)
                    .fetch_one(&mut *tx)
                    .await?;

            for item in order.items() {
                let level = apply_stock_effect(&mut tx, tenant_id, item, plan.inventory).await?;

                match level {
                    Some(level)
                        if plan.inventory == InventoryEffect::Decrement
                            && level.stock <= threshold =>
                    {
                        tracing::info!(
                            tenant_id = %tenant_id,
                            product_id = %level.product_id,
                            stock = level.stock,
                            "Stock at or below threshold"
                        );
                        Notification::create(
                            &mut *tx,
                            tenant_id,
                            CreateNotification::low_stock(level.product_id, &item.name, level.stock),
                        )
                        .await?;
                    }
                    Some(_) => {}
                    None => {
                        tracing::warn!(
                            order_id = %order.id,
                            product_id = %item.product_id,
                            "Product no longer exists, stock not adjusted"
                        );
                    }
                }
            }
        }

        let now = Utc::now();
        let delivered_at = if target == OrderStatus::Delivered {
            Some(now)
        } else {
            order.delivered_at
        };
        let cancelled_at = if target == OrderStatus::Cancelled {
            Some(now)
        } else {
            order.cancelled_at
        };

        let updated = sqlx::query_as::<_, Order>(&format!(
            "UPDATE orders SET status = $2, payment_status = $3, delivered_at = $4, \
             cancelled_at = $5, updated_at = NOW() WHERE id = $1 RETURNING {}",
            ORDER_COLUMNS
        ))
        .bind(order.id)
        .bind(plan.to)
        .bind(plan.payment_status)
        .bind(delivered_at)
        .bind(cancelled_at)
        .fetch_one(&mut *tx)
        .await?;

        Notification::create(
            &mut *tx,
            tenant_id,
            CreateNotification::order_status(updated.id, updated.order_number, plan.to.as_str()),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            order_id = %updated.id,
            from = %plan.from,
            to = %plan.to,
            payment_status = %plan.payment_status,
            "Order status changed"
        );

        Ok(updated)
    }

    /// Sets the payment status by hand
    ///
    /// # Errors
    ///
    /// `OrderStoreError::Rule(OrderError::InvalidPaymentTransition)` when the
    /// change is not one staff may make.
    pub async fn update_payment_status(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
        target: PaymentStatus,
    ) -> Result<Self, OrderStoreError> {
        let mut tx = pool.begin().await?;

        let order = lock_order(&mut tx, id, tenant_id).await?;
        let payment_status = plan_payment_change(order.payment_status, target)?;

        let updated = sqlx::query_as::<_, Order>(&format!(
            "UPDATE orders SET payment_status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            ORDER_COLUMNS
        ))
        .bind(order.id)
        .bind(payment_status)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            order_id = %updated.id,
            payment_status = %payment_status,
            "Payment status changed"
        );

        Ok(updated)
    }

    /// Issues an invoice for an order
    ///
    /// The amount defaults to the order total.
    pub async fn add_invoice(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
        amount: Option<Decimal>,
    ) -> Result<Self, OrderStoreError> {
        let mut tx = pool.begin().await?;

        let mut order = lock_order(&mut tx, id, tenant_id).await?;
        let invoice = next_invoice(&order, amount)?;
        let invoice_number = invoice.invoice_number.clone();
        order.invoices.0.push(invoice);

        let updated = sqlx::query_as::<_, Order>(&format!(
            "UPDATE orders SET invoices = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            ORDER_COLUMNS
        ))
        .bind(order.id)
        .bind(&order.invoices)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(order_id = %updated.id, invoice_number = %invoice_number, "Invoice issued");

        Ok(updated)
    }
}

/// Takes the next number from the store's counter
///
/// The upsert holds the counter row lock until the surrounding transaction
/// ends, which serializes checkouts of one store.
async fn allocate_order_number(
    conn: &mut PgConnection,
    tenant_id: Uuid,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO order_counters (tenant_id, last_number)
        VALUES ($1, $2)
        ON CONFLICT (tenant_id)
        DO UPDATE SET last_number = order_counters.last_number + 1
        RETURNING last_number
        "#,
    )
    .bind(tenant_id)
    .bind(FIRST_ORDER_NUMBER)
    .fetch_one(conn)
    .await
}

async fn lock_order(
    conn: &mut PgConnection,
    id: Uuid,
    tenant_id: Uuid,
) -> Result<Order, OrderStoreError> {
    sqlx::query_as::<_, Order>(&format!(
        "SELECT {} FROM orders WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
        ORDER_COLUMNS
    ))
    .bind(id)
    .bind(tenant_id)
    .fetch_optional(conn)
    .await?
    .ok_or(OrderStoreError::NotFound)
}

/// Moves stock for one line
///
/// The line's variant is used when it still exists. Otherwise the product's
/// current variants are matched on the recorded color/size, and products
/// without a match fall back to product-level stock.
async fn apply_stock_effect(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    item: &OrderItem,
    effect: InventoryEffect,
) -> Result<Option<StockLevel>, sqlx::Error> {
    let quantity = item.quantity;

    if let Some(variant_id) = item.variant_id {
        let level = match effect {
            InventoryEffect::Decrement => {
                ProductVariant::decrement_stock(&mut *conn, variant_id, tenant_id, quantity).await?
            }
            InventoryEffect::Restock => {
                ProductVariant::restock(&mut *conn, variant_id, tenant_id, quantity).await?
            }
            InventoryEffect::None => return Ok(None),
        };
        if level.is_some() {
            return Ok(level);
        }
    }

    let variants = ProductVariant::list_by_product(&mut *conn, item.product_id, tenant_id).await?;
    let selection = VariantSelection {
        variant_id: None,
        color: item.color.clone(),
        size: item.size.clone(),
    };

    if let Some(variant) = select_variant(&variants, &selection) {
        return match effect {
            InventoryEffect::Decrement => {
                ProductVariant::decrement_stock(&mut *conn, variant.id, tenant_id, quantity).await
            }
            InventoryEffect::Restock => {
                ProductVariant::restock(&mut *conn, variant.id, tenant_id, quantity).await
            }
            InventoryEffect::None => Ok(None),
        };
    }

    match effect {
        InventoryEffect::Decrement => {
            Product::decrement_stock(&mut *conn, item.product_id, tenant_id, quantity).await
        }
        InventoryEffect::Restock => {
            Product::restock(&mut *conn, item.product_id, tenant_id, quantity).await
        }
        InventoryEffect::None => Ok(None),
    }
}
