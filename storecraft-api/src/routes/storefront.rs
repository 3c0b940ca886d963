//! Public storefront API
//!
//! The store is resolved from the request host by
//! [`resolve_store`](crate::middleware::store_host::resolve_store), so every
//! handler here receives the [`Tenant`] as an extension. Only active products
//! are visible, and checkout is rate limited per store and client address.
//!
//! Checkout bodies carry no money fields: line prices come from the catalog,
//! shipping from the store's `shipping_fee` setting, and discounts are not
//! offered to anonymous shoppers.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{
        customers::CustomerRequest,
        orders::{OrderLineRequest, OrderRequest},
        page_bounds,
        products::with_variants,
        Page,
    },
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use storecraft_shared::{
    commerce::lifecycle::{OrderStatus, PaymentMethod, PaymentStatus},
    models::{
        customer::Address,
        order::Order,
        product::{Product, ProductFilter, ProductStatus, ProductVariant, ProductWithVariants},
        tenant::Tenant,
    },
};
use uuid::Uuid;

/// Store details safe to show shoppers
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicStore {
    pub id: Uuid,
    pub name: String,
    pub subdomain: String,
    pub custom_domain: Option<String>,
    pub currency: String,
}

impl From<Tenant> for PublicStore {
    fn from(tenant: Tenant) -> Self {
        Self {
            id: tenant.id,
            name: tenant.name,
            subdomain: tenant.subdomain,
            custom_domain: tenant.custom_domain,
            currency: tenant.currency,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StorefrontProductsQuery {
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Shopper checkout body
///
/// Unknown fields (`discount`, `shipping_fee`, `paid_upfront`) are ignored.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub customer: CustomerRequest,
    pub items: Vec<OrderLineRequest>,
    pub payment_method: PaymentMethod,
    pub shipping_address: Option<Address>,
    pub note: Option<String>,
}

impl CheckoutRequest {
    /// Order as the store prices it: store shipping fee, no discount, unpaid
    pub fn into_order_request(self, shipping_fee: Decimal) -> OrderRequest {
        OrderRequest {
            customer: self.customer,
            items: self.items,
            payment_method: self.payment_method,
            paid_upfront: false,
            shipping_fee,
            discount: Decimal::ZERO,
            shipping_address: self.shipping_address,
            note: self.note,
        }
    }
}

/// Flat shipping fee from the store's `shipping_fee` setting, zero when unset or invalid
pub fn store_shipping_fee(tenant: &Tenant) -> Decimal {
    tenant
        .settings
        .get("shipping_fee")
        .and_then(|fee| serde_json::from_value::<Decimal>(fee.clone()).ok())
        .filter(|fee| *fee >= Decimal::ZERO)
        .unwrap_or(Decimal::ZERO)
}

/// Checkout confirmation
#[derive(Debug, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub id: Uuid,
    pub order_number: i64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub currency: String,
    pub total: Decimal,
}

impl From<Order> for PlacedOrder {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            order_number: order.order_number,
            status: order.status,
            payment_status: order.payment_status,
            currency: order.currency,
            total: order.total,
        }
    }
}

pub async fn get_store(Extension(tenant): Extension<Tenant>) -> Json<PublicStore> {
    Json(tenant.into())
}

pub async fn list_products(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Query(query): Query<StorefrontProductsQuery>,
) -> ApiResult<Json<Page<ProductWithVariants>>> {
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let filter = ProductFilter {
        status: Some(ProductStatus::Active),
        search: query.search.filter(|s| !s.trim().is_empty()),
    };

    let products = Product::list_by_tenant(&state.db, tenant.id, &filter, limit, offset).await?;
    let total = Product::count_by_tenant(&state.db, tenant.id, &filter).await?;

    Ok(Json(Page {
        items: with_variants(&state, tenant.id, products).await?,
        total,
        limit,
        offset,
    }))
}

pub async fn get_product(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(slug): Path<String>,
) -> ApiResult<Json<ProductWithVariants>> {
    let product = Product::find_by_slug(&state.db, tenant.id, &slug)
        .await?
        .filter(Product::is_purchasable)
        .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;
    let variants = ProductVariant::list_by_product(&state.db, product.id, tenant.id).await?;

    Ok(Json(ProductWithVariants { product, variants }))
}

/// Checkout
pub async fn place_order(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Json(req): Json<CheckoutRequest>,
) -> ApiResult<(StatusCode, Json<PlacedOrder>)> {
    let new_order = req
        .into_order_request(store_shipping_fee(&tenant))
        .into_new_order()?;

    let order = Order::create(&state.db, tenant.id, new_order).await?;

    tracing::info!(
        tenant_id = %tenant.id,
        order_id = %order.id,
        order_number = order.order_number,
        "Storefront order placed"
    );

    Ok((StatusCode::CREATED, Json(order.into())))
}
