//! Order management for store staff
//!
//! Orders placed here go through the same path as storefront checkout
//! (catalog pricing, customer dedup, numbering); staff may additionally mark
//! an online order as paid upfront.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{customers::CustomerRequest, page_bounds, Page},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use storecraft_shared::{
    auth::{
        authorization::{require_permission, ResourcePermission},
        middleware::AuthContext,
    },
    commerce::{
        lifecycle::{OrderStatus, PaymentMethod, PaymentStatus},
        pricing::VariantSelection,
    },
    models::{
        customer::Address,
        order::{NewOrder, NewOrderItem, Order, OrderFilter},
    },
};
use uuid::Uuid;
use validator::Validate;

/// Largest number of lines one order may carry
pub const MAX_ORDER_LINES: usize = 100;

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub customer_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct OrderLineRequest {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub color: Option<String>,
    pub size: Option<String>,

    #[validate(range(min = 1, max = 10000, message = "Quantity must be between 1 and 10000"))]
    pub quantity: i32,
}

impl From<OrderLineRequest> for NewOrderItem {
    fn from(line: OrderLineRequest) -> Self {
        NewOrderItem {
            product_id: line.product_id,
            variant: VariantSelection {
                variant_id: line.variant_id,
                color: line.color,
                size: line.size,
            },
            quantity: line.quantity,
        }
    }
}

/// Order body shared by the dashboard and storefront checkout
#[derive(Debug, Deserialize, Validate)]
pub struct OrderRequest {
    #[validate(nested)]
    pub customer: CustomerRequest,

    #[validate(length(min = 1, max = 100, message = "Order must have 1-100 items"), nested)]
    pub items: Vec<OrderLineRequest>,

    pub payment_method: PaymentMethod,

    #[serde(default)]
    pub paid_upfront: bool,

    #[serde(default)]
    pub shipping_fee: Decimal,

    #[serde(default)]
    pub discount: Decimal,

    pub shipping_address: Option<Address>,

    #[validate(length(max = 2000, message = "Note must be at most 2000 characters"))]
    pub note: Option<String>,
}

impl OrderRequest {
    /// Validates and converts into the persistence input
    pub fn into_new_order(self) -> ApiResult<NewOrder> {
        self.validate()?;

        if self.shipping_fee < Decimal::ZERO {
            return Err(ApiError::invalid("shipping_fee", "Shipping fee cannot be negative"));
        }
        if self.discount < Decimal::ZERO {
            return Err(ApiError::invalid("discount", "Discount cannot be negative"));
        }
        if self.customer.email.is_none() && self.customer.phone.is_none() {
            return Err(ApiError::invalid("customer", "Email or phone is required"));
        }

        Ok(NewOrder {
            customer: self.customer.into(),
            items: self.items.into_iter().map(NewOrderItem::from).collect(),
            payment_method: self.payment_method,
            paid_upfront: self.paid_upfront,
            shipping_fee: self.shipping_fee,
            discount: self.discount,
            shipping_address: self.shipping_address,
            note: self.note.filter(|n| !n.trim().is_empty()),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePaymentRequest {
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct AddInvoiceRequest {
    /// Defaults to the order total
    pub amount: Option<Decimal>,
}

pub async fn list_orders(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListOrdersQuery>,
) -> ApiResult<Json<Page<Order>>> {
    require_permission(&auth, ResourcePermission::Read)?;

    let (limit, offset) = page_bounds(query.limit, query.offset);
    let filter = OrderFilter {
        status: query.status,
        payment_status: query.payment_status,
        customer_id: query.customer_id,
    };

    let items = Order::list_by_tenant(&state.db, auth.tenant_id, &filter, limit, offset).await?;
    let total = Order::count_by_tenant(&state.db, auth.tenant_id, &filter).await?;

    Ok(Json(Page {
        items,
        total,
        limit,
        offset,
    }))
}

pub async fn create_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<OrderRequest>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    require_permission(&auth, ResourcePermission::Write)?;

    let order = Order::create(&state.db, auth.tenant_id, req.into_new_order()?).await?;

    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Order>> {
    require_permission(&auth, ResourcePermission::Read)?;

    Order::find_by_id_and_tenant(&state.db, id, auth.tenant_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))
}

pub async fn update_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Json<Order>> {
    require_permission(&auth, ResourcePermission::Write)?;

    let order = Order::update_status(&state.db, auth.tenant_id, id, req.status).await?;
    Ok(Json(order))
}

pub async fn update_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePaymentRequest>,
) -> ApiResult<Json<Order>> {
    require_permission(&auth, ResourcePermission::Write)?;

    let order = Order::update_payment_status(&state.db, auth.tenant_id, id, req.payment_status).await?;
    Ok(Json(order))
}

pub async fn add_invoice(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    body: Option<Json<AddInvoiceRequest>>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    require_permission(&auth, ResourcePermission::Write)?;

    let amount = body.and_then(|Json(req)| req.amount);
    let order = Order::add_invoice(&state.db, auth.tenant_id, id, amount).await?;

    Ok((StatusCode::CREATED, Json(order)))
}
