//! Customer records for the signed-in store

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{double_option, page_bounds, Page},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use storecraft_shared::{
    auth::{
        authorization::{require_current_role, require_permission, ResourcePermission},
        middleware::AuthContext,
    },
    models::customer::{Address, CreateCustomer, Customer, UpdateCustomer},
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct ListCustomersQuery {
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CustomerRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(max = 32, message = "Phone must be at most 32 characters"))]
    pub phone: Option<String>,

    pub address: Option<Address>,
}

impl From<CustomerRequest> for CreateCustomer {
    fn from(req: CustomerRequest) -> Self {
        CreateCustomer {
            name: req.name,
            email: req.email,
            phone: req.phone,
            address: req.address,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCustomerRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub address: Option<Option<Address>>,
}

fn not_found() -> ApiError {
    ApiError::NotFound("Customer not found".to_string())
}

pub async fn list_customers(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListCustomersQuery>,
) -> ApiResult<Json<Page<Customer>>> {
    require_permission(&auth, ResourcePermission::Read)?;

    let (limit, offset) = page_bounds(query.limit, query.offset);
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let items = Customer::list_by_tenant(&state.db, auth.tenant_id, search, limit, offset).await?;
    let total = Customer::count_by_tenant(&state.db, auth.tenant_id, search).await?;

    Ok(Json(Page {
        items,
        total,
        limit,
        offset,
    }))
}

pub async fn create_customer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CustomerRequest>,
) -> ApiResult<(StatusCode, Json<Customer>)> {
    require_permission(&auth, ResourcePermission::Write)?;
    req.validate()?;

    let customer = Customer::create(&state.db, auth.tenant_id, req.into()).await?;

    tracing::info!(tenant_id = %auth.tenant_id, customer_id = %customer.id, "Customer created");

    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn get_customer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Customer>> {
    require_permission(&auth, ResourcePermission::Read)?;

    Customer::find_by_id_and_tenant(&state.db, id, auth.tenant_id)
        .await?
        .map(Json)
        .ok_or_else(not_found)
}

pub async fn update_customer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCustomerRequest>,
) -> ApiResult<Json<Customer>> {
    require_permission(&auth, ResourcePermission::Write)?;
    req.validate()?;

    if let Some(Some(email)) = &req.email {
        if !validator::ValidateEmail::validate_email(email) {
            return Err(ApiError::invalid("email", "Invalid email format"));
        }
    }

    let customer = Customer::update(
        &state.db,
        id,
        auth.tenant_id,
        UpdateCustomer {
            name: req.name,
            email: req.email,
            phone: req.phone,
            address: req.address,
        },
    )
    .await?
    .ok_or_else(not_found)?;

    Ok(Json(customer))
}

pub async fn delete_customer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_current_role(&state.db, &auth, ResourcePermission::Manage).await?;

    if !Customer::delete(&state.db, id, auth.tenant_id).await? {
        return Err(not_found());
    }

    tracing::info!(tenant_id = %auth.tenant_id, customer_id = %id, "Customer deleted");
    Ok(StatusCode::NO_CONTENT)
}
