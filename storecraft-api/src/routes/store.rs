//! Settings of the signed-in store
//!
//! - `GET   /v1/store`: any member
//! - `PATCH /v1/store`: admin or owner, checked against the current role

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::double_option,
};
use axum::{extract::State, Extension, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use storecraft_shared::{
    auth::{
        authorization::{require_current_role, require_permission, ResourcePermission},
        middleware::AuthContext,
    },
    commerce::host::validate_custom_domain,
    models::tenant::{Tenant, UpdateTenant},
};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStoreRequest {
    #[validate(length(min = 1, max = 100, message = "Store name must be 1-100 characters"))]
    pub name: Option<String>,

    /// `null` detaches the custom domain
    #[serde(default, deserialize_with = "double_option")]
    pub custom_domain: Option<Option<String>>,

    /// ISO 4217 code
    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: Option<String>,

    #[validate(range(min = 0, max = 100000, message = "Threshold must be between 0 and 100000"))]
    pub low_stock_threshold: Option<i32>,

    /// Merged into the existing settings
    pub settings: Option<serde_json::Value>,
}

/// Settings must be an object; a `shipping_fee` entry must be a non-negative amount
fn check_settings(settings: &serde_json::Value) -> ApiResult<()> {
    let Some(settings) = settings.as_object() else {
        return Err(ApiError::invalid("settings", "Settings must be a JSON object"));
    };

    if let Some(fee) = settings.get("shipping_fee") {
        let fee = serde_json::from_value::<Decimal>(fee.clone()).ok();
        if !fee.is_some_and(|fee| fee >= Decimal::ZERO) {
            return Err(ApiError::invalid(
                "settings.shipping_fee",
                "Shipping fee must be a non-negative amount",
            ));
        }
    }

    Ok(())
}

pub async fn get_store(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Tenant>> {
    require_permission(&auth, ResourcePermission::Read)?;

    let tenant = Tenant::find_by_id(&state.db, auth.tenant_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Store not found".to_string()))?;

    Ok(Json(tenant))
}

pub async fn update_store(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<UpdateStoreRequest>,
) -> ApiResult<Json<Tenant>> {
    require_current_role(&state.db, &auth, ResourcePermission::Manage).await?;
    req.validate()?;

    if let Some(currency) = &req.currency {
        if !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ApiError::invalid("currency", "Currency must be a 3-letter code"));
        }
    }
    if let Some(settings) = &req.settings {
        check_settings(settings)?;
    }

    let custom_domain = match req.custom_domain {
        Some(Some(domain)) => Some(Some(
            validate_custom_domain(&domain, &state.config.storefront.base_domain)
                .map_err(|e| ApiError::invalid("custom_domain", e))?,
        )),
        other => other,
    };

    let tenant = Tenant::update(
        &state.db,
        auth.tenant_id,
        UpdateTenant {
            name: req.name.map(|n| n.trim().to_string()),
            custom_domain,
            plan: None,
            currency: req.currency,
            low_stock_threshold: req.low_stock_threshold,
            settings: req.settings,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Store not found".to_string()))?;

    tracing::info!(tenant_id = %tenant.id, user_id = %auth.user_id, "Store settings updated");

    Ok(Json(tenant))
}
