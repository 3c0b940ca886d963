//! Catalog management
//!
//! ```text
//! GET    /v1/products                              list (filter by status, search)
//! POST   /v1/products                              staff+
//! GET    /v1/products/:id                          product with variants
//! PATCH  /v1/products/:id                          staff+
//! DELETE /v1/products/:id                          admin+
//! POST   /v1/products/:id/variants                 staff+
//! PATCH  /v1/products/:id/variants/:variant_id     staff+
//! DELETE /v1/products/:id/variants/:variant_id     staff+
//! POST   /v1/products/:id/images                   staff+, multipart
//! ```

use crate::{
    app::{AppState, MAX_IMAGES_PER_UPLOAD},
    error::{ApiError, ApiResult},
    routes::{double_option, page_bounds, Page},
};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use storecraft_shared::{
    auth::{
        authorization::{require_current_role, require_permission, ResourcePermission},
        middleware::AuthContext,
    },
    commerce::host::slugify,
    models::product::{
        CreateProduct, CreateVariant, Product, ProductFilter, ProductStatus, ProductVariant,
        ProductWithVariants, UpdateProduct, UpdateVariant,
    },
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct ListProductsQuery {
    pub status: Option<ProductStatus>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,

    /// Derived from the name when absent
    #[validate(length(max = 255, message = "Slug must be at most 255 characters"))]
    pub slug: Option<String>,

    #[serde(default)]
    pub description: String,

    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,

    #[serde(default)]
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: i32,

    #[serde(default)]
    pub status: ProductStatus,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: Option<String>,

    pub slug: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,

    /// `null` removes the sale price
    #[serde(default, deserialize_with = "double_option")]
    pub compare_at_price: Option<Option<Decimal>>,

    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: Option<i32>,

    pub status: Option<ProductStatus>,

    /// Replaces the image list, e.g. to reorder or drop images
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateVariantRequest {
    #[validate(length(max = 100, message = "SKU must be at most 100 characters"))]
    pub sku: Option<String>,

    #[validate(length(max = 100, message = "Color must be at most 100 characters"))]
    pub color: Option<String>,

    #[validate(length(max = 50, message = "Size must be at most 50 characters"))]
    pub size: Option<String>,

    /// Overrides the product price
    pub price: Option<Decimal>,

    #[serde(default)]
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateVariantRequest {
    #[serde(default, deserialize_with = "double_option")]
    pub sku: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub color: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub size: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub price: Option<Option<Decimal>>,

    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: Option<i32>,
}

fn check_price(field: &str, price: Option<Decimal>) -> ApiResult<()> {
    match price {
        Some(p) if p < Decimal::ZERO => Err(ApiError::invalid(field, "Price cannot be negative")),
        _ => Ok(()),
    }
}

fn normalize_slug(raw: &str) -> ApiResult<String> {
    let slug = slugify(raw);
    if slug.is_empty() {
        return Err(ApiError::invalid("slug", "Slug must contain letters or digits"));
    }
    Ok(slug)
}

/// Attaches variants to a page of products with one query
pub(crate) async fn with_variants(
    state: &AppState,
    tenant_id: Uuid,
    products: Vec<Product>,
) -> ApiResult<Vec<ProductWithVariants>> {
    let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
    let mut by_product: HashMap<Uuid, Vec<ProductVariant>> = HashMap::new();
    for variant in ProductVariant::list_by_products(&state.db, &ids, tenant_id).await? {
        by_product.entry(variant.product_id).or_default().push(variant);
    }

    Ok(products
        .into_iter()
        .map(|product| ProductWithVariants {
            variants: by_product.remove(&product.id).unwrap_or_default(),
            product,
        })
        .collect())
}

async fn load_product(state: &AppState, id: Uuid, tenant_id: Uuid) -> ApiResult<ProductWithVariants> {
    let product = Product::find_by_id_and_tenant(&state.db, id, tenant_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;
    let variants = ProductVariant::list_by_product(&state.db, id, tenant_id).await?;

    Ok(ProductWithVariants { product, variants })
}

pub async fn list_products(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListProductsQuery>,
) -> ApiResult<Json<Page<ProductWithVariants>>> {
    require_permission(&auth, ResourcePermission::Read)?;

    let (limit, offset) = page_bounds(query.limit, query.offset);
    let filter = ProductFilter {
        status: query.status,
        search: query.search.filter(|s| !s.trim().is_empty()),
    };

    let products = Product::list_by_tenant(&state.db, auth.tenant_id, &filter, limit, offset).await?;
    let total = Product::count_by_tenant(&state.db, auth.tenant_id, &filter).await?;

    Ok(Json(Page {
        items: with_variants(&state, auth.tenant_id, products).await?,
        total,
        limit,
        offset,
    }))
}

pub async fn create_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateProductRequest>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    require_permission(&auth, ResourcePermission::Write)?;
    req.validate()?;
    check_price("price", Some(req.price))?;
    check_price("compare_at_price", req.compare_at_price)?;

    let slug = normalize_slug(req.slug.as_deref().unwrap_or(&req.name))?;

    let product = Product::create(
        &state.db,
        auth.tenant_id,
        CreateProduct {
            name: req.name.trim().to_string(),
            slug,
            description: req.description,
            price: req.price,
            compare_at_price: req.compare_at_price,
            stock: req.stock,
            status: req.status,
        },
    )
    .await?;

    tracing::info!(tenant_id = %auth.tenant_id, product_id = %product.id, "Product created");

    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn get_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ProductWithVariants>> {
    require_permission(&auth, ResourcePermission::Read)?;
    Ok(Json(load_product(&state, id, auth.tenant_id).await?))
}

pub async fn update_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProductRequest>,
) -> ApiResult<Json<Product>> {
    require_permission(&auth, ResourcePermission::Write)?;
    req.validate()?;
    check_price("price", req.price)?;
    check_price("compare_at_price", req.compare_at_price.flatten())?;

    let slug = req.slug.as_deref().map(normalize_slug).transpose()?;

    let product = Product::update(
        &state.db,
        id,
        auth.tenant_id,
        UpdateProduct {
            name: req.name.map(|n| n.trim().to_string()),
            slug,
            description: req.description,
            price: req.price,
            compare_at_price: req.compare_at_price,
            stock: req.stock,
            status: req.status,
            images: req.images,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;

    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_current_role(&state.db, &auth, ResourcePermission::Manage).await?;

    if !Product::delete(&state.db, id, auth.tenant_id).await? {
        return Err(ApiError::NotFound("Product not found".to_string()));
    }

    tracing::info!(tenant_id = %auth.tenant_id, product_id = %id, "Product deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_variant(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(product_id): Path<Uuid>,
    Json(req): Json<CreateVariantRequest>,
) -> ApiResult<(StatusCode, Json<ProductVariant>)> {
    require_permission(&auth, ResourcePermission::Write)?;
    req.validate()?;
    check_price("price", req.price)?;

    let variant = ProductVariant::create(
        &state.db,
        auth.tenant_id,
        product_id,
        CreateVariant {
            sku: req.sku,
            color: req.color,
            size: req.size,
            price: req.price,
            stock: req.stock,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;

    Ok((StatusCode::CREATED, Json(variant)))
}

pub async fn update_variant(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((product_id, variant_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateVariantRequest>,
) -> ApiResult<Json<ProductVariant>> {
    require_permission(&auth, ResourcePermission::Write)?;
    req.validate()?;
    check_price("price", req.price.flatten())?;

    let variant = ProductVariant::update(
        &state.db,
        variant_id,
        product_id,
        auth.tenant_id,
        UpdateVariant {
            sku: req.sku,
            color: req.color,
            size: req.size,
            price: req.price,
            stock: req.stock,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Variant not found".to_string()))?;

    Ok(Json(variant))
}

pub async fn delete_variant(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((product_id, variant_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    require_permission(&auth, ResourcePermission::Write)?;

    if !ProductVariant::delete(&state.db, variant_id, product_id, auth.tenant_id).await? {
        return Err(ApiError::NotFound("Variant not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Upload product images
///
/// Every file part of the multipart body is stored; the resulting URLs are
/// appended to the product's images in upload order.
pub async fn upload_images(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> ApiResult<Json<Product>> {
    require_permission(&auth, ResourcePermission::Write)?;

    if Product::find_by_id_and_tenant(&state.db, id, auth.tenant_id)
        .await?
        .is_none()
    {
        return Err(ApiError::NotFound("Product not found".to_string()));
    }

    let mut urls = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        if urls.len() == MAX_IMAGES_PER_UPLOAD {
            return Err(ApiError::BadRequest(format!(
                "At most {} images per upload",
                MAX_IMAGES_PER_UPLOAD
            )));
        }

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field.bytes().await?;

        urls.push(
            state
                .media
                .put(auth.tenant_id, &file_name, &content_type, data)
                .await?,
        );
    }

    if urls.is_empty() {
        return Err(ApiError::BadRequest("No image files in request".to_string()));
    }

    let product = Product::append_images(&state.db, id, auth.tenant_id, &urls)
        .await?
        .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;

    tracing::info!(
        tenant_id = %auth.tenant_id,
        product_id = %id,
        count = urls.len(),
        "Product images uploaded"
    );

    Ok(Json(product))
}
