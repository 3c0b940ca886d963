//! Product and variant models
//!
//! A product is sold either as-is, using its own `stock`, or through
//! variants (a color/size combination with its own stock and an optional
//! price override). Storefront queries only ever see `active` products.
//!
//! # Example
//!
//! ```no_run
//! use rust_decimal::Decimal;
//! use storecraft_shared::models::product::{CreateProduct, CreateVariant, Product, ProductVariant};
//! # use sqlx::PgPool;
//! # use uuid::Uuid;
//!
//! # async fn example(pool: PgPool, tenant_id: Uuid) -> Result<(), sqlx::Error> {
//! let shirt = Product::create(&pool, tenant_id, CreateProduct {
//!     name: "Linen Shirt".to_string(),
//!     slug: "linen-shirt".to_string(),
//!     price: Decimal::new(4900, 2),
//!     ..Default::default()
//! }).await?;
//!
//! ProductVariant::create(&pool, tenant_id, shirt.id, CreateVariant {
//!     color: Some("blue".to_string()),
//!     size: Some("M".to_string()),
//!     stock: 12,
//!     ..Default::default()
//! }).await?;
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

const PRODUCT_COLUMNS: &str = "id, tenant_id, name, slug, description, price, compare_at_price, \
                               stock, status, images, created_at, updated_at";

const VARIANT_COLUMNS: &str =
    "id, product_id, tenant_id, sku, color, size, price, stock, created_at, updated_at";

/// Publication state of a product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "product_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    /// Being edited, not visible on the storefront
    #[default]
    Draft,

    /// Listed and purchasable
    Active,

    /// Kept for order history, not purchasable
    Archived,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Draft => "draft",
            ProductStatus::Active => "active",
            ProductStatus::Archived => "archived",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,

    /// URL handle, unique within the store
    pub slug: String,

    pub description: String,
    pub price: Decimal,

    /// Original price shown struck through, if on sale
    pub compare_at_price: Option<Decimal>,

    /// Stock for products sold without variants
    pub stock: i32,

    pub status: ProductStatus,

    /// Public image URLs, in display order
    pub images: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_purchasable(&self) -> bool {
        self.status == ProductStatus::Active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProductVariant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub tenant_id: Uuid,
    pub sku: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,

    /// Overrides the product price when set
    pub price: Option<Decimal>,

    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product together with its variants, as returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct ProductWithVariants {
    #[serde(flatten)]
    pub product: Product,
    pub variants: Vec<ProductVariant>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    pub slug: String,

    #[serde(default)]
    pub description: String,

    pub price: Decimal,

    #[serde(default)]
    pub compare_at_price: Option<Decimal>,

    #[serde(default)]
    pub stock: i32,

    #[serde(default)]
    pub status: ProductStatus,
}

/// Input for updating a product
///
/// `compare_at_price: Some(None)` removes the sale price.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub compare_at_price: Option<Option<Decimal>>,
    pub stock: Option<i32>,
    pub status: Option<ProductStatus>,

    /// Replaces the image list (reorder or remove)
    pub images: Option<Vec<String>>,
}

/// Listing filter for the dashboard and the storefront
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductFilter {
    pub status: Option<ProductStatus>,

    /// Case-insensitive substring match on the name
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateVariant {
    pub sku: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub price: Option<Decimal>,

    #[serde(default)]
    pub stock: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateVariant {
    pub sku: Option<Option<String>>,
    pub color: Option<Option<String>>,
    pub size: Option<Option<String>>,
    pub price: Option<Option<Decimal>>,
    pub stock: Option<i32>,
}

/// Stock level after a decrement or restock
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct StockLevel {
    pub product_id: Uuid,
    pub stock: i32,
}

impl ProductFilter {
    /// Appends WHERE conditions after `tenant_id = $1`, returning the next bind index
    fn push_conditions(&self, query: &mut String) -> usize {
        let mut bind_count = 1;
        if self.status.is_some() {
            bind_count += 1;
            query.push_str(&format!(" AND status = ${}", bind_count));
        }
        if self.search.is_some() {
            bind_count += 1;
            query.push_str(&format!(" AND name ILIKE ${}", bind_count));
        }
        bind_count
    }

    fn search_pattern(&self) -> Option<String> {
        self.search.as_deref().map(super::contains_pattern)
    }
}

impl Product {
    /// Creates a product in a store
    ///
    /// # Errors
    ///
    /// Returns a unique violation when the slug is already used in the store.
    pub async fn create(
        pool: &PgPool,
        tenant_id: Uuid,
        data: CreateProduct,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Product>(&format!(
            "INSERT INTO products (tenant_id, name, slug, description, price, compare_at_price, stock, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            PRODUCT_COLUMNS
        ))
        .bind(tenant_id)
        .bind(data.name)
        .bind(data.slug.to_lowercase())
        .bind(data.description)
        .bind(data.price)
        .bind(data.compare_at_price)
        .bind(data.stock)
        .bind(data.status)
        .fetch_one(pool)
        .await
    }

    /// Finds a product within a store
    ///
    /// Products of other stores are never returned.
    pub async fn find_by_id_and_tenant<'e, E>(
        executor: E,
        id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE id = $1 AND tenant_id = $2",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_by_slug(
        pool: &PgPool,
        tenant_id: Uuid,
        slug: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE tenant_id = $1 AND slug = $2",
            PRODUCT_COLUMNS
        ))
        .bind(tenant_id)
        .bind(slug.to_lowercase())
        .fetch_optional(pool)
        .await
    }

    /// Lists a store's products, newest first
    pub async fn list_by_tenant(
        pool: &PgPool,
        tenant_id: Uuid,
        filter: &ProductFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut query = format!("SELECT {} FROM products WHERE tenant_id = $1", PRODUCT_COLUMNS);
        let bind_count = filter.push_conditions(&mut query);
        query.push_str(&format!(
            " ORDER BY created_at DESC LIMIT ${} OFFSET ${}",
            bind_count + 1,
            bind_count + 2
        ));

        let mut q = sqlx::query_as::<_, Product>(&query).bind(tenant_id);
        if let Some(status) = filter.status {
            q = q.bind(status);
        }
        if let Some(pattern) = filter.search_pattern() {
            q = q.bind(pattern);
        }

        q.bind(limit).bind(offset).fetch_all(pool).await
    }

    pub async fn count_by_tenant(
        pool: &PgPool,
        tenant_id: Uuid,
        filter: &ProductFilter,
    ) -> Result<i64, sqlx::Error> {
        let mut query = String::from("SELECT COUNT(*) FROM products WHERE tenant_id = $1");
        filter.push_conditions(&mut query);

        let mut q = sqlx::query_scalar::<_, i64>(&query).bind(tenant_id);
        if let Some(status) = filter.status {
            q = q.bind(status);
        }
        if let Some(pattern) = filter.search_pattern() {
            q = q.bind(pattern);
        }

        q.fetch_one(pool).await
    }

    /// Updates a product
    ///
    /// # Returns
    ///
    /// The updated product, or None if it does not exist in the store
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        tenant_id: Uuid,
        data: UpdateProduct,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE products SET updated_at = NOW()");
        let mut bind_count = 2;

        let mut push = |column: &str, present: bool| {
            if present {
                bind_count += 1;
                query.push_str(&format!(", {} = ${}", column, bind_count));
            }
        };
        push("name", data.name.is_some());
        push("slug", data.slug.is_some());
        push("description", data.description.is_some());
        push("price", data.price.is_some());
        push("compare_at_price", data.compare_at_price.is_some());
        push("stock", data.stock.is_some());
        push("status", data.status.is_some());
        push("images", data.images.is_some());

        query.push_str(&format!(
            " WHERE id = $1 AND tenant_id = $2 RETURNING {}",
            PRODUCT_COLUMNS
        ));

        let mut q = sqlx::query_as::<_, Product>(&query).bind(id).bind(tenant_id);

        if let Some(name) = data.name {
            q = q.bind(name);
        }
        if let Some(slug) = data.slug {
            q = q.bind(slug.to_lowercase());
        }
        if let Some(description) = data.description {
            q = q.bind(description);
        }
        if let Some(price) = data.price {
            q = q.bind(price);
        }
        if let Some(compare_at_price) = data.compare_at_price {
            q = q.bind(compare_at_price);
        }
        if let Some(stock) = data.stock {
            q = q.bind(stock);
        }
        if let Some(status) = data.status {
            q = q.bind(status);
        }
        if let Some(images) = data.images {
            q = q.bind(images);
        }

        q.fetch_optional(pool).await
    }

    /// Appends uploaded image URLs to a product
    pub async fn append_images(
        pool: &PgPool,
        id: Uuid,
        tenant_id: Uuid,
        urls: &[String],
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Product>(&format!(
            "UPDATE products SET images = images || $3, updated_at = NOW() \
             WHERE id = $1 AND tenant_id = $2 RETURNING {}",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .bind(tenant_id)
        .bind(urls)
        .fetch_optional(pool)
        .await
    }

    /// Deletes a product and its variants
    ///
    /// Orders keep their own copy of the line items, so history survives.
    pub async fn delete(pool: &PgPool, id: Uuid, tenant_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lowers product-level stock, saturating at zero
    pub async fn decrement_stock<'e, E>(
        executor: E,
        id: Uuid,
        tenant_id: Uuid,
        quantity: i32,
    ) -> Result<Option<StockLevel>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, StockLevel>(
            r#"
            UPDATE products
            SET stock = GREATEST(stock - $3, 0), updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING id AS product_id, stock
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(quantity)
        .fetch_optional(executor)
        .await
    }

    pub async fn restock<'e, E>(
        executor: E,
        id: Uuid,
        tenant_id: Uuid,
        quantity: i32,
    ) -> Result<Option<StockLevel>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, StockLevel>(
            r#"
            UPDATE products
            SET stock = stock + $3, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING id AS product_id, stock
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(quantity)
        .fetch_optional(executor)
        .await
    }
}

impl ProductVariant {
    /// Adds a variant to a product of the store
    ///
    /// # Returns
    ///
    /// None if the product does not exist in the store
    pub async fn create(
        pool: &PgPool,
        tenant_id: Uuid,
        product_id: Uuid,
        data: CreateVariant,
    ) -> Result<Option<Self>, sqlx::Error> {
        // The SELECT guards against attaching a variant to another store's product
        sqlx::query_as::<_, ProductVariant>(&format!(
            "INSERT INTO product_variants (product_id, tenant_id, sku, color, size, price, stock) \
             SELECT id, tenant_id, $3, $4, $5, $6, $7 FROM products WHERE id = $1 AND tenant_id = $2 \
             RETURNING {}",
            VARIANT_COLUMNS
        ))
        .bind(product_id)
        .bind(tenant_id)
        .bind(data.sku)
        .bind(data.color)
        .bind(data.size)
        .bind(data.price)
        .bind(data.stock)
        .fetch_optional(pool)
        .await
    }

    /// Lists a product's variants in creation order
    pub async fn list_by_product<'e, E>(
        executor: E,
        product_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ProductVariant>(&format!(
            "SELECT {} FROM product_variants WHERE product_id = $1 AND tenant_id = $2 \
             ORDER BY created_at ASC, id ASC",
            VARIANT_COLUMNS
        ))
        .bind(product_id)
        .bind(tenant_id)
        .fetch_all(executor)
        .await
    }

    /// Variants for several products at once, for listings
    pub async fn list_by_products(
        pool: &PgPool,
        product_ids: &[Uuid],
        tenant_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ProductVariant>(&format!(
            "SELECT {} FROM product_variants WHERE product_id = ANY($1) AND tenant_id = $2 \
             ORDER BY created_at ASC, id ASC",
            VARIANT_COLUMNS
        ))
        .bind(product_ids)
        .bind(tenant_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        product_id: Uuid,
        tenant_id: Uuid,
        data: UpdateVariant,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE product_variants SET updated_at = NOW()");
        let mut bind_count = 3;

        let mut push = |column: &str, present: bool| {
            if present {
                bind_count += 1;
                query.push_str(&format!(", {} = ${}", column, bind_count));
            }
        };
        push("sku", data.sku.is_some());
        push("color", data.color.is_some());
        push("size", data.size.is_some());
        push("price", data.price.is_some());
        push("stock", data.stock.is_some());

        query.push_str(&format!(
            " WHERE id = $1 AND product_id = $2 AND tenant_id = $3 RETURNING {}",
            VARIANT_COLUMNS
        ));

        let mut q = sqlx::query_as::<_, ProductVariant>(&query)
            .bind(id)
            .bind(product_id)
            .bind(tenant_id);

        if let Some(sku) = data.sku {
            q = q.bind(sku);
        }
        if let Some(color) = data.color {
            q = q.bind(color);
        }
        if let Some(size) = data.size {
            q = q.bind(size);
        }
        if let Some(price) = data.price {
            q = q.bind(price);
        }
        if let Some(stock) = data.stock {
            q = q.bind(stock);
        }

        q.fetch_optional(pool).await
    }

    pub async fn delete(
        pool: &PgPool,
        id: Uuid,
        product_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM product_variants WHERE id = $1 AND product_id = $2 AND tenant_id = $3",
        )
        .bind(id)
        .bind(product_id)
        .bind(tenant_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lowers variant stock, saturating at zero
    pub async fn decrement_stock<'e, E>(
        executor: E,
        id: Uuid,
        tenant_id: Uuid,
        quantity: i32,
    ) -> Result<Option<StockLevel>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, StockLevel>(
            r#"
            UPDATE product_variants
            SET stock = GREATEST(stock - $3, 0), updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING product_id, stock
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(quantity)
        .fetch_optional(executor)
        .await
    }

    pub async fn restock<'e, E>(
        executor: E,
        id: Uuid,
        tenant_id: Uuid,
        quantity: i32,
    ) -> Result<Option<StockLevel>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, StockLevel>(
            r#"
            UPDATE product_variants
            SET stock = stock + $3, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING product_id, stock
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(quantity)
        .fetch_optional(executor)
        .await
    }
}
