//! Integration tests for store lookup, catalog scoping and customers
//!
//! These tests require a running PostgreSQL database.
//! Run with: cargo test --test db_tenancy_tests -- --ignored

mod common;

use rust_decimal::Decimal;
use storecraft_shared::commerce::host::{resolve_host, HostTarget};
use storecraft_shared::db::migrations::get_migration_status;
use storecraft_shared::models::customer::{CreateCustomer, Customer};
use storecraft_shared::models::product::{Product, ProductFilter, UpdateProduct};
use storecraft_shared::models::tenant::{Tenant, UpdateTenant};

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_migrations_applied() {
    let pool = common::setup_pool().await;

    let status = get_migration_status(&pool).await.unwrap();
    assert!(status.applied_migrations >= 3);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_tenant_found_by_subdomain_and_custom_domain() {
    let pool = common::setup_pool().await;
    let store = common::create_tenant(&pool).await;
    let domain = format!("{}.example.org", store.subdomain);

    let host = format!("{}.storecraft.test:8080", store.subdomain);
    let found = Tenant::find_by_host(&pool, &resolve_host(&host, "storecraft.test"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, store.id);

    Tenant::update(
        &pool,
        store.id,
        UpdateTenant {
            custom_domain: Some(Some(domain.clone())),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let target = resolve_host(&domain.to_uppercase(), "storecraft.test");
    assert_eq!(target, HostTarget::CustomDomain(domain.clone()));
    let found = Tenant::find_by_host(&pool, &target).await.unwrap().unwrap();
    assert_eq!(found.id, store.id);

    assert!(Tenant::find_by_host(&pool, &HostTarget::Platform).await.unwrap().is_none());

    common::cleanup(&pool, store.id).await;
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_products_scoped_to_store() {
    let pool = common::setup_pool().await;
    let store = common::create_tenant(&pool).await;
    let other = common::create_tenant(&pool).await;
    let product = common::create_product(&pool, store.id, Decimal::new(999, 2), 3).await;

    assert!(Product::find_by_id_and_tenant(&pool, product.id, other.id)
        .await
        .unwrap()
        .is_none());
    assert!(Product::update(&pool, product.id, other.id, UpdateProduct::default())
        .await
        .unwrap()
        .is_none());
    assert!(!Product::delete(&pool, product.id, other.id).await.unwrap());

    let listed = Product::list_by_tenant(&pool, store.id, &ProductFilter::default(), 50, 0)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);

    let search = ProductFilter {
        search: Some("no such product".to_string()),
        ..Default::default()
    };
    assert_eq!(Product::count_by_tenant(&pool, store.id, &search).await.unwrap(), 0);

    common::cleanup(&pool, store.id).await;
    common::cleanup(&pool, other.id).await;
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_customer_matched_by_phone_when_no_email() {
    let pool = common::setup_pool().await;
    let store = common::create_tenant(&pool).await;

    let mut conn = pool.acquire().await.unwrap();
    let first = Customer::find_or_create(
        &mut conn,
        store.id,
        CreateCustomer {
            name: "Sam".to_string(),
            phone: Some("+1 (555) 010-2030".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let second = Customer::find_or_create(
        &mut conn,
        store.id,
        CreateCustomer {
            name: "Samuel".to_string(),
            email: Some("sam@example.com".to_string()),
            phone: Some("+15550102030".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.name, "Sam");
    assert_eq!(second.email.as_deref(), Some("sam@example.com"));

    drop(conn);
    common::cleanup(&pool, store.id).await;
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_customer_search_treats_backslash_literally() {
    let pool = common::setup_pool().await;
    let store = common::create_tenant(&pool).await;

    for name in [r"Back\slash Supply", "Backslash Supply"] {
        Customer::create(
            &pool,
            store.id,
            CreateCustomer {
                name: name.to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }

    let found = Customer::list_by_tenant(&pool, store.id, Some(r"k\s"), 20, 0)
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, r"Back\slash Supply");
    assert_eq!(
        Customer::count_by_tenant(&pool, store.id, Some(r"k\s")).await.unwrap(),
        1
    );

    common::cleanup(&pool, store.id).await;
}
