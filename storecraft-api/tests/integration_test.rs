//! End-to-end tests through the full router
//!
//! Tests without `#[ignore]` stop before any database access (auth,
//! validation, host resolution, headers). The rest need PostgreSQL:
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/storecraft_test cargo test -p storecraft-api -- --ignored
//! ```

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::{json_request, TestContext, BASE_DOMAIN, PASSWORD};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use storecraft_api::routes::storefront::PlacedOrder;

async fn create_active_product(ctx: &TestContext, token: &str, name: &str, price: &str) -> Value {
    let response = ctx
        .request(
            Method::POST,
            "/v1/products",
            Some(token),
            Some(json!({ "name": name, "price": price, "stock": 10, "status": "active" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "create product: {}", response.body);
    response.body
}

fn checkout_body(product_id: &str, quantity: i32) -> Value {
    json!({
        "customer": { "name": "Jane Doe", "email": "jane@example.com" },
        "items": [{ "product_id": product_id, "quantity": quantity }],
        "payment_method": "cash_on_delivery"
    })
}

#[tokio::test]
async fn test_dashboard_requires_session() {
    let ctx = TestContext::new();

    for uri in ["/v1/products", "/v1/orders", "/v1/store", "/v1/auth/me"] {
        let response = ctx.request(Method::GET, uri, None, None).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(response.body["error"], "unauthorized");
    }

    let response = ctx
        .request(Method::GET, "/v1/products", Some("not.a.token"), None)
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let ctx = TestContext::new();

    let response = ctx.request(Method::GET, "/v1/products", None, None).await;

    assert_eq!(response.headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(response.headers[header::X_FRAME_OPTIONS], "DENY");
    assert!(response.headers.contains_key(header::CONTENT_SECURITY_POLICY));
    assert!(!response.headers.contains_key(header::STRICT_TRANSPORT_SECURITY));
}

#[tokio::test]
async fn test_storefront_on_platform_host_is_not_a_store() {
    let ctx = TestContext::new();

    for host in [BASE_DOMAIN.to_string(), format!("www.{}", BASE_DOMAIN)] {
        let response = ctx
            .send(json_request(Method::GET, "/v1/storefront/store", None, Some(&host), None))
            .await;
        assert_eq!(response.status, StatusCode::NOT_FOUND, "{}", host);
        assert_eq!(response.body["error"], "not_found");
    }
}

#[tokio::test]
async fn test_register_validation_errors() {
    let ctx = TestContext::new();

    let response = ctx
        .request(
            Method::POST,
            "/v1/auth/register",
            None,
            Some(json!({ "email": "not-an-email", "password": PASSWORD, "store_name": "Shop" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body["error"], "validation_error");
    assert_eq!(response.body["details"][0]["field"], "email");

    let response = ctx
        .request(
            Method::POST,
            "/v1/auth/register",
            None,
            Some(json!({ "email": "a@example.com", "password": "short", "store_name": "Shop" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body["details"][0]["field"], "password");

    let response = ctx
        .request(
            Method::POST,
            "/v1/auth/register",
            None,
            Some(json!({
                "email": "a@example.com",
                "password": PASSWORD,
                "store_name": "Shop",
                "subdomain": "admin"
            })),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body["details"][0]["field"], "subdomain");
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let ctx = TestContext::new();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{"))
        .unwrap();

    let response = ctx.send(request).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let ctx = TestContext::new();

    let response = ctx.request(Method::POST, "/v1/auth/logout", None, None).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let cookie = response.headers[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("access_token=;"));
    assert!(cookie.contains("Max-Age=0"));
    assert!(cookie.contains("HttpOnly"));
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_storefront_store_by_subdomain() {
    let ctx = TestContext::with_database().await;
    let (_, subdomain) = ctx.register_store().await;

    // Neither a platform host nor a registered custom domain
    let unknown = ctx
        .request(Method::GET, "/v1/storefront/store", None, None)
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let response = ctx
        .storefront(Method::GET, &subdomain, "/store", None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["subdomain"], subdomain.as_str());
    assert!(response.body.get("plan").is_none());
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_cookie_session_reaches_dashboard() {
    let ctx = TestContext::with_database().await;
    let (token, _) = ctx.register_store().await;

    let request = Request::builder()
        .method(Method::GET)
        .uri("/v1/auth/me")
        .header(header::COOKIE, format!("access_token={}", token))
        .body(Body::empty())
        .unwrap();

    let response = ctx.send(request).await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert_eq!(response.body["role"], "owner");
    assert_eq!(response.body["stores"].as_array().unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_duplicate_subdomain_conflicts() {
    let ctx = TestContext::with_database().await;
    let (_, subdomain) = ctx.register_store().await;

    let response = ctx
        .request(
            Method::POST,
            "/v1/auth/register",
            None,
            Some(json!({
                "email": format!("other-{}@example.com", subdomain),
                "password": PASSWORD,
                "store_name": "Another Shop",
                "subdomain": subdomain
            })),
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_storefront_checkout_flow() {
    let ctx = TestContext::with_database().await;
    let (token, subdomain) = ctx.register_store().await;

    let product = create_active_product(&ctx, &token, "Canvas Tote", "25.00").await;
    let product_id = product["id"].as_str().unwrap().to_string();
    let slug = product["slug"].as_str().unwrap().to_string();
    assert_eq!(slug, "canvas-tote");

    // Drafts stay hidden from shoppers
    ctx.request(
        Method::POST,
        "/v1/products",
        Some(&token),
        Some(json!({ "name": "Secret Sample", "price": "1.00" })),
    )
    .await;

    let listing = ctx
        .storefront(Method::GET, &subdomain, "/products", None)
        .await;
    assert_eq!(listing.status, StatusCode::OK);
    assert_eq!(listing.body["total"], 1);
    assert_eq!(listing.body["items"][0]["slug"], "canvas-tote");

    let detail = ctx
        .storefront(Method::GET, &subdomain, "/products/secret-sample", None)
        .await;
    assert_eq!(detail.status, StatusCode::NOT_FOUND);

    let response = ctx
        .storefront(Method::POST, &subdomain, "/orders", Some(checkout_body(&product_id, 2)))
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "checkout: {}", response.body);

    let placed: PlacedOrder = serde_json::from_value(response.body).unwrap();
    assert_eq!(placed.order_number, 1001);
    assert_eq!(placed.total, Decimal::new(5000, 2));

    // Shoppers cannot mark their own order paid
    let mut prepaid = checkout_body(&product_id, 1);
    prepaid["payment_method"] = json!("online");
    prepaid["paid_upfront"] = json!(true);
    let response = ctx
        .storefront(Method::POST, &subdomain, "/orders", Some(prepaid))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["order_number"], 1002);
    assert_eq!(response.body["payment_status"], "pending");

    let orders = ctx.request(Method::GET, "/v1/orders", Some(&token), None).await;
    assert_eq!(orders.body["total"], 2);

    let customers = ctx
        .request(Method::GET, "/v1/customers?search=jane", Some(&token), None)
        .await;
    assert_eq!(customers.body["total"], 1);
    assert_eq!(customers.body["items"][0]["order_count"], 2);

    let unread = ctx
        .request(Method::GET, "/v1/notifications/unread-count", Some(&token), None)
        .await;
    assert_eq!(unread.body["count"], 2);

    let cleared = ctx
        .request(Method::POST, "/v1/notifications/read-all", Some(&token), None)
        .await;
    assert_eq!(cleared.body["updated"], 2);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_checkout_prices_come_from_the_store() {
    let ctx = TestContext::with_database().await;
    let (token, subdomain) = ctx.register_store().await;

    let product = create_active_product(&ctx, &token, "Canvas Tote", "25.00").await;
    let product_id = product["id"].as_str().unwrap().to_string();

    let mut body = checkout_body(&product_id, 1);
    body["discount"] = json!("25.00");
    body["shipping_fee"] = json!("-10.00");
    let response = ctx
        .storefront(Method::POST, &subdomain, "/orders", Some(body.clone()))
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "checkout: {}", response.body);

    let placed: PlacedOrder = serde_json::from_value(response.body).unwrap();
    assert_eq!(placed.total, Decimal::new(2500, 2));

    let response = ctx
        .request(
            Method::PATCH,
            "/v1/store",
            Some(&token),
            Some(json!({ "settings": { "shipping_fee": "4.50" } })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "settings: {}", response.body);

    let response = ctx
        .storefront(Method::POST, &subdomain, "/orders", Some(body))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);

    let placed: PlacedOrder = serde_json::from_value(response.body).unwrap();
    assert_eq!(placed.total, Decimal::new(2950, 2));

    let order = ctx
        .request(Method::GET, &format!("/v1/orders/{}", placed.id), Some(&token), None)
        .await;
    let money = |field: &str| -> Decimal {
        serde_json::from_value(order.body[field].clone()).unwrap()
    };
    assert_eq!(money("discount"), Decimal::ZERO);
    assert_eq!(money("shipping_fee"), Decimal::new(450, 2));
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_status_changes_and_illegal_transition() {
    let ctx = TestContext::with_database().await;
    let (token, subdomain) = ctx.register_store().await;

    let product = create_active_product(&ctx, &token, "Wool Scarf", "40.00").await;
    let product_id = product["id"].as_str().unwrap().to_string();

    let response = ctx
        .storefront(Method::POST, &subdomain, "/orders", Some(checkout_body(&product_id, 3)))
        .await;
    let order_id = response.body["id"].as_str().unwrap().to_string();
    let status_uri = format!("/v1/orders/{}/status", order_id);

    for status in ["confirmed", "shipped", "delivered"] {
        let response = ctx
            .request(Method::PATCH, &status_uri, Some(&token), Some(json!({ "status": status })))
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}: {}", status, response.body);
    }

    let order = ctx
        .request(Method::GET, &format!("/v1/orders/{}", order_id), Some(&token), None)
        .await;
    assert_eq!(order.body["status"], "delivered");
    assert_eq!(order.body["payment_status"], "paid");

    let product = ctx
        .request(Method::GET, &format!("/v1/products/{}", product_id), Some(&token), None)
        .await;
    assert_eq!(product.body["stock"], 7);

    let response = ctx
        .request(Method::PATCH, &status_uri, Some(&token), Some(json!({ "status": "shipped" })))
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.body["error"], "conflict");

    let response = ctx
        .request(
            Method::POST,
            &format!("/v1/orders/{}/invoices", order_id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["invoices"][0]["invoice_number"], "1001-1");
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_other_store_order_is_not_found() {
    let ctx = TestContext::with_database().await;
    let (token_a, subdomain_a) = ctx.register_store().await;
    let (token_b, _) = ctx.register_store().await;

    let product = create_active_product(&ctx, &token_a, "Linen Shirt", "55.00").await;
    let product_id = product["id"].as_str().unwrap().to_string();

    let response = ctx
        .storefront(Method::POST, &subdomain_a, "/orders", Some(checkout_body(&product_id, 1)))
        .await;
    let order_id = response.body["id"].as_str().unwrap().to_string();

    let response = ctx
        .request(Method::GET, &format!("/v1/orders/{}", order_id), Some(&token_b), None)
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = ctx
        .request(
            Method::PATCH,
            &format!("/v1/orders/{}/status", order_id),
            Some(&token_b),
            Some(json!({ "status": "cancelled" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    // A product of store A cannot be ordered through store B
    let response = ctx
        .request(
            Method::POST,
            "/v1/orders",
            Some(&token_b),
            Some(checkout_body(&product_id, 1)),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_image_upload_is_served() {
    let ctx = TestContext::with_database().await;
    let (token, _) = ctx.register_store().await;

    let product = create_active_product(&ctx, &token, "Clay Mug", "12.00").await;
    let product_id = product["id"].as_str().unwrap();

    let boundary = "storecraft-test-boundary";
    let png: &[u8] = b"\x89PNG\r\n\x1a\nnot-really-pixels";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"mug.png\"\r\n\
             Content-Type: image/png\r\n\r\n",
            b = boundary
        )
        .as_bytes(),
    );
    body.extend_from_slice(png);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/v1/products/{}/images", product_id))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();

    let response = ctx.send(request).await;
    assert_eq!(response.status, StatusCode::OK, "upload: {}", response.body);

    let url = response.body["images"][0].as_str().unwrap().to_string();
    assert!(url.starts_with("/uploads/"));
    assert!(url.ends_with(".png"));

    let served = ctx.request(Method::GET, &url, None, None).await;
    assert_eq!(served.status, StatusCode::OK);

    let _ = std::fs::remove_dir_all(&ctx.upload_dir);
}
