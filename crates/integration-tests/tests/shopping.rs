//! Browsing, carts and checkout.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CACHE_CONTROL};
use rigshop_core::{Price, ProductCategory, UserRole};
use rigshop_integration_tests::{PASSWORD, TestContext, price, shipping};
use rigshop_storefront::middleware::CART_ID_HEADER;
use serde_json::{Value, json};

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

#[tokio::test]
async fn test_product_filters() {
    let ctx = TestContext::new().await;
    ctx.add_product("Odyssey G7", ProductCategory::Displays, 549, 3).await;
    ctx.add_product("Viper Mini", ProductCategory::Peripherals, 39, 0).await;
    ctx.add_product("NF-A12x25", ProductCategory::Parts, 32, 10).await;

    let resp = ctx.get("/api/products").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()[CACHE_CONTROL].to_str().unwrap().contains("no-store"));
    let all: Vec<Value> = resp.json().await.unwrap();
    assert_eq!(all.len(), 3);

    let cases = [
        ("/api/products?category=displays", 1),
        ("/api/products?in_stock=true", 2),
        ("/api/products?min_price=35&max_price=100", 1),
        ("/api/products?q=viper", 1),
        ("/api/products?brand=test%20brand", 3),
    ];
    for (uri, expected) in cases {
        let found: Vec<Value> = ctx.get(uri).send().await.unwrap().json().await.unwrap();
        assert_eq!(found.len(), expected, "{uri}");
    }

    let resp = ctx.get("/api/products?category=toys").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_guest_cart_lifecycle() {
    let ctx = TestContext::new().await;
    let monitor = ctx.add_product("Odyssey G7", ProductCategory::Displays, 549, 3).await;

    let resp = ctx
        .post("/api/cart/items")
        .json(&json!({ "product_id": monitor.id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let cart_id = resp.headers()[CART_ID_HEADER].to_str().unwrap().to_owned();

    let cart: Value = ctx
        .put("/api/cart/items")
        .header(CART_ID_HEADER, &cart_id)
        .json(&json!({ "item": { "kind": "product", "id": monitor.id }, "quantity": 10 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cart["items"][0]["quantity"], 3, "capped at stock");
    assert_eq!(price(&cart["total"]), Price::from_dollars(1647));

    let cart: Value = ctx
        .delete("/api/cart/items")
        .header(CART_ID_HEADER, &cart_id)
        .json(&json!({ "item": { "kind": "component", "id": "cpu1" } }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cart["item_count"], 3, "removing a missing line is a no-op");

    let cart: Value = ctx
        .delete("/api/cart")
        .header(CART_ID_HEADER, &cart_id)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cart["item_count"], 0);
}

#[tokio::test]
async fn test_out_of_stock_and_missing_products() {
    let ctx = TestContext::new().await;
    let sold_out = ctx.add_product("Viper Mini", ProductCategory::Peripherals, 39, 0).await;

    let resp = ctx
        .post("/api/cart/items")
        .json(&json!({ "product_id": sold_out.id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = ctx
        .post("/api/cart/items")
        .json(&json!({ "product_id": 4242 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_guest_cart_follows_login_into_checkout() {
    let ctx = TestContext::new().await;
    let monitor = ctx.add_product("Odyssey G7", ProductCategory::Displays, 549, 3).await;
    let fan = ctx.add_product("NF-A12x25", ProductCategory::Parts, 32, 10).await;
    ctx.create_account("shopper@example.com", UserRole::User).await;

    let resp = ctx
        .post("/api/cart/items")
        .json(&json!({ "product_id": monitor.id, "quantity": 2 }))
        .send()
        .await
        .unwrap();
    let cart_id = resp.headers()[CART_ID_HEADER].to_str().unwrap().to_owned();
    ctx.post("/api/cart/items")
        .header(CART_ID_HEADER, &cart_id)
        .json(&json!({ "product_id": fan.id, "quantity": 4 }))
        .send()
        .await
        .unwrap();

    let login: Value = ctx
        .post("/api/auth/login")
        .header(CART_ID_HEADER, &cart_id)
        .json(&json!({ "email": "shopper@example.com", "password": PASSWORD }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let token = login["token"].as_str().unwrap();

    let cart: Value = ctx
        .get("/api/cart")
        .header(AUTHORIZATION, bearer(token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cart["item_count"], 6);

    let resp = ctx
        .post("/api/orders")
        .header(AUTHORIZATION, bearer(token))
        .json(&json!({ "shipping": { "full_name": "Ada", "address": " ", "city": "London", "phone": "1" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = ctx
        .post("/api/orders")
        .header(AUTHORIZATION, bearer(token))
        .json(&shipping())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let order: Value = resp.json().await.unwrap();
    assert_eq!(order["status"], "pending");
    assert_eq!(order["items"].as_array().unwrap().len(), 2);
    assert_eq!(price(&order["total"]), Price::from_dollars(549 * 2 + 32 * 4));

    let product: Value = ctx
        .get(&format!("/api/products/{}", monitor.id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(product["stock"], 1);

    let cart: Value = ctx
        .get("/api/cart")
        .header(AUTHORIZATION, bearer(token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cart["item_count"], 0);

    let resp = ctx
        .post("/api/orders")
        .header(AUTHORIZATION, bearer(token))
        .json(&shipping())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "empty cart");
}

#[tokio::test]
async fn test_orders_are_private() {
    let ctx = TestContext::new().await;
    let fan = ctx.add_product("NF-A12x25", ProductCategory::Parts, 32, 10).await;
    let (_, alice) = ctx.signed_in("alice@example.com", UserRole::User).await;
    let (_, bob) = ctx.signed_in("bob@example.com", UserRole::User).await;
    let (_, manager) = ctx.signed_in("manager@example.com", UserRole::Manager).await;

    ctx.post("/api/cart/items")
        .header(AUTHORIZATION, bearer(&alice))
        .json(&json!({ "product_id": fan.id }))
        .send()
        .await
        .unwrap();
    let order: Value = ctx
        .post("/api/orders")
        .header(AUTHORIZATION, bearer(&alice))
        .json(&shipping())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let path = format!("/api/orders/{}", order["id"]);

    let mine: Vec<Value> = ctx
        .get("/api/orders")
        .header(AUTHORIZATION, bearer(&alice))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);

    let theirs: Vec<Value> = ctx
        .get("/api/orders")
        .header(AUTHORIZATION, bearer(&bob))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(theirs.is_empty());

    let resp = ctx.get(&path).header(AUTHORIZATION, bearer(&bob)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = ctx.get(&path).header(AUTHORIZATION, bearer(&manager)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = ctx.get(&path).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
