//! Registration, login and token handling.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use rigshop_core::UserRole;
use rigshop_integration_tests::{PASSWORD, TestContext};
use serde_json::{Value, json};

#[tokio::test]
async fn test_register_then_me() {
    let ctx = TestContext::new().await;

    let resp = ctx
        .post("/api/auth/register")
        .json(&json!({ "email": "New@Example.com", "name": "Newcomer", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["user"]["email"], "new@example.com");
    assert_eq!(body["user"]["role"], "user");
    assert!(body["user"].get("password_hash").is_none());
    assert!(body["expires_in"].as_i64().unwrap() > 0);

    let token = body["token"].as_str().unwrap();
    let me: Value = ctx
        .get("/api/auth/me")
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["user"]["name"], "Newcomer");

    let anonymous: Value = ctx.get("/api/auth/me").send().await.unwrap().json().await.unwrap();
    assert!(anonymous["user"].is_null());
}

#[tokio::test]
async fn test_register_rejections() {
    let ctx = TestContext::new().await;
    ctx.create_account("taken@example.com", UserRole::User).await;

    let cases = [
        (json!({ "email": "taken@example.com", "name": "Dup", "password": PASSWORD }), StatusCode::CONFLICT),
        (json!({ "email": "short@example.com", "name": "Short", "password": "abc" }), StatusCode::BAD_REQUEST),
        (json!({ "email": "not-an-email", "name": "Bad", "password": PASSWORD }), StatusCode::BAD_REQUEST),
        (json!({ "email": "noname@example.com", "password": PASSWORD }), StatusCode::BAD_REQUEST),
    ];
    for (body, expected) in cases {
        let resp = ctx.post("/api/auth/register").json(&body).send().await.unwrap();
        assert_eq!(resp.status(), expected, "{body}");
        let error: Value = resp.json().await.unwrap();
        assert!(error["error"].is_string());
    }
}

#[tokio::test]
async fn test_login_failures_look_the_same() {
    let ctx = TestContext::new().await;
    ctx.create_account("shopper@example.com", UserRole::User).await;

    let wrong_password = ctx
        .post("/api/auth/login")
        .json(&json!({ "email": "shopper@example.com", "password": "not the password" }))
        .send()
        .await
        .unwrap();
    let unknown_user = ctx
        .post("/api/auth/login")
        .json(&json!({ "email": "ghost@example.com", "password": PASSWORD }))
        .send()
        .await
        .unwrap();

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);
    let a: Value = wrong_password.json().await.unwrap();
    let b: Value = unknown_user.json().await.unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_logout_and_bad_tokens() {
    let ctx = TestContext::new().await;
    let (_, token) = ctx.signed_in("shopper@example.com", UserRole::User).await;

    let resp = ctx
        .post("/api/auth/logout")
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);

    let resp = ctx
        .get("/api/orders")
        .header(AUTHORIZATION, "Bearer not.a.token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_endpoints_are_rate_limited() {
    let ctx = TestContext::with_vars(&[
        ("RIGSHOP_AUTH_RATE_PERIOD_SECS", "60"),
        ("RIGSHOP_AUTH_RATE_BURST", "2"),
    ])
    .await;

    let mut statuses = Vec::new();
    for _ in 0..4 {
        let resp = ctx
            .post("/api/auth/login")
            .json(&json!({ "email": "ghost@example.com", "password": PASSWORD }))
            .send()
            .await
            .unwrap();
        statuses.push(resp.status());
    }
    assert_eq!(&statuses[..2], [StatusCode::UNAUTHORIZED, StatusCode::UNAUTHORIZED]);
    assert_eq!(statuses[3], StatusCode::TOO_MANY_REQUESTS);

    // Other endpoints are not limited.
    let resp = ctx.get("/api/products").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
