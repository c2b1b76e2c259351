//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                        - Liveness
//! GET    /health/ready                  - Storage reachability
//!
//! # Auth (register/login rate limited)
//! POST   /api/auth/register             - Create account, returns token
//! POST   /api/auth/login                - Returns token
//! POST   /api/auth/logout               - Client drops its token
//! GET    /api/auth/me                   - Current user or null
//!
//! # Catalog
//! GET    /api/products                  - Filtered listing
//! GET    /api/products/{id}             - Product detail
//! GET    /api/images/{filename}         - Uploaded image bytes
//!
//! # PC builder
//! GET    /api/builder/catalog           - Slots and components
//! POST   /api/builder/check             - Compatibility summary
//! POST   /api/builder/cart              - Add a finished build to the cart
//!
//! # Cart (guest via X-Cart-Id, or signed in)
//! GET    /api/cart                      - Cart contents
//! POST   /api/cart/items                - Add product
//! PUT    /api/cart/items                - Set quantity
//! DELETE /api/cart/items                - Remove line
//! DELETE /api/cart                      - Clear
//!
//! # Orders (requires auth)
//! POST   /api/orders                    - Checkout
//! GET    /api/orders                    - Own orders
//! GET    /api/orders/{id}               - One order
//!
//! # Admin (see `admin`)
//! /api/admin/...
//! ```

pub mod admin;
pub mod auth;
pub mod builder;
pub mod cart;
pub mod health;
pub mod images;
pub mod orders;
pub mod products;

use axum::{
    Router,
    body::Body,
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue, Method, Request, header},
    middleware::from_fn,
    routing::{get, post},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::RateLimitConfig;
use crate::error::AppError;
use crate::middleware::{
    CART_ID_HEADER, REQUEST_ID_HEADER, auth_rate_limiter, request_id_middleware,
    security_headers_middleware,
};
use crate::state::AppState;

/// Room for multipart framing and text fields on top of the image itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Create the auth routes router.
pub fn auth_routes(limits: RateLimitConfig) -> Router<AppState> {
    let limited = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(auth_rate_limiter(limits));

    Router::new()
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .merge(limited)
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Create the builder routes router.
pub fn builder_routes() -> Router<AppState> {
    Router::new()
        .route("/catalog", get(builder::show_catalog))
        .route("/check", post(builder::check))
        .route("/cart", post(builder::add_to_cart))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route(
            "/items",
            post(cart::add_item)
                .put(cart::update_item)
                .delete(cart::remove_item),
        )
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::create))
        .route("/{id}", get(orders::show))
}

/// Create all `/api` routes.
pub fn api_routes(limits: RateLimitConfig) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes(limits))
        .nest("/products", product_routes())
        .route("/images/{filename}", get(images::show))
        .nest("/builder", builder_routes())
        .nest("/cart", cart_routes())
        .nest("/orders", order_routes())
        .nest("/admin", admin::routes())
}

async fn not_found() -> AppError {
    AppError::NotFound("No such route".to_string())
}

/// CORS for the configured origins; `None` when there are none.
fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            HeaderValue::from_str(origin)
                .inspect_err(|_| tracing::warn!(%origin, "Ignoring invalid CORS origin"))
                .ok()
        })
        .collect();
    if origins.is_empty() {
        return None;
    }

    let cart_id = HeaderName::from_static(CART_ID_HEADER);
    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, cart_id.clone()])
            .expose_headers([cart_id, HeaderName::from_static(REQUEST_ID_HEADER)]),
    )
}

/// The complete application with its middleware stack.
pub fn router(state: AppState) -> Router {
    let config = state.config();
    let body_limit = config.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES);
    let cors = cors_layer(&config.allowed_origins);

    let mut app = Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api", api_routes(config.auth_rate_limit))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn(security_headers_middleware));

    if let Some(cors) = cors {
        app = app.layer(cors);
    }

    app.layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::BTreeMap;

    use axum::http::StatusCode;
    use rigshop_core::{Price, ProductCategory};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::models::NewProduct;

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, body)
    }

    fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn app_with_product(stock: u32) -> (tempfile::TempDir, Router, Value) {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::for_tests(dir.path()).await;
        let product = state
            .store()
            .create_product(NewProduct {
                name: "Odyssey G7".to_owned(),
                description: Some("240Hz curved monitor".to_owned()),
                brand: Some("Samsung".to_owned()),
                price: Price::from_dollars(549),
                category: ProductCategory::Displays,
                subcategory: None,
                stock,
                image_url: None,
                specs: BTreeMap::new(),
            })
            .await
            .unwrap();
        (dir, router(state), serde_json::to_value(product).unwrap())
    }

    #[tokio::test]
    async fn test_health_and_fallback() {
        let (_dir, app, _) = app_with_product(1).await;

        let response = app.clone().oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));

        let (status, _, _) = send(&app, get_request("/health/ready")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _, body) = send(&app, get_request("/api/nowhere")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_product_listing_is_not_cached() {
        let (_dir, app, product) = app_with_product(1).await;

        let (status, headers, body) = send(&app, get_request("/api/products?q=curved")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache, no-store, must-revalidate");
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (_, _, body) = send(&app, get_request("/api/products?category=peripherals")).await;
        assert!(body.as_array().unwrap().is_empty());

        let uri = format!("/api/products/{}", product["id"]);
        let (status, _, body) = send(&app, get_request(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Odyssey G7");

        let (status, _, _) = send(&app, get_request("/api/products/999")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_guest_cart_gets_an_id() {
        let (_dir, app, product) = app_with_product(2).await;

        let add = json!({ "product_id": product["id"], "quantity": 5 });
        let (status, headers, body) =
            send(&app, json_request(Method::POST, "/api/cart/items", &add)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["item_count"], 2);
        let cart_id = headers[CART_ID_HEADER].to_str().unwrap().to_owned();

        let request = Request::builder()
            .uri("/api/cart")
            .header(CART_ID_HEADER, &cart_id)
            .body(Body::empty())
            .unwrap();
        let (_, headers, body) = send(&app, request).await;
        assert_eq!(headers[CART_ID_HEADER], cart_id.as_str());
        let total: rust_decimal::Decimal = body["total"].as_str().unwrap().parse().unwrap();
        assert_eq!(Price::new(total), Price::from_dollars(1098));
    }

    #[tokio::test]
    async fn test_checkout_requires_auth() {
        let (_dir, app, _) = app_with_product(1).await;
        let (status, _, body) = send(
            &app,
            json_request(Method::POST, "/api/orders", &json!({ "shipping": {} })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Authentication required");
    }

    #[tokio::test]
    async fn test_builder_check_and_unknown_component() {
        let (_dir, app, _) = app_with_product(1).await;

        let (status, _, body) = send(&app, get_request("/api/builder/catalog")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["categories"].as_array().unwrap().len(), 8);

        let mismatch = json!({ "selection": { "cpu": "cpu2", "motherboard": "mb1" } });
        let (status, _, body) =
            send(&app, json_request(Method::POST, "/api/builder/check", &mismatch)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["compatible"], false);
        assert_eq!(body["issues"][0]["rule"], "socket");

        let unknown = json!({ "selection": { "cpu": "cpu99" } });
        let (status, _, _) =
            send(&app, json_request(Method::POST, "/api/builder/check", &unknown)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_image_names_are_checked() {
        let (_dir, app, _) = app_with_product(1).await;

        let (status, _, _) = send(&app, get_request("/api/images/notes.txt")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _, _) = send(&app, get_request("/api/images/..%2Fsecret.png")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _, _) = send(&app, get_request("/api/images/missing.png")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_json_gets_json_error() {
        let (_dir, app, _) = app_with_product(1).await;
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/builder/check")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }
}
