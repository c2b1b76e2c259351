//! Back-office API, nested under `/api/admin`.
//!
//! Every route except `verify` requires a manager or admin, re-read from the
//! store; user management requires an admin.

pub mod dashboard;
pub mod orders;
pub mod products;
pub mod uploads;
pub mod users;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::state::AppState;

/// Create the admin routes router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/verify", get(dashboard::verify))
        .route("/stats", get(dashboard::stats))
        .route("/products", get(products::index).post(products::create))
        .route(
            "/products/{id}",
            put(products::update).delete(products::delete),
        )
        .route("/uploads", post(uploads::create))
        .route("/orders", get(orders::index))
        .route("/orders/{id}/status", put(orders::update_status))
        .route("/users", get(users::index).post(users::create))
        .route("/users/{id}", put(users::update).delete(users::delete))
}
