//! Checkout and a customer's order history.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::instrument;

use rigshop_core::{OrderId, Permission};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::{RequireAccount, RequireAuth, require_permission};
use crate::models::{Order, ShippingAddress};
use crate::services::checkout::CheckoutService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    #[serde(default)]
    pub shipping: ShippingAddress,
}

/// Place an order for everything in the caller's cart. The account must
/// still exist.
#[instrument(skip(state, user, request), fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAccount(user): RequireAccount,
    ApiJson(request): ApiJson<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    require_permission(user.role, Permission::PlaceOrders)?;
    let order = CheckoutService::new(state.store())
        .place_order(user.id, request.shipping)
        .await?;
    let order_id = order.id.to_string();
    add_breadcrumb("checkout", "Order placed", Some(&[("order_id", order_id.as_str())]));
    Ok((StatusCode::CREATED, Json(order)))
}

/// The caller's orders, pending first.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    require_permission(user.role, Permission::ViewOwnOrders)?;
    let orders = CheckoutService::new(state.store())
        .orders_for(user.id)
        .await?;
    Ok(Json(orders))
}

/// One order. Visible to its owner and to staff who manage orders; anyone
/// else gets a 404 so order IDs cannot be probed.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<Order>> {
    let not_found = || AppError::NotFound(format!("order {id} not found"));
    let order = state.store().get_order(id).await?.ok_or_else(not_found)?;

    if order.user_id == Some(user.id) {
        return Ok(Json(order));
    }

    let may_manage = state
        .store()
        .get_user(user.id)
        .await?
        .is_some_and(|account| account.role.has_permission(Permission::ManageOrders));
    if may_manage {
        Ok(Json(order))
    } else {
        Err(not_found())
    }
}
