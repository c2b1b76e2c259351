//! Order fulfilment for staff.

use axum::{Json, extract::State};
use serde::Deserialize;
use tracing::instrument;

use rigshop_core::{OrderId, OrderStatus, Permission};

use crate::error::Result;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::{RequireStaff, require_permission};
use crate::models::Order;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

/// All orders, newest first.
#[instrument(skip(state, user))]
pub async fn index(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    ApiQuery(query): ApiQuery<OrderQuery>,
) -> Result<Json<Vec<Order>>> {
    require_permission(user.role, Permission::ManageOrders)?;
    Ok(Json(state.store().list_orders(query.status).await?))
}

/// Move an order to any status.
#[instrument(skip(state, user), fields(by = %user.id))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(update): ApiJson<StatusUpdate>,
) -> Result<Json<Order>> {
    require_permission(user.role, Permission::ManageOrders)?;
    let order = state
        .store()
        .update_order_status(id, update.status)
        .await?;
    tracing::info!(order_id = %order.id, status = %order.status, "Order status changed");
    Ok(Json(order))
}
