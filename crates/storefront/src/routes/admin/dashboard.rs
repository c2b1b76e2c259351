//! Back-office access check and dashboard counters.

use std::collections::BTreeMap;

use axum::{Json, extract::State};
use serde::Serialize;

use rigshop_core::{OrderStatus, Permission, ProductCategory, UserRole};

use crate::error::{AppError, Result};
use crate::middleware::{RequireAuth, RequireStaff};
use crate::models::User;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub is_admin: bool,
    pub role: UserRole,
    pub user: User,
}

/// Whether the bearer may open the back office, judged by their current role.
pub async fn verify(
    State(state): State<AppState>,
    RequireAuth(auth): RequireAuth,
) -> Result<Json<VerifyResponse>> {
    let user = state
        .store()
        .get_user(auth.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

    Ok(Json(VerifyResponse {
        is_admin: user.role.has_permission(Permission::AccessAdmin),
        role: user.role,
        user,
    }))
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub products_by_category: BTreeMap<ProductCategory, u64>,
    pub orders_by_status: BTreeMap<OrderStatus, u64>,
    /// Only present for callers who manage users.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users_by_role: Option<BTreeMap<UserRole, u64>>,
    pub total_products: u64,
    pub total_orders: u64,
}

/// Every key of `all` with its count, zero when absent.
fn complete<K: Ord + Copy>(all: &[K], mut counts: BTreeMap<K, u64>) -> BTreeMap<K, u64> {
    for key in all {
        counts.entry(*key).or_insert(0);
    }
    counts
}

/// Counters for the dashboard.
pub async fn stats(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
) -> Result<Json<StatsResponse>> {
    let store = state.store();
    let products_by_category = complete(
        &ProductCategory::ALL,
        store.count_products_by_category().await?,
    );
    let orders_by_status = complete(&OrderStatus::ALL, store.count_orders_by_status().await?);

    let users_by_role = if user.role.has_permission(Permission::ManageUsers) {
        Some(complete(
            &[UserRole::User, UserRole::Manager, UserRole::Admin],
            store.count_users_by_role().await?,
        ))
    } else {
        None
    };

    Ok(Json(StatsResponse {
        total_products: products_by_category.values().sum(),
        total_orders: orders_by_status.values().sum(),
        products_by_category,
        orders_by_status,
        users_by_role,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_fills_missing_keys() {
        let counts = complete(
            &OrderStatus::ALL,
            BTreeMap::from([(OrderStatus::Shipped, 2)]),
        );
        assert_eq!(counts.len(), OrderStatus::ALL.len());
        assert_eq!(counts.get(&OrderStatus::Shipped), Some(&2));
        assert_eq!(counts.get(&OrderStatus::Pending), Some(&0));
    }
}
