//! PC builder endpoints: the component catalog, compatibility checks and
//! adding a finished build to the cart.

use std::collections::BTreeMap;

use axum::{Json, extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use rigshop_core::builder::{BuildSelection, BuildSummary, ComponentCategory, ComponentKind, catalog};

use crate::error::Result;
use crate::extract::ApiJson;
use crate::middleware::CartOwner;
use crate::models::CartSummary;
use crate::services::cart::CartService;
use crate::state::AppState;

/// A selection as sent by the client: `{slot: component id}`.
#[derive(Debug, Default, Deserialize)]
pub struct BuildRequest {
    #[serde(default)]
    pub selection: BTreeMap<ComponentKind, String>,
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub categories: &'static [ComponentCategory],
}

/// Every builder slot with the parts offered for it.
pub async fn show_catalog() -> Json<CatalogResponse> {
    Json(CatalogResponse {
        categories: catalog(),
    })
}

/// Price, completeness and compatibility of a selection.
#[instrument(skip_all, fields(parts = request.selection.len()))]
pub async fn check(ApiJson(request): ApiJson<BuildRequest>) -> Result<Json<BuildSummary>> {
    let selection = BuildSelection::resolve(&request.selection)?;
    Ok(Json(selection.summary()))
}

/// Add every part of a complete, compatible build to the caller's cart.
#[instrument(skip_all, fields(cart = %owner.key))]
pub async fn add_to_cart(
    State(state): State<AppState>,
    owner: CartOwner,
    ApiJson(request): ApiJson<BuildRequest>,
) -> Result<impl IntoResponse> {
    let selection = BuildSelection::resolve(&request.selection)?;
    let cart = CartService::new(state.store())
        .add_build(&owner.key, &selection)
        .await?;
    Ok((owner.cart_id_header(), Json(CartSummary::from(cart))))
}
