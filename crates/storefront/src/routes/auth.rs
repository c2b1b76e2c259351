//! Account registration, login and the current-user lookup.
//!
//! Tokens are stateless, so logout only tells the client to drop its token.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::instrument;

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::extract::ApiJson;
use crate::middleware::{OptionalAuth, guest_cart_id};
use crate::models::User;
use crate::services::auth::AuthService;
use crate::services::cart::CartService;
use crate::state::AppState;

/// Registration form.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: String,
}

/// Login form.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// A signed-in user and their bearer token.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
    /// Token lifetime in seconds.
    pub expires_in: i64,
}

fn signed_in(state: &AppState, user: User) -> Result<AuthResponse> {
    let token = state.tokens().issue(&user)?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(AuthResponse {
        user,
        token,
        expires_in: state.tokens().ttl().num_seconds(),
    })
}

/// Fold the guest cart named by `X-Cart-Id` into the user's cart.
async fn adopt_guest_cart(state: &AppState, headers: &HeaderMap, user: &User) -> Result<()> {
    if let Some(guest) = guest_cart_id(headers) {
        CartService::new(state.store())
            .merge_guest(guest, user.id)
            .await?;
    }
    Ok(())
}

/// Create a customer account and sign it in.
#[instrument(skip(state, headers, form), fields(email = %form.email))]
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(form): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let user = AuthService::new(state.store())
        .register(&form.email, &form.name, &form.password)
        .await?;
    adopt_guest_cart(&state, &headers, &user).await?;

    Ok((StatusCode::CREATED, Json(signed_in(&state, user)?)))
}

/// Exchange email and password for a token.
#[instrument(skip(state, headers, form), fields(email = %form.email))]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(form): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let user = AuthService::new(state.store())
        .login(&form.email, &form.password)
        .await
        .inspect_err(|e| tracing::info!(error = %e, "Login failed"))?;
    adopt_guest_cart(&state, &headers, &user).await?;

    tracing::info!(user_id = %user.id, "Logged in");
    Ok(Json(signed_in(&state, user)?))
}

/// Sign out. The client discards its token.
pub async fn logout() -> Json<Value> {
    clear_sentry_user();
    Json(json!({ "success": true }))
}

/// The signed-in user, or `null`.
///
/// The account is re-read so a deleted user shows as signed out.
pub async fn me(
    State(state): State<AppState>,
    OptionalAuth(auth): OptionalAuth,
) -> Result<Json<Value>> {
    let user = match auth {
        Some(auth) => state.store().get_user(auth.id).await?,
        None => None,
    };
    Ok(Json(json!({ "user": user })))
}
