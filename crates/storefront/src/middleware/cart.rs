//! Cart ownership.
//!
//! A signed-in caller shops from their own cart. Guests are identified by
//! the `X-Cart-Id` header; a guest without one gets a fresh ID, which the
//! handler echoes back so the client can keep it.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, request::Parts},
    response::{IntoResponseParts, ResponseParts},
};
use uuid::Uuid;

use crate::middleware::auth::{AuthUser, OptionalAuth};
use crate::models::CartKey;
use crate::state::AppState;

/// Header carrying a guest's cart ID.
pub const CART_ID_HEADER: &str = "x-cart-id";

/// The guest cart ID sent with a request, if it parses.
#[must_use]
pub fn guest_cart_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(CART_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
}

/// Whose cart a request operates on.
#[derive(Debug, Clone)]
pub struct CartOwner {
    pub key: CartKey,
    pub user: Option<AuthUser>,
}

impl CartOwner {
    /// Response header handing the guest cart ID back to the client.
    #[must_use]
    pub const fn cart_id_header(&self) -> CartIdHeader {
        match self.key {
            CartKey::Guest(id) => CartIdHeader(Some(id)),
            CartKey::User(_) => CartIdHeader(None),
        }
    }
}

impl FromRequestParts<AppState> for CartOwner {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let OptionalAuth(user) = OptionalAuth::from_request_parts(parts, state).await?;

        let key = match &user {
            Some(user) => CartKey::User(user.id),
            None => CartKey::Guest(guest_cart_id(&parts.headers).unwrap_or_else(Uuid::new_v4)),
        };

        Ok(Self { key, user })
    }
}

/// Sets `X-Cart-Id` on the response for guest carts.
#[derive(Debug, Clone, Copy)]
pub struct CartIdHeader(pub Option<Uuid>);

impl IntoResponseParts for CartIdHeader {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        if let Some(id) = self.0
            && let Ok(value) = HeaderValue::from_str(&id.to_string())
        {
            res.headers_mut().insert(CART_ID_HEADER, value);
        }
        Ok(res)
    }
}
