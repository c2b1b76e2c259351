//! HTTP middleware and request extractors for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry hub and HTTP layers (capture errors, start transactions)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (tag span and Sentry scope)
//! 4. Security headers
//! 5. CORS, when origins are configured
//! 6. Rate limiting on the auth routes (governor)

pub mod auth;
pub mod cart;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use auth::{
    AuthUser, OptionalAuth, RequireAccount, RequireAdmin, RequireAuth, RequireStaff,
    require_permission,
};
pub use cart::{CART_ID_HEADER, CartIdHeader, CartOwner, guest_cart_id};
pub use rate_limit::{ClientIpKeyExtractor, auth_rate_limiter};
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
pub use security_headers::security_headers_middleware;
