//! Business logic services for the storefront.
//!
//! Services borrow the shared [`Store`](crate::db::Store) and hold no state
//! of their own, so handlers build them per request.
//!
//! # Services
//!
//! - `auth` - Password accounts and bearer tokens
//! - `cart` - Cart operations for guests and signed-in users
//! - `checkout` - Turning a cart into an order
//! - `images` - Product image uploads and serving

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod images;
