//! Core types for Rigshop.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod category;
pub mod email;
pub mod id;
pub mod price;
pub mod role;
pub mod status;

pub use category::{ProductCategory, UnknownCategory};
pub use email::{Email, EmailError};
pub use id::*;
pub use price::Price;
pub use role::{Permission, UserRole};
pub use status::OrderStatus;
