//! Rigshop Core - Shared types library.
//!
//! This crate provides common types used across all Rigshop components:
//! - `storefront` - HTTP JSON API for the shop and its back-office
//! - `cli` - Command-line tools for migrations, users and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access, no HTTP. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, roles and statuses
//! - [`builder`] - PC builder component catalog and compatibility evaluation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod builder;
pub mod types;

pub use types::*;
