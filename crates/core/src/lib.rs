//! Prizey Core - Shared domain types.
//!
//! This crate provides the types shared by every Prizey component:
//! - `server` - JSON API for product search, lists and price history
//! - `cli` - Operator tooling for migrations, users and one-off searches
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Database encoding lives behind the `postgres`
//! feature so the types stay usable anywhere.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, emails, ASINs, prices and price sources

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
