//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Credential sign-in (argon2)
//! - `oauth` - GitHub and Google sign-in
//! - `apify` - Marketplace search through the Apify actor
//! - `catalog` - Batch product upserts and search-and-save
//! - `lists` - List ownership, membership and share pages

pub mod apify;
pub mod auth;
pub mod catalog;
pub mod lists;
pub mod oauth;
