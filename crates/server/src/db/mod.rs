//! Persistence for Prizey.
//!
//! # Schema: `prizey`
//!
//! - `user` - Accounts (credential users carry an argon2 hash)
//! - `account` - OAuth provider links
//! - `product` - Tracked products, unique by ASIN
//! - `price_history` - Append-only price observations per product
//! - `list` - User-owned product lists (`product_ids INTEGER[]`)
//!
//! Sessions live in `tower_sessions.session`, the default table of
//! `tower-sessions-sqlx-store`.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p prizey-cli -- migrate
//! ```
//!
//! Handlers reach the database through the [`Store`] trait. [`PgStore`] is
//! the production implementation; [`MemoryStore`] keeps the same semantics in
//! process for tests and local demos.

pub mod lists;
pub mod memory;
pub mod products;
pub mod store;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use memory::MemoryStore;
pub use store::{PgStore, Store};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique-violation into [`RepositoryError::Conflict`].
pub(crate) fn conflict_on_unique(message: &'static str) -> impl FnOnce(sqlx::Error) -> RepositoryError {
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return RepositoryError::Conflict(message.to_owned());
        }
        RepositoryError::Database(e)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
