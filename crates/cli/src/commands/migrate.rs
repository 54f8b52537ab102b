//! Database migration command.
//!
//! Migrations live in `crates/server/migrations/` and are embedded at build
//! time. The server never runs them on startup.

use super::{CommandError, connect};

/// Run all pending migrations.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
