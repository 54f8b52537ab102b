//! CLI subcommands.

pub mod migrate;
pub mod search;
pub mod user;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use prizey_server::config::ConfigError;
use prizey_server::services::apify::ScrapeError;
use prizey_server::services::auth::AuthError;

/// Errors from any subcommand.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("Search failed: {0}")]
    Scrape(#[from] ScrapeError),
}

/// Connect to the database named by `PRIZEY_DATABASE_URL` or `DATABASE_URL`.
pub async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("PRIZEY_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| CommandError::MissingEnvVar("PRIZEY_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(prizey_server::db::create_pool(&SecretString::from(database_url)).await?)
}
