//! One-off marketplace search, the same flow as `POST /api/scrape`.

use prizey_server::config::ApifyConfig;
use prizey_server::db::PgStore;
use prizey_server::services::apify::ApifyClient;
use prizey_server::services::catalog;

use super::{CommandError, connect};

/// Search, save, and log what was kept.
pub async fn run(query: &str) -> Result<(), CommandError> {
    let config = ApifyConfig::from_env()?;
    let source = ApifyClient::new(&config)?;
    let store = PgStore::new(connect().await?);

    let outcome = catalog::search(&store, &source, &config, query).await?;

    for saved in &outcome.saved_products {
        tracing::info!(
            id = %saved.product.id,
            asin = %saved.product.asin,
            price = %saved.product.price(),
            "{}",
            saved.product.title
        );
    }
    tracing::info!(
        "Found {} products, saved {}",
        outcome.total,
        outcome.saved_products.len()
    );
    Ok(())
}
