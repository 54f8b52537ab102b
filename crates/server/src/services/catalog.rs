//! Saving products and running searches.

use chrono::Utc;
use serde::Serialize;

use prizey_core::CurrencyCode;

use crate::config::ApifyConfig;
use crate::db::Store;
use crate::models::{ProductInput, ProductWithHistory};
use crate::services::apify::{self, ProductSource, ScrapeContext, ScrapeError, ScrapedProduct};

/// Upsert a batch of products, one at a time.
///
/// A product that fails validation or storage is logged and skipped; the
/// rest of the batch still goes through.
pub async fn save_products(
    store: &dyn Store,
    inputs: Vec<ProductInput>,
    default_currency: CurrencyCode,
) -> Vec<ProductWithHistory> {
    let mut saved = Vec::with_capacity(inputs.len());

    for input in inputs {
        let asin = input.asin.clone().unwrap_or_default();
        let product = match input.into_new_product(default_currency) {
            Ok(product) => product,
            Err(e) => {
                tracing::warn!(asin = %asin, error = %e, "Skipping invalid product");
                continue;
            }
        };

        match store.upsert_product(&product).await {
            Ok(result) => saved.push(result),
            Err(e) => {
                tracing::warn!(asin = %asin, error = %e, "Failed to save product");
            }
        }
    }

    saved
}

/// Result of `POST /api/scrape`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    pub success: bool,
    pub products: Vec<ScrapedProduct>,
    pub saved_products: Vec<ProductWithHistory>,
    pub total: usize,
}

/// Run a marketplace search and save what it finds.
///
/// # Errors
///
/// Returns `ScrapeError` if the actor run fails. Storage failures of single
/// products are skipped, not returned.
pub async fn search(
    store: &dyn Store,
    source: &dyn ProductSource,
    config: &ApifyConfig,
    query: &str,
) -> Result<SearchOutcome, ScrapeError> {
    let query = query.trim();
    let url = apify::search_url(&config.marketplace_url, query);

    tracing::info!(query = %query, "Searching marketplace");
    let items = source.search(&url).await?;

    let products = apify::map_items(
        &items,
        &ScrapeContext {
            query,
            search_url: &url,
            source_label: &config.source_label,
            currency: config.currency,
            scraped_at: Utc::now(),
        },
    );

    let inputs = products.iter().map(ScrapedProduct::to_input).collect();
    let saved_products = save_products(store, inputs, config.currency).await;

    tracing::info!(
        query = %query,
        found = items.len(),
        kept = products.len(),
        saved = saved_products.len(),
        "Search complete"
    );

    Ok(SearchOutcome {
        success: true,
        total: products.len(),
        products,
        saved_products,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use secrecy::SecretString;
    use serde_json::{Value, json};

    use super::*;
    use crate::db::MemoryStore;
    use crate::models::ProductFilter;

    struct FixedSource {
        items: Vec<Value>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ProductSource for FixedSource {
        async fn search(&self, search_url: &str) -> Result<Vec<Value>, ScrapeError> {
            self.seen.lock().push(search_url.to_string());
            Ok(self.items.clone())
        }
    }

    fn config() -> ApifyConfig {
        ApifyConfig {
            token: SecretString::from("apify_api_test"),
            base_url: "http://localhost".to_string(),
            actor: "junglee~amazon-crawler".to_string(),
            marketplace_url: "https://www.amazon.in".to_string(),
            proxy_country: "IN".to_string(),
            source_label: "Amazon India".to_string(),
            currency: CurrencyCode::INR,
            wait: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_save_products_skips_invalid() {
        let store = MemoryStore::new();
        let inputs: Vec<ProductInput> = serde_json::from_value(json!([
            {"asin": "B0KETTLE01", "title": "Kettle", "price": {"value": 999, "currency": "INR"}},
            {"title": "No asin"},
            {"asin": "B0TOAST001", "title": "Toaster", "price": "1,499"}
        ]))
        .unwrap();

        let saved = save_products(&store, inputs, CurrencyCode::INR).await;
        assert_eq!(saved.len(), 2);
        assert_eq!(store.product_count(), 2);
        assert_eq!(saved[1].product.current_price, rust_decimal::Decimal::from(1499));
    }

    #[tokio::test]
    async fn test_search_maps_and_saves() {
        let store = MemoryStore::new();
        let source = FixedSource {
            items: vec![
                json!({"asin": "B0KETTLE01", "title": "Kettle", "price": {"value": 1299, "currency": "INR"}}),
                json!({"asin": "B0NOTITLE1"}),
            ],
            seen: Mutex::new(Vec::new()),
        };

        let outcome = search(&store, &source, &config(), "  electric kettle ")
            .await
            .unwrap();

        assert_eq!(
            source.seen.lock().as_slice(),
            ["https://www.amazon.in/s?k=electric%20kettle"]
        );
        assert_eq!(outcome.total, 1);
        assert_eq!(outcome.products[0].metadata.search_query, "electric kettle");
        assert_eq!(outcome.saved_products.len(), 1);
        assert_eq!(outcome.saved_products[0].product.brand.as_deref(), Some("Unknown Brand"));

        let stored = store.list_products(&ProductFilter::default()).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].price_history.len(), 1);
    }
}
