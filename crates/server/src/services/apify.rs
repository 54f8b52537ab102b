//! Product search through a hosted Apify actor.
//!
//! A search starts an actor run against the marketplace's search page, waits
//! for it to finish and reads the run's default dataset. Items come back in
//! whatever shape the actor emits; [`map_items`] turns them into
//! [`ScrapedProduct`]s.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;

use prizey_core::{Asin, CurrencyCode, Price, RawPrice};

use crate::config::ApifyConfig;
use crate::models::ProductInput;

/// Title given to items without one. Such items are dropped.
pub const UNTITLED: &str = "Untitled Product";

/// Brand given to items without one.
pub const UNKNOWN_BRAND: &str = "Unknown Brand";

/// Most products kept from one search.
pub const MAX_RESULTS: usize = 10;

/// Longest single `waitForFinish` Apify honors, in seconds.
const MAX_WAIT_SECS: u64 = 60;

/// Errors that can occur when running the scraping actor.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The run ended in a status other than `SUCCEEDED`.
    #[error("actor run {run_id} finished with status {status}")]
    RunFailed { run_id: String, status: String },

    /// The run did not finish before the configured deadline.
    #[error("actor run {0} did not finish in time")]
    Timeout(String),

    /// Failed to build the client.
    #[error("configuration error: {0}")]
    Config(String),
}

/// A source of raw search results.
#[async_trait]
pub trait ProductSource: Send + Sync {
    /// Raw dataset items for a marketplace search page.
    async fn search(&self, search_url: &str) -> Result<Vec<Value>, ScrapeError>;
}

/// The marketplace search page for a query.
#[must_use]
pub fn search_url(marketplace_url: &str, query: &str) -> String {
    format!(
        "{}/s?k={}",
        marketplace_url.trim_end_matches('/'),
        urlencoding::encode(query)
    )
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartUrl<'a> {
    url: &'a str,
}

/// Input understood by the Amazon crawler actor.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ActorInput<'a> {
    category_or_product_urls: [StartUrl<'a>; 1],
    max_items_per_start_url: u32,
    proxy_country: &'a str,
    max_offers: u32,
    results_per_page: u32,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActorRun {
    id: String,
    status: String,
    default_dataset_id: String,
}

impl ActorRun {
    fn is_terminal(&self) -> bool {
        matches!(
            self.status.as_str(),
            "SUCCEEDED" | "FAILED" | "ABORTED" | "TIMED-OUT"
        )
    }
}

/// Apify API client.
#[derive(Clone)]
pub struct ApifyClient {
    client: reqwest::Client,
    base_url: String,
    actor: String,
    proxy_country: String,
    wait: Duration,
}

impl ApifyClient {
    /// Create a new Apify client.
    ///
    /// # Errors
    ///
    /// Returns error if the token is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &ApifyConfig) -> Result<Self, ScrapeError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", config.token.expose_secret());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value)
                .map_err(|e| ScrapeError::Config(format!("Invalid API token format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            actor: config.actor.clone(),
            proxy_country: config.proxy_country.clone(),
            wait: config.wait,
        })
    }

    async fn start_run(&self, search_url: &str, wait_secs: u64) -> Result<ActorRun, ScrapeError> {
        let url = format!(
            "{}/acts/{}/runs?waitForFinish={wait_secs}",
            self.base_url, self.actor
        );
        let input = ActorInput {
            category_or_product_urls: [StartUrl { url: search_url }],
            max_items_per_start_url: 9,
            proxy_country: &self.proxy_country,
            max_offers: 0,
            results_per_page: 6,
        };

        let response = self.client.post(&url).json(&input).send().await?;
        read_json::<Envelope<ActorRun>>(response).await.map(|e| e.data)
    }

    async fn get_run(&self, run_id: &str, wait_secs: u64) -> Result<ActorRun, ScrapeError> {
        let url = format!(
            "{}/actor-runs/{run_id}?waitForFinish={wait_secs}",
            self.base_url
        );
        let response = self.client.get(&url).send().await?;
        read_json::<Envelope<ActorRun>>(response).await.map(|e| e.data)
    }

    async fn dataset_items(&self, dataset_id: &str) -> Result<Vec<Value>, ScrapeError> {
        let url = format!(
            "{}/datasets/{dataset_id}/items?clean=true&format=json",
            self.base_url
        );
        let response = self.client.get(&url).send().await?;
        read_json(response).await
    }
}

#[async_trait]
impl ProductSource for ApifyClient {
    async fn search(&self, search_url: &str) -> Result<Vec<Value>, ScrapeError> {
        let deadline = Instant::now() + self.wait;
        let wait_secs = |deadline: Instant| {
            deadline
                .saturating_duration_since(Instant::now())
                .as_secs()
                .min(MAX_WAIT_SECS)
        };

        let mut run = self.start_run(search_url, wait_secs(deadline)).await?;
        tracing::info!(run_id = %run.id, status = %run.status, "Started actor run");

        while !run.is_terminal() {
            if Instant::now() >= deadline {
                return Err(ScrapeError::Timeout(run.id));
            }
            run = self.get_run(&run.id, wait_secs(deadline)).await?;
            tracing::debug!(run_id = %run.id, status = %run.status, "Polled actor run");
        }

        if run.status != "SUCCEEDED" {
            return Err(ScrapeError::RunFailed {
                run_id: run.id,
                status: run.status,
            });
        }

        let items = self.dataset_items(&run.default_dataset_id).await?;
        tracing::info!(run_id = %run.id, items = items.len(), "Fetched actor dataset");
        Ok(items)
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ScrapeError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ScrapeError::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response.json().await?)
}

/// Provenance attached to every scraped product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeMetadata {
    pub source: String,
    pub scraped_at: DateTime<Utc>,
    pub search_query: String,
}

/// A search result in the shape returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedProduct {
    pub asin: String,
    pub title: String,
    pub price: Price,
    pub brand: String,
    pub thumbnail_image: Option<String>,
    pub in_stock: bool,
    pub reviews_count: i64,
    pub url: String,
    pub stars: Option<f64>,
    pub description: Option<String>,
    pub bread_crumbs: Option<String>,
    pub metadata: ScrapeMetadata,
}

impl ScrapedProduct {
    /// The product as submitted for upsert.
    #[must_use]
    pub fn to_input(&self) -> ProductInput {
        ProductInput {
            asin: Some(self.asin.clone()),
            title: Some(self.title.clone()),
            price: Some(RawPrice::Tagged {
                value: Some(Value::String(self.price.amount.to_string())),
                currency: Some(self.price.currency_code.code().to_string()),
            }),
            brand: Some(self.brand.clone()),
            stars: self.stars,
            reviews_count: Some(self.reviews_count),
            thumbnail_image: self.thumbnail_image.clone(),
            bread_crumbs: self.bread_crumbs.clone(),
            description: self.description.clone(),
            url: Some(self.url.clone()),
        }
    }
}

/// What [`map_items`] needs to know about the search.
#[derive(Debug, Clone)]
pub struct ScrapeContext<'a> {
    pub query: &'a str,
    pub search_url: &'a str,
    pub source_label: &'a str,
    pub currency: CurrencyCode,
    pub scraped_at: DateTime<Utc>,
}

/// Map raw actor items, drop untitled ones and keep at most [`MAX_RESULTS`].
#[must_use]
pub fn map_items(items: &[Value], ctx: &ScrapeContext<'_>) -> Vec<ScrapedProduct> {
    items
        .iter()
        .map(|item| map_item(item, ctx))
        .filter(|product| product.title != UNTITLED)
        .take(MAX_RESULTS)
        .collect()
}

fn map_item(item: &Value, ctx: &ScrapeContext<'_>) -> ScrapedProduct {
    let amount = item
        .get("price")
        .and_then(|v| serde_json::from_value::<RawPrice>(v.clone()).ok())
        .map_or_else(
            || Price::zero(ctx.currency),
            |raw| raw.normalize(ctx.currency),
        )
        .amount;

    ScrapedProduct {
        asin: text(item, "asin").unwrap_or_else(|| Asin::generate().as_str().to_string()),
        title: text(item, "title").unwrap_or_else(|| UNTITLED.to_string()),
        price: Price::new(amount, ctx.currency),
        brand: text(item, "brand").unwrap_or_else(|| UNKNOWN_BRAND.to_string()),
        thumbnail_image: text(item, "thumbnailImage"),
        in_stock: item.get("inStock").and_then(Value::as_bool).unwrap_or(false),
        reviews_count: item
            .get("reviewsCount")
            .and_then(Value::as_i64)
            .unwrap_or(0),
        url: text(item, "url").unwrap_or_else(|| ctx.search_url.to_string()),
        stars: item
            .get("stars")
            .and_then(Value::as_f64)
            .filter(|s| *s > 0.0),
        description: text(item, "description"),
        bread_crumbs: text(item, "breadCrumbs"),
        metadata: ScrapeMetadata {
            source: ctx.source_label.to_string(),
            scraped_at: ctx.scraped_at,
            search_query: ctx.query.to_string(),
        },
    }
}

/// A non-empty string field.
fn text(item: &Value, key: &str) -> Option<String> {
    item.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}
