//! Marketplace search handler.

use axum::{Json, extract::State};
use serde::Deserialize;

use super::JsonBody;
use crate::error::{AppError, Result};
use crate::services::catalog::{self, SearchOutcome};
use crate::state::AppState;

/// Body of `POST /api/scrape`.
#[derive(Debug, Deserialize)]
pub struct ScrapeRequest {
    pub query: Option<String>,
}

/// `POST /api/scrape`
///
/// Runs the scraping actor and saves what it finds. The actor call blocks
/// until the run finishes or the configured wait runs out.
pub async fn search(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ScrapeRequest>,
) -> Result<Json<SearchOutcome>> {
    let query = body.query.as_deref().map(str::trim).unwrap_or_default();
    if query.is_empty() {
        return Err(AppError::BadRequest("Search query is required".to_string()));
    }

    let outcome = catalog::search(state.store(), state.source(), &state.config().apify, query)
        .await
        .inspect_err(|e| tracing::error!(query = %query, error = %e, "Search failed"))?;

    Ok(Json(outcome))
}
