//! Product API handlers.

use std::str::FromStr;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};

use prizey_core::{ProductId, RawPrice};

use super::{JsonBody, parse_id};
use crate::error::{AppError, Context, Result};
use crate::models::product::{non_blank, stars_from_f64};
use crate::models::{ProductFilter, ProductInput, ProductUpdate};
use crate::services::catalog;
use crate::state::AppState;

const PRODUCT_NOT_FOUND: &str = "Product not found";

/// Query for `GET /api/product`.
///
/// Values are taken as strings so a blank or malformed filter is ignored
/// rather than rejected.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub q: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub min_stars: Option<String>,
    pub brand: Option<String>,
}

impl ProductQuery {
    fn into_filter(self) -> ProductFilter {
        ProductFilter {
            query: non_blank(self.q),
            min_price: parse_opt(self.min_price.as_deref()),
            max_price: parse_opt(self.max_price.as_deref()),
            min_stars: parse_opt(self.min_stars.as_deref()),
            brand: non_blank(self.brand),
        }
    }
}

fn parse_opt<T: FromStr>(raw: Option<&str>) -> Option<T> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
}

/// Body of `POST /api/product`.
///
/// Items stay raw JSON so one malformed product is skipped, not the batch.
/// `products` itself is raw too: anything but a non-empty array is a 400.
#[derive(Debug, Deserialize)]
pub struct SaveProductsRequest {
    pub products: Option<Value>,
}

/// Body of `PUT /api/product/{id}`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub title: Option<String>,
    pub brand: Option<String>,
    pub stars: Option<f64>,
    pub reviews_count: Option<i64>,
    pub thumbnail_image: Option<String>,
    pub bread_crumbs: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub price: Option<RawPrice>,
}

impl UpdateProductRequest {
    fn into_update(self, state: &AppState) -> ProductUpdate {
        let currency = state.config().apify.currency;
        ProductUpdate {
            title: non_blank(self.title),
            brand: non_blank(self.brand),
            stars: self.stars.and_then(stars_from_f64),
            reviews_count: self
                .reviews_count
                .and_then(|n| i32::try_from(n.max(0)).ok()),
            thumbnail_image: non_blank(self.thumbnail_image),
            bread_crumbs: non_blank(self.bread_crumbs),
            description: non_blank(self.description),
            url: non_blank(self.url),
            price: self.price.map(|raw| raw.normalize(currency)),
        }
    }
}

/// `GET /api/product`
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Value>> {
    let products = state
        .store()
        .list_products(&query.into_filter())
        .await
        .context("Failed to fetch products")?;

    Ok(Json(json!({ "success": true, "products": products })))
}

/// `POST /api/product`
pub async fn create(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<SaveProductsRequest>,
) -> Result<Json<Value>> {
    let items = match body.products {
        Some(Value::Array(items)) if !items.is_empty() => items,
        _ => return Err(AppError::BadRequest("No products provided".to_string())),
    };

    let inputs = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<ProductInput>(item) {
            Ok(input) => Some(input),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed product");
                None
            }
        })
        .collect();

    let saved =
        catalog::save_products(state.store(), inputs, state.config().apify.currency).await;

    Ok(Json(json!({ "success": true, "savedProducts": saved })))
}

/// `GET /api/product/{id}`
pub async fn show(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>> {
    let id: ProductId = parse_id(&id, PRODUCT_NOT_FOUND)?;

    let product = state
        .store()
        .get_product(id)
        .await
        .context("Failed to fetch product")?
        .ok_or_else(|| AppError::NotFound(PRODUCT_NOT_FOUND.to_string()))?;

    Ok(Json(json!({ "success": true, "product": product })))
}

/// `PUT /api/product/{id}`
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<UpdateProductRequest>,
) -> Result<Json<Value>> {
    let id: ProductId = parse_id(&id, PRODUCT_NOT_FOUND)?;
    let update = body.into_update(&state);
    if update.is_empty() {
        return Err(AppError::BadRequest("No update data provided".to_string()));
    }

    let product = state
        .store()
        .update_product(id, &update)
        .await
        .context("Failed to update product")?
        .ok_or_else(|| AppError::NotFound(PRODUCT_NOT_FOUND.to_string()))?;

    tracing::info!(product_id = %id, "Updated product");
    Ok(Json(json!({ "success": true, "product": product })))
}

/// `DELETE /api/product/{id}`
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>> {
    let id: ProductId = parse_id(&id, PRODUCT_NOT_FOUND)?;

    let deleted = state
        .store()
        .delete_product(id)
        .await
        .context("Failed to delete product")?;
    if !deleted {
        return Err(AppError::NotFound(PRODUCT_NOT_FOUND.to_string()));
    }

    tracing::info!(product_id = %id, "Deleted product");
    Ok(Json(json!({ "success": true, "message": "Product deleted successfully" })))
}
