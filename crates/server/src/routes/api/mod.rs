//! JSON API handlers.

pub mod auth;
pub mod lists;
pub mod oauth;
pub mod products;
pub mod scrape;

use std::str::FromStr;

use axum::extract::FromRequest;

use crate::error::AppError;

/// `axum::Json` whose rejection renders as an API error.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Parse a path id, answering 404 with `not_found` when it is not a number.
fn parse_id<T: FromStr>(raw: &str, not_found: &str) -> Result<T, AppError> {
    raw.parse()
        .map_err(|_| AppError::NotFound(not_found.to_string()))
}
