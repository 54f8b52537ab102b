//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                           - Liveness
//! GET  /health/ready                     - Readiness (store ping)
//!
//! # Lists
//! GET    /api/list?email=                - A user's lists with products
//! POST   /api/list                       - Create a list
//! GET    /api/list/{id}                  - List share page data
//! PUT    /api/list/{id}                  - Update name/description/products
//! DELETE /api/list/{id}                  - Delete a list
//! POST   /api/list/{id}                  - Append products
//!
//! # Products
//! GET    /api/product                    - Catalog with price history
//! POST   /api/product                    - Batch upsert by ASIN
//! GET    /api/product/{id}               - One product with price history
//! PUT    /api/product/{id}               - Manual update
//! DELETE /api/product/{id}               - Delete product and history
//!
//! # Search
//! POST   /api/scrape                     - Marketplace search via Apify
//!
//! # Auth
//! POST /api/auth/register                - Create account and sign in
//! POST /api/auth/login                   - Credential sign-in
//! POST /api/auth/logout                  - Sign out
//! GET  /api/auth/session                 - Current user or null
//! GET  /api/auth/oauth/{provider}/login    - Redirect to provider
//! GET  /api/auth/oauth/{provider}/callback - Provider callback
//! ```

pub mod api;
pub mod health;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the list routes router.
pub fn list_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(api::lists::index).post(api::lists::create))
        .route(
            "/{id}",
            get(api::lists::show)
                .put(api::lists::update)
                .delete(api::lists::delete)
                .post(api::lists::append),
        )
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(api::products::index).post(api::products::create))
        .route(
            "/{id}",
            get(api::products::show)
                .put(api::products::update)
                .delete(api::products::delete),
        )
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(api::auth::register))
        .route("/login", post(api::auth::login))
        .route("/logout", post(api::auth::logout))
        .route("/session", get(api::auth::session))
        // Third-party sign-in
        .route("/oauth/{provider}/login", get(api::oauth::login))
        .route("/oauth/{provider}/callback", get(api::oauth::callback))
}

/// Create all routes for the server.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api/list", list_routes())
        .nest("/api/product", product_routes())
        .route("/api/scrape", post(api::scrape::search))
        .nest("/api/auth", auth_routes())
}
