//! Integration tests for Prizey.
//!
//! Each test spawns the full router on an ephemeral port, backed by the
//! in-memory store, an in-memory session store, a scripted product source and
//! a wiremock GitHub. Requests go through `reqwest` with a cookie jar, so the
//! session cookie behaves as it does in a browser.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p prizey-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `api_auth` - Credential sign-in, sessions, OAuth
//! - `api_lists` - Lists and ownership
//! - `api_products` - Catalog, upsert, manual updates
//! - `api_scrape` - Marketplace search
//! - `pg_store` - `PgStore` against PostgreSQL (ignored by default; run with
//!   `--ignored` and `DATABASE_URL` set)

#![allow(clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, redirect::Policy};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use wiremock::MockServer;

use prizey_core::{CurrencyCode, Email};
use prizey_server::config::{ApifyConfig, OAuthConfig, OAuthCredentials, ServerConfig};
use prizey_server::db::{MemoryStore, Store};
use prizey_server::middleware::session_layer;
use prizey_server::models::{NewUser, OAuthProvider, User};
use prizey_server::services::apify::{ProductSource, ScrapeError};
use prizey_server::services::oauth::{OAuthClient, OAuthClients, ProviderEndpoints};
use prizey_server::state::AppState;

/// A product source that replays scripted results.
#[derive(Default)]
pub struct FakeSource {
    /// `None` makes the next search fail.
    items: Mutex<Option<Vec<Value>>>,
    searches: Mutex<Vec<String>>,
}

impl FakeSource {
    /// Results for every following search.
    pub fn respond_with(&self, items: Vec<Value>) {
        *self.items.lock() = Some(items);
    }

    /// Make every following search fail.
    pub fn fail(&self) {
        *self.items.lock() = None;
    }

    /// Search URLs requested so far.
    pub fn searches(&self) -> Vec<String> {
        self.searches.lock().clone()
    }
}

#[async_trait]
impl ProductSource for FakeSource {
    async fn search(&self, search_url: &str) -> Result<Vec<Value>, ScrapeError> {
        self.searches.lock().push(search_url.to_string());
        self.items
            .lock()
            .clone()
            .ok_or_else(|| ScrapeError::Timeout("run-test".to_string()))
    }
}

/// A running server plus handles on its dependencies.
pub struct TestApp {
    pub base_url: String,
    /// Client with its own cookie jar; redirects are not followed.
    pub client: Client,
    pub store: Arc<MemoryStore>,
    pub source: Arc<FakeSource>,
    /// Stands in for GitHub's OAuth and API endpoints.
    pub github: MockServer,
}

impl TestApp {
    /// Spawn a server on an ephemeral port.
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local address");
        let base_url = format!("http://{addr}");

        let github = MockServer::start().await;
        let config = test_config(&base_url, addr.port());

        let credentials = OAuthCredentials {
            client_id: "test-client".to_string(),
            client_secret: SecretString::from("test-secret"),
        };
        let oauth = OAuthClients {
            github: Some(OAuthClient::with_endpoints(
                OAuthProvider::GitHub,
                &credentials,
                ProviderEndpoints {
                    authorize_url: format!("{}/login/oauth/authorize", github.uri()),
                    token_url: format!("{}/login/oauth/access_token", github.uri()),
                    profile_url: format!("{}/user", github.uri()),
                },
            )),
            google: None,
        };

        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(FakeSource::default());
        source.respond_with(Vec::new());

        let state = AppState::from_parts(config.clone(), store.clone(), source.clone(), oauth);
        let app = prizey_server::app(
            state,
            session_layer(tower_sessions::MemoryStore::default(), &config),
        );

        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            client: new_client(),
            base_url,
            store,
            source,
            github,
        }
    }

    /// Absolute URL for `path`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// A second browser: fresh cookie jar.
    pub fn new_client(&self) -> Client {
        new_client()
    }

    /// Insert a user straight into the store.
    pub async fn seed_user(&self, email: &str, name: &str) -> User {
        self.store
            .create_user(&NewUser {
                email: Email::parse(email).expect("valid email"),
                name: Some(name.to_string()),
                password_hash: None,
            })
            .await
            .expect("Failed to seed user")
    }

    /// Save products through `POST /api/product`, returning the saved JSON.
    pub async fn seed_products(&self, products: Value) -> Vec<Value> {
        let body: Value = self
            .client
            .post(self.url("/api/product"))
            .json(&json!({ "products": products }))
            .send()
            .await
            .expect("Failed to seed products")
            .json()
            .await
            .expect("Invalid seed response");

        body["savedProducts"]
            .as_array()
            .cloned()
            .expect("savedProducts array")
    }

    /// Register and sign in `client`.
    pub async fn sign_up(&self, client: &Client, email: &str, password: &str) -> Value {
        let response = client
            .post(self.url("/api/auth/register"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to register");
        assert_eq!(response.status(), 201, "registration failed");
        response.json().await.expect("Invalid register response")
    }
}

fn new_client() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

fn test_config(base_url: &str, port: u16) -> ServerConfig {
    ServerConfig {
        database_url: SecretString::from("postgres://unused"),
        host: [127, 0, 0, 1].into(),
        port,
        base_url: base_url.to_string(),
        session_secret: SecretString::from("x".repeat(32)),
        apify: ApifyConfig {
            token: SecretString::from("apify_api_test"),
            base_url: "http://localhost:0".to_string(),
            actor: "junglee~amazon-crawler".to_string(),
            marketplace_url: "https://www.amazon.in".to_string(),
            proxy_country: "IN".to_string(),
            source_label: "Amazon India".to_string(),
            currency: CurrencyCode::INR,
            wait: Duration::from_secs(1),
        },
        oauth: OAuthConfig::default(),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 0.0,
        sentry_traces_sample_rate: 0.0,
    }
}
