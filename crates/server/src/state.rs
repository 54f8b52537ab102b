//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::db::{PgStore, Store};
use crate::services::apify::{ApifyClient, ProductSource, ScrapeError};
use crate::services::oauth::OAuthClients;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// store, the product source and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    store: Arc<dyn Store>,
    source: Arc<dyn ProductSource>,
    oauth: OAuthClients,
}

impl AppState {
    /// Create the production state: Postgres store, Apify client and the
    /// configured OAuth providers.
    ///
    /// # Errors
    ///
    /// Returns an error if the Apify client cannot be built.
    pub fn new(config: ServerConfig, pool: PgPool) -> Result<Self, ScrapeError> {
        let source = ApifyClient::new(&config.apify)?;
        let oauth = OAuthClients::from_config(&config.oauth);

        Ok(Self::from_parts(
            config,
            Arc::new(PgStore::new(pool)),
            Arc::new(source),
            oauth,
        ))
    }

    /// Assemble state from explicit parts.
    #[must_use]
    pub fn from_parts(
        config: ServerConfig,
        store: Arc<dyn Store>,
        source: Arc<dyn ProductSource>,
        oauth: OAuthClients,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                source,
                oauth,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    /// Get a reference to the product search source.
    #[must_use]
    pub fn source(&self) -> &dyn ProductSource {
        self.inner.source.as_ref()
    }

    /// Get the OAuth clients.
    #[must_use]
    pub fn oauth(&self) -> &OAuthClients {
        &self.inner.oauth
    }
}
