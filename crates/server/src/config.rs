//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `PRIZEY_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `PRIZEY_BASE_URL` - Public URL of the dashboard (OAuth redirects land here)
//! - `PRIZEY_SESSION_SECRET` - Session secret (min 32 chars, high entropy)
//! - `APIFY_TOKEN` - Apify API token used to run the marketplace crawler
//!
//! ## Optional
//! - `PRIZEY_HOST` - Bind address (default: 127.0.0.1)
//! - `PRIZEY_PORT` - Listen port (default: 3000)
//! - `APIFY_BASE_URL` - Apify API root (default: <https://api.apify.com/v2>)
//! - `APIFY_ACTOR` - Crawler actor id (default: `junglee~amazon-crawler`)
//! - `APIFY_MARKETPLACE_URL` - Marketplace searched (default: <https://www.amazon.in>)
//! - `APIFY_PROXY_COUNTRY` - Proxy country passed to the actor (default: IN)
//! - `APIFY_SOURCE_LABEL` - Label stored in scrape metadata (default: Amazon India)
//! - `APIFY_CURRENCY` - Currency assumed for scraped prices (default: INR)
//! - `APIFY_WAIT_SECS` - How long to wait for an actor run (default: 300)
//! - `GITHUB_CLIENT_ID` / `GITHUB_CLIENT_SECRET` - GitHub sign-in
//! - `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET` - Google sign-in
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` / `SENTRY_TRACES_SAMPLE_RATE` - Sentry sampling (default: 1.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use prizey_core::CurrencyCode;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL, without a trailing slash
    pub base_url: String,
    /// Session secret
    pub session_secret: SecretString,
    /// Marketplace crawler configuration
    pub apify: ApifyConfig,
    /// OAuth sign-in providers
    pub oauth: OAuthConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g. "production")
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Apify crawler configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct ApifyConfig {
    /// API token
    pub token: SecretString,
    /// API root, e.g. `https://api.apify.com/v2`
    pub base_url: String,
    /// Actor id in `user~name` form
    pub actor: String,
    /// Marketplace origin searched by the actor
    pub marketplace_url: String,
    /// Proxy country passed to the actor
    pub proxy_country: String,
    /// Label recorded in scrape metadata
    pub source_label: String,
    /// Currency assumed for scraped prices
    pub currency: CurrencyCode,
    /// Upper bound on waiting for a run to finish
    pub wait: Duration,
}

impl std::fmt::Debug for ApifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApifyConfig")
            .field("token", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("actor", &self.actor)
            .field("marketplace_url", &self.marketplace_url)
            .field("proxy_country", &self.proxy_country)
            .field("source_label", &self.source_label)
            .field("currency", &self.currency)
            .field("wait", &self.wait)
            .finish()
    }
}

/// OAuth providers. A provider is enabled when both its id and secret are set.
#[derive(Debug, Clone, Default)]
pub struct OAuthConfig {
    pub github: Option<OAuthCredentials>,
    pub google: Option<OAuthCredentials>,
}

/// OAuth client credentials.
///
/// Implements `Debug` manually to redact the secret.
#[derive(Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl std::fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("PRIZEY_DATABASE_URL")?;
        let host = get_env_or_default("PRIZEY_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("PRIZEY_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("PRIZEY_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("PRIZEY_PORT".to_string(), e.to_string()))?;
        let base_url = get_url("PRIZEY_BASE_URL")?;
        let session_secret = get_validated_secret("PRIZEY_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "PRIZEY_SESSION_SECRET")?;

        let apify = ApifyConfig::from_env()?;
        let oauth = OAuthConfig::from_env();
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            apify,
            oauth,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl ApifyConfig {
    /// Load the crawler settings from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `APIFY_TOKEN` is missing or an optional value
    /// does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let currency = get_env_or_default("APIFY_CURRENCY", "INR")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("APIFY_CURRENCY".to_string(), e.to_string()))?;
        let wait_secs = get_env_or_default("APIFY_WAIT_SECS", "300")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("APIFY_WAIT_SECS".to_string(), e.to_string())
            })?;

        Ok(Self {
            token: get_required_secret("APIFY_TOKEN")?,
            base_url: get_env_or_default("APIFY_BASE_URL", "https://api.apify.com/v2")
                .trim_end_matches('/')
                .to_string(),
            actor: get_env_or_default("APIFY_ACTOR", "junglee~amazon-crawler"),
            marketplace_url: get_env_or_default("APIFY_MARKETPLACE_URL", "https://www.amazon.in")
                .trim_end_matches('/')
                .to_string(),
            proxy_country: get_env_or_default("APIFY_PROXY_COUNTRY", "IN"),
            source_label: get_env_or_default("APIFY_SOURCE_LABEL", "Amazon India"),
            currency,
            wait: Duration::from_secs(wait_secs),
        })
    }
}

impl OAuthConfig {
    fn from_env() -> Self {
        Self {
            github: OAuthCredentials::from_env("GITHUB_CLIENT_ID", "GITHUB_CLIENT_SECRET"),
            google: OAuthCredentials::from_env("GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET"),
        }
    }
}

impl OAuthCredentials {
    fn from_env(id_key: &str, secret_key: &str) -> Option<Self> {
        let client_id = get_optional_env(id_key)?;
        let client_secret = get_optional_env(secret_key)?;
        Some(Self {
            client_id,
            client_secret: SecretString::from(client_secret),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get a required absolute http(s) URL, stripped of any trailing slash.
fn get_url(key: &str) -> Result<String, ConfigError> {
    let value = get_required_env(key)?;
    let parsed = url::Url::parse(&value)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", parsed.scheme()),
        ));
    }
    Ok(value.trim_end_matches('/').to_string())
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional, non-empty environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn apify_config() -> ApifyConfig {
        ApifyConfig {
            token: SecretString::from("apify_api_0123456789abcdef"),
            base_url: "https://api.apify.com/v2".to_string(),
            actor: "junglee~amazon-crawler".to_string(),
            marketplace_url: "https://www.amazon.in".to_string(),
            proxy_country: "IN".to_string(),
            source_label: "Amazon India".to_string(),
            currency: CurrencyCode::INR,
            wait: Duration::from_secs(300),
        }
    }

    #[test]
    fn test_shannon_entropy_bounds() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > 3.3);
    }

    #[test]
    fn test_validate_secret_strength_rejects_placeholders() {
        let err = validate_secret_strength("your-session-key-here", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
        assert!(validate_secret_strength("changeme123", "TEST_VAR").is_err());
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let err =
            validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_validate_session_secret_length() {
        assert!(validate_session_secret(&SecretString::from("short"), "TEST").is_err());
        assert!(validate_session_secret(&SecretString::from("a".repeat(32)), "TEST").is_ok());
    }

    #[test]
    fn test_socket_addr_and_secure_flag() {
        let config = ServerConfig {
            database_url: SecretString::from("postgres://localhost/prizey"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "https://prizey.app".to_string(),
            session_secret: SecretString::from("x".repeat(32)),
            apify: apify_config(),
            oauth: OAuthConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 1.0,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
        assert!(config.is_secure());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let apify = format!("{:?}", apify_config());
        assert!(apify.contains("junglee~amazon-crawler"));
        assert!(apify.contains("[REDACTED]"));
        assert!(!apify.contains("apify_api_0123456789abcdef"));

        let creds = OAuthCredentials {
            client_id: "gh_client_id".to_string(),
            client_secret: SecretString::from("gh_super_private_value"),
        };
        let debug_output = format!("{creds:?}");
        assert!(debug_output.contains("gh_client_id"));
        assert!(!debug_output.contains("gh_super_private_value"));
    }
}
