//! OAuth sign-in with GitHub and Google.
//!
//! Authorization-code flow only. The CSRF state lives in the session (see
//! `routes::api::oauth`); this module builds the authorization URL, exchanges
//! the code and fetches the profile used to find or create the user.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use prizey_core::{Email, EmailError};

use crate::config::{OAuthConfig, OAuthCredentials};
use crate::models::{OAuthProfile, OAuthProvider};

/// GitHub rejects API calls without a user agent.
const USER_AGENT: &str = concat!("prizey/", env!("CARGO_PKG_VERSION"));

/// Errors that can occur during an OAuth exchange.
#[derive(Debug, Error)]
pub enum OAuthError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The token endpoint refused the code.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// The profile endpoint failed.
    #[error("profile request failed: {0}")]
    Profile(String),

    /// The provider did not return a usable email address.
    #[error("no verified email address on the account")]
    MissingEmail,

    /// The provider returned a malformed email address.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),
}

impl OAuthError {
    /// Short code passed to the sign-in page as `?error=`.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Http(_) | Self::TokenExchange(_) => "token_exchange",
            Self::Profile(_) => "profile",
            Self::MissingEmail | Self::InvalidEmail(_) => "email",
        }
    }
}

/// Provider URLs. Overridable so tests can point at a mock server.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub authorize_url: String,
    pub token_url: String,
    /// Profile endpoint (`/user` on GitHub, `userinfo` on Google).
    pub profile_url: String,
}

impl ProviderEndpoints {
    #[must_use]
    pub fn for_provider(provider: OAuthProvider) -> Self {
        match provider {
            OAuthProvider::GitHub => Self {
                authorize_url: "https://github.com/login/oauth/authorize".to_string(),
                token_url: "https://github.com/login/oauth/access_token".to_string(),
                profile_url: "https://api.github.com/user".to_string(),
            },
            OAuthProvider::Google => Self {
                authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
                token_url: "https://oauth2.googleapis.com/token".to_string(),
                profile_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
            },
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct GitHubUser {
    id: i64,
    login: String,
    name: Option<String>,
    email: Option<String>,
}

#[derive(Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

#[derive(Deserialize)]
struct GoogleUser {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
}

/// OAuth client for one provider.
#[derive(Clone)]
pub struct OAuthClient {
    inner: Arc<OAuthClientInner>,
}

struct OAuthClientInner {
    client: reqwest::Client,
    provider: OAuthProvider,
    client_id: String,
    client_secret: SecretString,
    endpoints: ProviderEndpoints,
}

impl OAuthClient {
    /// Create a client against the provider's public endpoints.
    #[must_use]
    pub fn new(provider: OAuthProvider, credentials: &OAuthCredentials) -> Self {
        Self::with_endpoints(
            provider,
            credentials,
            ProviderEndpoints::for_provider(provider),
        )
    }

    #[must_use]
    pub fn with_endpoints(
        provider: OAuthProvider,
        credentials: &OAuthCredentials,
        endpoints: ProviderEndpoints,
    ) -> Self {
        Self {
            inner: Arc::new(OAuthClientInner {
                client: reqwest::Client::new(),
                provider,
                client_id: credentials.client_id.clone(),
                client_secret: credentials.client_secret.clone(),
                endpoints,
            }),
        }
    }

    #[must_use]
    pub fn provider(&self) -> OAuthProvider {
        self.inner.provider
    }

    /// Build the URL to redirect the browser to.
    ///
    /// `state` must be stored in the session and checked on callback.
    #[must_use]
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> String {
        let scope = match self.inner.provider {
            OAuthProvider::GitHub => "read:user user:email",
            OAuthProvider::Google => "openid email profile",
        };

        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            self.inner.endpoints.authorize_url,
            urlencoding::encode(&self.inner.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(scope),
            urlencoding::encode(state)
        )
    }

    /// Exchange an authorization code for an access token.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::TokenExchange` if the provider rejects the code.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String, OAuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.inner.client_id.as_str()),
            ("client_secret", self.inner.client_secret.expose_secret()),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ];

        let response = self
            .inner
            .client
            .post(&self.inner.endpoints.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(OAuthError::TokenExchange(text));
        }

        // GitHub reports a bad code as 200 with an `error` field.
        let token: TokenResponse = response.json().await?;
        match (token.access_token, token.error) {
            (Some(access_token), None) => Ok(access_token),
            (_, error) => Err(OAuthError::TokenExchange(
                token
                    .error_description
                    .or(error)
                    .unwrap_or_else(|| "no access token in response".to_string()),
            )),
        }
    }

    /// Fetch the signed-in account's profile.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::MissingEmail` if no verified email is available.
    pub async fn fetch_profile(&self, access_token: &str) -> Result<OAuthProfile, OAuthError> {
        match self.inner.provider {
            OAuthProvider::GitHub => self.github_profile(access_token).await,
            OAuthProvider::Google => self.google_profile(access_token).await,
        }
    }

    async fn github_profile(&self, access_token: &str) -> Result<OAuthProfile, OAuthError> {
        let user: GitHubUser = self.get_json(&self.inner.endpoints.profile_url, access_token).await?;

        let email = match user.email.filter(|e| !e.trim().is_empty()) {
            Some(email) => email,
            None => {
                let url = format!("{}/emails", self.inner.endpoints.profile_url);
                let emails: Vec<GitHubEmail> = self.get_json(&url, access_token).await?;
                emails
                    .into_iter()
                    .find(|e| e.primary && e.verified)
                    .map(|e| e.email)
                    .ok_or(OAuthError::MissingEmail)?
            }
        };

        Ok(OAuthProfile {
            provider: OAuthProvider::GitHub,
            provider_account_id: user.id.to_string(),
            email: Email::parse(&email)?,
            name: user.name.or(Some(user.login)),
        })
    }

    async fn google_profile(&self, access_token: &str) -> Result<OAuthProfile, OAuthError> {
        let user: GoogleUser = self.get_json(&self.inner.endpoints.profile_url, access_token).await?;

        let email = user
            .email
            .filter(|_| user.email_verified)
            .ok_or(OAuthError::MissingEmail)?;

        Ok(OAuthProfile {
            provider: OAuthProvider::Google,
            provider_account_id: user.sub,
            email: Email::parse(&email)?,
            name: user.name,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, OAuthError> {
        let response = self
            .inner
            .client
            .get(url)
            .bearer_auth(access_token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(OAuthError::Profile(format!("{status}: {text}")));
        }

        Ok(response.json().await?)
    }
}

/// The configured providers.
#[derive(Clone, Default)]
pub struct OAuthClients {
    pub github: Option<OAuthClient>,
    pub google: Option<OAuthClient>,
}

impl OAuthClients {
    /// Build a client for every provider with credentials.
    #[must_use]
    pub fn from_config(config: &OAuthConfig) -> Self {
        Self {
            github: config
                .github
                .as_ref()
                .map(|c| OAuthClient::new(OAuthProvider::GitHub, c)),
            google: config
                .google
                .as_ref()
                .map(|c| OAuthClient::new(OAuthProvider::Google, c)),
        }
    }

    #[must_use]
    pub const fn get(&self, provider: OAuthProvider) -> Option<&OAuthClient> {
        match provider {
            OAuthProvider::GitHub => self.github.as_ref(),
            OAuthProvider::Google => self.google.as_ref(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn credentials() -> OAuthCredentials {
        OAuthCredentials {
            client_id: "client-123".to_string(),
            client_secret: SecretString::from("shhh"),
        }
    }

    fn client(provider: OAuthProvider, server: &MockServer) -> OAuthClient {
        OAuthClient::with_endpoints(
            provider,
            &credentials(),
            ProviderEndpoints {
                authorize_url: format!("{}/authorize", server.uri()),
                token_url: format!("{}/token", server.uri()),
                profile_url: format!("{}/user", server.uri()),
            },
        )
    }

    #[test]
    fn test_authorization_url() {
        let client = OAuthClient::new(OAuthProvider::GitHub, &credentials());
        let url = client.authorization_url("http://localhost:3000/api/auth/oauth/github/callback", "abc");

        assert!(url.starts_with("https://github.com/login/oauth/authorize?client_id=client-123"));
        assert!(url.contains(
            "redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fapi%2Fauth%2Foauth%2Fgithub%2Fcallback"
        ));
        assert!(url.contains("scope=read%3Auser%20user%3Aemail"));
        assert!(url.ends_with("state=abc"));
    }

    #[tokio::test]
    async fn test_exchange_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("code=the-code"))
            .and(body_string_contains("client_secret=shhh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "gho_token",
                "token_type": "bearer"
            })))
            .mount(&server)
            .await;

        let token = client(OAuthProvider::GitHub, &server)
            .exchange_code("the-code", "http://localhost/cb")
            .await
            .unwrap();
        assert_eq!(token, "gho_token");
    }

    #[tokio::test]
    async fn test_exchange_code_error_in_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": "bad_verification_code",
                "error_description": "The code passed is incorrect or expired."
            })))
            .mount(&server)
            .await;

        let err = client(OAuthProvider::GitHub, &server)
            .exchange_code("stale", "http://localhost/cb")
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::TokenExchange(ref m) if m.contains("expired")));
        assert_eq!(err.code(), "token_exchange");
    }

    #[tokio::test]
    async fn test_github_profile_falls_back_to_primary_email() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("authorization", "Bearer gho_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 583_231,
                "login": "octocat",
                "name": null,
                "email": null
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user/emails"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"email": "old@example.com", "primary": false, "verified": true},
                {"email": "Octo@Example.com", "primary": true, "verified": true}
            ])))
            .mount(&server)
            .await;

        let profile = client(OAuthProvider::GitHub, &server)
            .fetch_profile("gho_token")
            .await
            .unwrap();
        assert_eq!(profile.provider_account_id, "583231");
        assert_eq!(profile.email.as_str(), "octo@example.com");
        assert_eq!(profile.name.as_deref(), Some("octocat"));
    }

    #[tokio::test]
    async fn test_google_profile_requires_verified_email() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sub": "1098",
                "email": "someone@example.com",
                "email_verified": false,
                "name": "Someone"
            })))
            .mount(&server)
            .await;

        let err = client(OAuthProvider::Google, &server)
            .fetch_profile("ya29")
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::MissingEmail));
    }

    #[test]
    fn test_clients_from_config() {
        let clients = OAuthClients::from_config(&OAuthConfig {
            github: Some(credentials()),
            google: None,
        });
        assert!(clients.get(OAuthProvider::GitHub).is_some());
        assert!(clients.get(OAuthProvider::Google).is_none());
    }
}
