//! OAuth sign-in route handlers.
//!
//! Handles the authorization-code flow for GitHub and Google:
//! - Login: stores a CSRF state in the session and redirects to the provider
//! - Callback: checks the state, exchanges the code, signs the user in
//!
//! Callback failures redirect to the sign-in page with `?error=<code>`.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use rand::Rng;
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::AppError;
use crate::middleware::set_current_user;
use crate::models::{CurrentUser, OAuthProvider, session_keys};
use crate::services::oauth::OAuthClient;
use crate::state::AppState;

/// Query parameters from the provider callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code to exchange for a token.
    pub code: Option<String>,
    /// State parameter for CSRF protection.
    pub state: Option<String>,
    /// Error code if authorization failed.
    pub error: Option<String>,
    /// Error description.
    pub error_description: Option<String>,
}

/// Generate a random alphanumeric string.
fn generate_random_string(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..length)
        .filter_map(|_| CHARSET.get(rng.random_range(0..CHARSET.len())))
        .map(|b| char::from(*b))
        .collect()
}

fn redirect_uri(state: &AppState, provider: OAuthProvider) -> String {
    format!(
        "{}/api/auth/oauth/{provider}/callback",
        state.config().base_url
    )
}

fn sign_in_error(state: &AppState, code: &str) -> Response {
    Redirect::to(&format!("{}/sign-in?error={code}", state.config().base_url)).into_response()
}

/// Look up a configured provider. Unknown and unconfigured providers are 404.
fn client_for(state: &AppState, provider: &str) -> Result<OAuthClient, AppError> {
    provider
        .parse::<OAuthProvider>()
        .ok()
        .and_then(|p| state.oauth().get(p).cloned())
        .ok_or_else(|| AppError::NotFound("Unknown sign-in provider".to_string()))
}

/// Start sign-in with a provider.
///
/// # Route
///
/// `GET /api/auth/oauth/{provider}/login`
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Path(provider): Path<String>,
) -> Response {
    let client = match client_for(&state, &provider) {
        Ok(client) => client,
        Err(e) => return e.into_response(),
    };
    let provider = client.provider();

    let oauth_state = generate_random_string(32);
    if let Err(e) = session
        .insert(session_keys::OAUTH_STATE, format!("{provider}:{oauth_state}"))
        .await
    {
        tracing::error!("Failed to store OAuth state in session: {}", e);
        return sign_in_error(&state, "session");
    }

    let auth_url = client.authorization_url(&redirect_uri(&state, provider), &oauth_state);
    Redirect::to(&auth_url).into_response()
}

/// Handle the provider callback.
///
/// # Route
///
/// `GET /api/auth/oauth/{provider}/callback`
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let client = match client_for(&state, &provider) {
        Ok(client) => client,
        Err(e) => return e.into_response(),
    };
    let provider = client.provider();

    if let Some(error) = query.error {
        let description = query.error_description.unwrap_or_default();
        tracing::warn!(%provider, "OAuth error: {} - {}", error, description);
        return sign_in_error(&state, "access_denied");
    }

    let Some(code) = query.code else {
        tracing::warn!(%provider, "OAuth callback missing code");
        return sign_in_error(&state, "missing_code");
    };

    let Some(returned_state) = query.state else {
        tracing::warn!(%provider, "OAuth callback missing state");
        return sign_in_error(&state, "missing_state");
    };

    // One-time use: removed whether or not it matches
    let stored_state: Option<String> = session
        .remove(session_keys::OAUTH_STATE)
        .await
        .ok()
        .flatten();

    if stored_state.as_deref() != Some(format!("{provider}:{returned_state}").as_str()) {
        tracing::warn!(%provider, "OAuth state mismatch");
        return sign_in_error(&state, "invalid_state");
    }

    let redirect_uri = redirect_uri(&state, provider);
    let profile = match client.exchange_code(&code, &redirect_uri).await {
        Ok(token) => client.fetch_profile(&token).await,
        Err(e) => Err(e),
    };
    let profile = match profile {
        Ok(profile) => profile,
        Err(e) => {
            tracing::error!(%provider, "OAuth sign-in failed: {}", e);
            return sign_in_error(&state, e.code());
        }
    };

    let user = match state.store().find_or_create_oauth_user(&profile).await {
        Ok(user) => user,
        Err(e) => {
            tracing::error!(%provider, "Failed to resolve OAuth user: {}", e);
            return sign_in_error(&state, "account");
        }
    };

    if let Err(e) = set_current_user(&session, &CurrentUser::from(&user)).await {
        tracing::error!("Failed to set session: {}", e);
        return sign_in_error(&state, "session");
    }

    tracing::info!(%provider, user_id = %user.id, "User signed in with OAuth");
    Redirect::to(&format!("{}/home", state.config().base_url)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_random_string() {
        let s = generate_random_string(32);
        assert_eq!(s.len(), 32);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(s, generate_random_string(32));
    }
}
