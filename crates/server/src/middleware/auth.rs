//! Session user extractor and sign-in helpers.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::error::{clear_sentry_user, set_sentry_user};
use crate::models::{CurrentUser, session_keys};

/// Extractor that optionally gets the current user.
///
/// Never rejects; a missing session layer or an unreadable session counts as
/// signed out.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = match parts.extensions.get::<Session>() {
            Some(session) => session
                .get::<CurrentUser>(session_keys::CURRENT_USER)
                .await
                .ok()
                .flatten(),
            None => None,
        };

        Ok(Self(user))
    }
}

/// Sign a user in: rotate the session id, store the user and tag Sentry.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(())
}

/// Sign the user out and drop all session data.
///
/// # Errors
///
/// Returns an error if the session cannot be flushed.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await?;
    clear_sentry_user();
    Ok(())
}
