//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use prizey_core::{Email, UserId};

use super::User;

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the signed-in user. Also the
/// shape returned by `GET /api/auth/session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Display name, if known.
    pub name: Option<String>,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current signed-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the OAuth CSRF state, stored as `"<provider>:<state>"`.
    pub const OAUTH_STATE: &str = "oauth_state";
}
