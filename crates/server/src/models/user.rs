//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use prizey_core::{Email, UserId};

/// A registered user.
///
/// Credential users carry a password hash in the database; it never leaves
/// the repository except through `Store::get_password_hash`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Owner summary embedded in list detail responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: UserId,
    pub email: Email,
    pub name: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Email,
    pub name: Option<String>,
    /// Argon2 PHC string; `None` for OAuth-only users.
    pub password_hash: Option<String>,
}

/// Identity providers supported for sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OAuthProvider {
    GitHub,
    Google,
}

impl OAuthProvider {
    /// Lower-case identifier used in URLs and the `account` table.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GitHub => "github",
            Self::Google => "google",
        }
    }
}

impl std::fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OAuthProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github" => Ok(Self::GitHub),
            "google" => Ok(Self::Google),
            _ => Err(()),
        }
    }
}

/// Identity returned by a provider after a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthProfile {
    pub provider: OAuthProvider,
    /// The provider's stable user id (GitHub numeric id, Google `sub`).
    pub provider_account_id: String,
    pub email: Email,
    pub name: Option<String>,
}
