//! Authentication service.
//!
//! Credential sign-in with argon2 password hashes. OAuth sign-in lives in
//! [`crate::services::oauth`] and only meets this module at the store.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use prizey_core::Email;

use crate::db::{RepositoryError, Store};
use crate::models::{NewUser, User};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Authentication service.
pub struct AuthService<'a> {
    store: &'a dyn Store,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Register a new user with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<String>,
    ) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;
        self.create(email, password, name).await
    }

    /// Sign in with email and password.
    ///
    /// An unknown email is registered on the spot with the given password,
    /// so the first sign-in doubles as sign-up.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the password is wrong or the
    /// account has no password (OAuth-only).
    /// Returns `AuthError::WeakPassword` when auto-registering with a short password.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email)?;

        match self.store.get_password_hash(&email).await? {
            Some((user, Some(hash))) => {
                verify_password(password, &hash)?;
                Ok(user)
            }
            Some((_, None)) => Err(AuthError::InvalidCredentials),
            None => {
                validate_password(password)?;
                tracing::info!(email = %email, "Registering user on first sign-in");
                self.create(email, password, None).await
            }
        }
    }

    async fn create(
        &self,
        email: Email,
        password: &str,
        name: Option<String>,
    ) -> Result<User, AuthError> {
        let password_hash = hash_password(password)?;

        self.store
            .create_user(&NewUser {
                email,
                name: name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
                password_hash: Some(password_hash),
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }
}

/// Validate password meets minimum requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if the password is too short.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a stored PHC hash.
///
/// # Errors
///
/// Returns `AuthError::InvalidCredentials` on mismatch or an unparseable hash.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_validate_password_length() {
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(validate_password("longenough").is_ok());
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let store = MemoryStore::new();
        let auth = AuthService::new(&store);

        let user = auth
            .register("Shopper@Example.com", "password123", Some("Shopper".into()))
            .await
            .unwrap();
        assert_eq!(user.email.as_str(), "shopper@example.com");

        let again = auth
            .register("shopper@example.com", "password123", None)
            .await
            .unwrap_err();
        assert!(matches!(again, AuthError::UserAlreadyExists));

        let signed_in = auth.login("shopper@example.com", "password123").await.unwrap();
        assert_eq!(signed_in.id, user.id);

        let wrong = auth.login("shopper@example.com", "password124").await.unwrap_err();
        assert!(matches!(wrong, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_login_registers_unknown_email() {
        let store = MemoryStore::new();
        let auth = AuthService::new(&store);

        let created = auth.login("new@example.com", "password123").await.unwrap();
        let existing = store
            .get_user_by_email(&Email::parse("new@example.com").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(created.id, existing.id);

        assert!(matches!(
            auth.login("other@example.com", "short").await,
            Err(AuthError::WeakPassword(_))
        ));
        assert!(matches!(
            auth.login("not-an-email", "password123").await,
            Err(AuthError::InvalidEmail(_))
        ));
    }
}
