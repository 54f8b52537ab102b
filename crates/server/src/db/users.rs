//! User repository for database operations.
//!
//! Covers credential users and OAuth account links.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use prizey_core::{Email, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::{NewUser, OAuthProfile, User};

/// Raw `prizey.user` row.
#[derive(sqlx::FromRow)]
struct UserRow {
    id: i32,
    email: String,
    name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            email,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserWithHashRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: Option<String>,
}

const USER_COLUMNS: &str = "id, email, name, created_at, updated_at";

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the email in the database is invalid.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM prizey.user WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM prizey.user WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user together with their password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, Option<String>)>, RepositoryError> {
        let row = sqlx::query_as::<_, UserWithHashRow>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM prizey.user WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| Ok((User::try_from(r.user)?, r.password_hash)))
            .transpose()
    }

    /// Create a new user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            INSERT INTO prizey.user (email, name, password_hash)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(user.email.as_str())
        .bind(user.name.as_deref())
        .bind(user.password_hash.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("email already exists"))?;

        User::try_from(row)
    }

    /// Resolve an OAuth identity to a user.
    ///
    /// Looks up the provider link first, then an existing user with the same
    /// email (linking the account to it), and otherwise creates the user. A
    /// missing display name is filled from the profile.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn find_or_create_oauth(
        &self,
        profile: &OAuthProfile,
    ) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let linked = sqlx::query_as::<_, UserRow>(
            r"
            SELECT u.id, u.email, u.name, u.created_at, u.updated_at
            FROM prizey.account a
            JOIN prizey.user u ON u.id = a.user_id
            WHERE a.provider = $1 AND a.provider_account_id = $2
            ",
        )
        .bind(profile.provider.as_str())
        .bind(&profile.provider_account_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = linked {
            tx.commit().await?;
            return User::try_from(row);
        }

        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            INSERT INTO prizey.user (email, name)
            VALUES ($1, $2)
            ON CONFLICT (email) DO UPDATE
                SET name = COALESCE(prizey.user.name, EXCLUDED.name),
                    updated_at = now()
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(profile.email.as_str())
        .bind(profile.name.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r"
            INSERT INTO prizey.account (user_id, provider, provider_account_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (provider, provider_account_id) DO NOTHING
            ",
        )
        .bind(row.id)
        .bind(profile.provider.as_str())
        .bind(&profile.provider_account_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        User::try_from(row)
    }
}
