//! List repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use prizey_core::{ListId, ProductId, UserId};

use super::RepositoryError;
use crate::models::{List, ListPatch, NewList, dedup_product_ids, merge_product_ids};

/// Raw `prizey.list` row.
#[derive(sqlx::FromRow)]
struct ListRow {
    id: i32,
    name: String,
    description: Option<String>,
    user_id: i32,
    product_ids: Vec<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ListRow> for List {
    fn from(row: ListRow) -> Self {
        Self {
            id: ListId::new(row.id),
            name: row.name,
            description: row.description,
            user_id: UserId::new(row.user_id),
            product_ids: row.product_ids.into_iter().map(ProductId::new).collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const LIST_COLUMNS: &str = "id, name, description, user_id, product_ids, created_at, updated_at";

fn raw_ids(ids: &[ProductId]) -> Vec<i32> {
    ids.iter().map(ProductId::as_i32).collect()
}

/// Repository for list database operations.
pub struct ListRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ListRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All lists owned by a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn for_user(&self, user_id: UserId) -> Result<Vec<List>, RepositoryError> {
        let rows = sqlx::query_as::<_, ListRow>(&format!(
            r"
            SELECT {LIST_COLUMNS}
            FROM prizey.list
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(List::from).collect())
    }

    /// Create a list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, list: &NewList) -> Result<List, RepositoryError> {
        let row = sqlx::query_as::<_, ListRow>(&format!(
            r"
            INSERT INTO prizey.list (name, description, user_id, product_ids)
            VALUES ($1, $2, $3, $4)
            RETURNING {LIST_COLUMNS}
            "
        ))
        .bind(&list.name)
        .bind(list.description.as_deref())
        .bind(list.user_id)
        .bind(raw_ids(&dedup_product_ids(&list.product_ids)))
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Get a list by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ListId) -> Result<Option<List>, RepositoryError> {
        let row = sqlx::query_as::<_, ListRow>(&format!(
            "SELECT {LIST_COLUMNS} FROM prizey.list WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(List::from))
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update(
        &self,
        id: ListId,
        patch: &ListPatch,
    ) -> Result<Option<List>, RepositoryError> {
        let product_ids = patch
            .product_ids
            .as_deref()
            .map(|ids| raw_ids(&dedup_product_ids(ids)));

        let row = sqlx::query_as::<_, ListRow>(&format!(
            r"
            UPDATE prizey.list SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                product_ids = COALESCE($4, product_ids),
                updated_at = now()
            WHERE id = $1
            RETURNING {LIST_COLUMNS}
            "
        ))
        .bind(id)
        .bind(patch.name.as_deref())
        .bind(patch.description.as_deref())
        .bind(product_ids)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(List::from))
    }

    /// Delete a list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: ListId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM prizey.list WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Append product ids, skipping duplicates.
    ///
    /// The row is locked for the read-merge-write so concurrent appends
    /// cannot drop each other's ids.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn append_products(
        &self,
        id: ListId,
        product_ids: &[ProductId],
    ) -> Result<Option<List>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<Vec<i32>> =
            sqlx::query_scalar("SELECT product_ids FROM prizey.list WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(current) = current else {
            return Ok(None);
        };
        let existing: Vec<ProductId> = current.into_iter().map(ProductId::new).collect();
        let merged = merge_product_ids(&existing, product_ids);

        let row = sqlx::query_as::<_, ListRow>(&format!(
            r"
            UPDATE prizey.list
            SET product_ids = $2, updated_at = now()
            WHERE id = $1
            RETURNING {LIST_COLUMNS}
            "
        ))
        .bind(id)
        .bind(raw_ids(&merged))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(row.into()))
    }
}
