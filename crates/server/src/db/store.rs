//! The storage seam shared by every request.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;

use prizey_core::{Email, ListId, Price, ProductId, UserId};

use super::RepositoryError;
use super::lists::ListRepository;
use super::products::ProductRepository;
use super::users::UserRepository;
use crate::models::{
    List, ListPatch, NewList, NewProduct, NewUser, OAuthProfile, Product, ProductFilter,
    ProductUpdate, ProductWithHistory, User,
};

/// Storage operations used by the API.
///
/// Every method is a single logical operation. Writes that touch more than one
/// row (upserting a product with its history entry, deleting a product from
/// every list) are atomic.
#[async_trait]
pub trait Store: Send + Sync {
    /// Check connectivity.
    async fn ping(&self) -> Result<(), RepositoryError>;

    // Users

    async fn get_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError>;

    async fn get_user_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// The user with their password hash (`None` for OAuth-only users).
    async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, Option<String>)>, RepositoryError>;

    /// Insert a user; [`RepositoryError::Conflict`] if the email is taken.
    async fn create_user(&self, user: &NewUser) -> Result<User, RepositoryError>;

    /// Resolve an OAuth identity to a user, linking by email and creating the
    /// user on first sign-in.
    async fn find_or_create_oauth_user(
        &self,
        profile: &OAuthProfile,
    ) -> Result<User, RepositoryError>;

    // Products

    /// Products matching `filter`, most recently updated first.
    async fn list_products(
        &self,
        filter: &ProductFilter,
    ) -> Result<Vec<ProductWithHistory>, RepositoryError>;

    async fn get_product(&self, id: ProductId)
    -> Result<Option<ProductWithHistory>, RepositoryError>;

    /// Products with the given ids, in no particular order. Unknown ids are skipped.
    async fn get_products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError>;

    /// Newest history price per product.
    async fn latest_prices(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Price>, RepositoryError>;

    /// Create or update the product keyed by ASIN and append a `Scraper`
    /// history entry.
    async fn upsert_product(
        &self,
        product: &NewProduct,
    ) -> Result<ProductWithHistory, RepositoryError>;

    /// Apply a partial update; a price change appends a `Manual` history entry.
    async fn update_product(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Option<ProductWithHistory>, RepositoryError>;

    /// Delete a product, its history, and its id from every list.
    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError>;

    // Lists

    /// A user's lists, newest first.
    async fn lists_for_user(&self, user_id: UserId) -> Result<Vec<List>, RepositoryError>;

    async fn create_list(&self, list: &NewList) -> Result<List, RepositoryError>;

    async fn get_list(&self, id: ListId) -> Result<Option<List>, RepositoryError>;

    async fn update_list(
        &self,
        id: ListId,
        patch: &ListPatch,
    ) -> Result<Option<List>, RepositoryError>;

    async fn delete_list(&self, id: ListId) -> Result<bool, RepositoryError>;

    /// Append product ids, skipping ones already in the list.
    async fn append_list_products(
        &self,
        id: ListId,
        product_ids: &[ProductId],
    ) -> Result<Option<List>, RepositoryError>;
}

/// `PostgreSQL` store backed by a shared connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    const fn users(&self) -> UserRepository<'_> {
        UserRepository::new(&self.pool)
    }

    const fn products(&self) -> ProductRepository<'_> {
        ProductRepository::new(&self.pool)
    }

    const fn lists(&self) -> ListRepository<'_> {
        ListRepository::new(&self.pool)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn get_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        self.users().get_by_email(email).await
    }

    async fn get_user_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        self.users().get_by_id(id).await
    }

    async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, Option<String>)>, RepositoryError> {
        self.users().get_password_hash(email).await
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, RepositoryError> {
        self.users().create(user).await
    }

    async fn find_or_create_oauth_user(
        &self,
        profile: &OAuthProfile,
    ) -> Result<User, RepositoryError> {
        self.users().find_or_create_oauth(profile).await
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
    ) -> Result<Vec<ProductWithHistory>, RepositoryError> {
        self.products().list(filter).await
    }

    async fn get_product(
        &self,
        id: ProductId,
    ) -> Result<Option<ProductWithHistory>, RepositoryError> {
        self.products().get(id).await
    }

    async fn get_products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        self.products().get_many(ids).await
    }

    async fn latest_prices(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Price>, RepositoryError> {
        self.products().latest_prices(ids).await
    }

    async fn upsert_product(
        &self,
        product: &NewProduct,
    ) -> Result<ProductWithHistory, RepositoryError> {
        self.products().upsert(product).await
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Option<ProductWithHistory>, RepositoryError> {
        self.products().update(id, update).await
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        self.products().delete(id).await
    }

    async fn lists_for_user(&self, user_id: UserId) -> Result<Vec<List>, RepositoryError> {
        self.lists().for_user(user_id).await
    }

    async fn create_list(&self, list: &NewList) -> Result<List, RepositoryError> {
        self.lists().create(list).await
    }

    async fn get_list(&self, id: ListId) -> Result<Option<List>, RepositoryError> {
        self.lists().get(id).await
    }

    async fn update_list(
        &self,
        id: ListId,
        patch: &ListPatch,
    ) -> Result<Option<List>, RepositoryError> {
        self.lists().update(id, patch).await
    }

    async fn delete_list(&self, id: ListId) -> Result<bool, RepositoryError> {
        self.lists().delete(id).await
    }

    async fn append_list_products(
        &self,
        id: ListId,
        product_ids: &[ProductId],
    ) -> Result<Option<List>, RepositoryError> {
        self.lists().append_products(id, product_ids).await
    }
}
