//! List operations behind `/api/list`.
//!
//! Owner resolution: an explicit email wins, otherwise the signed-in user.
//! Mutations on an existing list are checked against the session user when
//! there is one; anonymous callers are let through, as lists are shared by
//! link.

use thiserror::Error;

use prizey_core::{Email, ListId, ProductId};

use crate::db::{RepositoryError, Store};
use crate::models::{
    CurrentUser, List, ListDetail, ListPatch, ListWithProducts, NewList, Product, User,
    UserSummary, order_by_ids,
};

/// Errors from list operations.
#[derive(Debug, Error)]
pub enum ListError {
    #[error("User email is required")]
    EmailRequired,

    #[error("List name is required")]
    NameRequired,

    #[error("User not found")]
    UserNotFound,

    #[error("List not found")]
    ListNotFound,

    #[error("No update data provided")]
    NoUpdateData,

    #[error("You do not own this list")]
    NotOwner,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Who a request acts for, before the store is asked.
#[derive(Debug, Clone, Copy)]
pub enum Owner<'r> {
    Email(&'r str),
    Session(&'r CurrentUser),
}

impl<'r> Owner<'r> {
    /// An explicit email wins over the session user.
    ///
    /// # Errors
    ///
    /// Returns `ListError::EmailRequired` with neither a non-blank email nor
    /// a session.
    pub fn from_request(
        email: Option<&'r str>,
        session_user: Option<&'r CurrentUser>,
    ) -> Result<Self, ListError> {
        match (email.map(str::trim).filter(|e| !e.is_empty()), session_user) {
            (Some(email), _) => Ok(Self::Email(email)),
            (None, Some(current)) => Ok(Self::Session(current)),
            (None, None) => Err(ListError::EmailRequired),
        }
    }
}

/// A list name, trimmed. Checked before the owner is looked up.
///
/// # Errors
///
/// Returns `ListError::NameRequired` if the name is missing or blank.
pub fn list_name(name: Option<&str>) -> Result<&str, ListError> {
    name.map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or(ListError::NameRequired)
}

/// List service over the shared store.
pub struct ListService<'a> {
    store: &'a dyn Store,
}

impl<'a> ListService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Resolve the user a request acts for.
    ///
    /// # Errors
    ///
    /// Returns `ListError::EmailRequired` with neither an email nor a session,
    /// `ListError::UserNotFound` if the user does not exist.
    pub async fn resolve_user(
        &self,
        email: Option<&str>,
        session_user: Option<&CurrentUser>,
    ) -> Result<User, ListError> {
        self.find_owner(Owner::from_request(email, session_user)?)
            .await
    }

    /// Look up the user behind an [`Owner`].
    ///
    /// # Errors
    ///
    /// Returns `ListError::UserNotFound` if the user does not exist.
    pub async fn find_owner(&self, owner: Owner<'_>) -> Result<User, ListError> {
        let user = match owner {
            Owner::Email(email) => {
                // A malformed address cannot belong to anyone.
                let Ok(email) = Email::parse(email) else {
                    return Err(ListError::UserNotFound);
                };
                self.store.get_user_by_email(&email).await?
            }
            Owner::Session(current) => self.store.get_user_by_id(current.id).await?,
        };

        user.ok_or(ListError::UserNotFound)
    }

    /// All of a user's lists with their products.
    ///
    /// # Errors
    ///
    /// Returns `ListError::Repository` if the store fails.
    pub async fn lists_for(&self, user: &User) -> Result<Vec<ListWithProducts>, ListError> {
        let lists = self.store.lists_for_user(user.id).await?;

        let mut result = Vec::with_capacity(lists.len());
        for list in lists {
            result.push(self.with_products(list).await?);
        }
        Ok(result)
    }

    /// Create a list for `user`. `name` comes from [`list_name`].
    ///
    /// # Errors
    ///
    /// Returns `ListError::Repository` if the store fails.
    pub async fn create(
        &self,
        user: &User,
        name: &str,
        description: Option<String>,
        product_ids: Vec<ProductId>,
    ) -> Result<ListWithProducts, ListError> {
        let list = self
            .store
            .create_list(&NewList {
                name: name.to_string(),
                description,
                user_id: user.id,
                product_ids,
            })
            .await?;

        tracing::info!(list_id = %list.id, user_id = %user.id, "Created list");
        self.with_products(list).await
    }

    /// A list for its share page.
    ///
    /// Product prices come from each product's newest history entry.
    ///
    /// # Errors
    ///
    /// Returns `ListError::ListNotFound` if the list does not exist.
    pub async fn detail(&self, id: ListId) -> Result<ListDetail, ListError> {
        let list = self
            .store
            .get_list(id)
            .await?
            .ok_or(ListError::ListNotFound)?;

        let owner = self.store.get_user_by_id(list.user_id).await?;
        let mut products = self.products_of(&list).await?;

        let latest = self.store.latest_prices(&list.product_ids).await?;
        for product in &mut products {
            if let Some(price) = latest.get(&product.id) {
                product.current_price = price.amount;
                product.current_currency = price.currency_code;
            }
        }

        Ok(ListDetail {
            user: owner.as_ref().map(UserSummary::from),
            list,
            products,
        })
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `ListError::NoUpdateData` for an empty patch,
    /// `ListError::ListNotFound` or `ListError::NotOwner`.
    pub async fn update(
        &self,
        id: ListId,
        patch: ListPatch,
        session_user: Option<&CurrentUser>,
    ) -> Result<ListWithProducts, ListError> {
        let patch = ListPatch {
            name: patch
                .name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            ..patch
        };
        if patch.is_empty() {
            return Err(ListError::NoUpdateData);
        }

        self.authorize(id, session_user).await?;
        let list = self
            .store
            .update_list(id, &patch)
            .await?
            .ok_or(ListError::ListNotFound)?;

        self.with_products(list).await
    }

    /// Delete a list.
    ///
    /// # Errors
    ///
    /// Returns `ListError::ListNotFound` or `ListError::NotOwner`.
    pub async fn delete(
        &self,
        id: ListId,
        session_user: Option<&CurrentUser>,
    ) -> Result<(), ListError> {
        self.authorize(id, session_user).await?;
        if !self.store.delete_list(id).await? {
            return Err(ListError::ListNotFound);
        }

        tracing::info!(list_id = %id, "Deleted list");
        Ok(())
    }

    /// Append products, skipping ids already in the list.
    ///
    /// # Errors
    ///
    /// Returns `ListError::ListNotFound` or `ListError::NotOwner`.
    pub async fn append(
        &self,
        id: ListId,
        product_ids: &[ProductId],
        session_user: Option<&CurrentUser>,
    ) -> Result<ListWithProducts, ListError> {
        self.authorize(id, session_user).await?;
        let list = self
            .store
            .append_list_products(id, product_ids)
            .await?
            .ok_or(ListError::ListNotFound)?;

        self.with_products(list).await
    }

    async fn authorize(
        &self,
        id: ListId,
        session_user: Option<&CurrentUser>,
    ) -> Result<(), ListError> {
        let list = self
            .store
            .get_list(id)
            .await?
            .ok_or(ListError::ListNotFound)?;

        if let Some(current) = session_user
            && current.id != list.user_id
        {
            tracing::warn!(list_id = %id, user_id = %current.id, "Rejected list change by non-owner");
            return Err(ListError::NotOwner);
        }
        Ok(())
    }

    async fn products_of(&self, list: &List) -> Result<Vec<Product>, ListError> {
        let products = self.store.get_products_by_ids(&list.product_ids).await?;
        Ok(order_by_ids(&list.product_ids, products))
    }

    async fn with_products(&self, list: List) -> Result<ListWithProducts, ListError> {
        let products = self.products_of(&list).await?;
        Ok(ListWithProducts { list, products })
    }
}
