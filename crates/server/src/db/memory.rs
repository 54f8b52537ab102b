//! In-memory implementation of [`Store`].
//!
//! Keeps the same semantics as [`PgStore`](super::PgStore) so handler tests
//! and local demos run without a database. Every operation takes the single
//! lock once, which makes multi-row writes atomic.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use prizey_core::{Email, ListId, Price, PriceHistoryId, PriceSource, ProductId, UserId};

use super::{RepositoryError, Store};
use crate::models::{
    List, ListPatch, NewList, NewProduct, NewUser, OAuthProfile, OAuthProvider, PriceHistoryEntry,
    Product, ProductFilter, ProductUpdate, ProductWithHistory, User, dedup_product_ids,
    is_lowest_price, merge_product_ids,
};

#[derive(Default)]
struct Counters {
    user: i32,
    product: i32,
    history: i32,
    list: i32,
}

fn bump(counter: &mut i32) -> i32 {
    *counter += 1;
    *counter
}

struct UserRecord {
    user: User,
    password_hash: Option<String>,
}

#[derive(Default)]
struct MemoryState {
    ids: Counters,
    users: BTreeMap<UserId, UserRecord>,
    accounts: HashMap<(OAuthProvider, String), UserId>,
    products: BTreeMap<ProductId, Product>,
    history: Vec<PriceHistoryEntry>,
    lists: BTreeMap<ListId, List>,
}

impl MemoryState {
    fn user_by_email(&self, email: &Email) -> Option<&UserRecord> {
        self.users.values().find(|r| &r.user.email == email)
    }

    fn insert_user(&mut self, email: Email, name: Option<String>, hash: Option<String>) -> User {
        let now = Utc::now();
        let user = User {
            id: UserId::new(bump(&mut self.ids.user)),
            email,
            name,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(
            user.id,
            UserRecord {
                user: user.clone(),
                password_hash: hash,
            },
        );
        user
    }

    /// History for one product, newest first.
    fn history_for(&self, id: ProductId) -> Vec<PriceHistoryEntry> {
        self.history
            .iter()
            .rev()
            .filter(|entry| entry.product_id == id)
            .cloned()
            .collect()
    }

    fn with_history(&self, product: &Product) -> ProductWithHistory {
        ProductWithHistory {
            product: product.clone(),
            price_history: self.history_for(product.id),
        }
    }

    fn record_price(&mut self, id: ProductId, price: Price, source: PriceSource, is_lowest: bool) {
        let entry = PriceHistoryEntry {
            id: PriceHistoryId::new(bump(&mut self.ids.history)),
            product_id: id,
            price: price.amount,
            currency: price.currency_code,
            source,
            scraped_at: Utc::now(),
            is_lowest,
        };
        self.history.push(entry);
    }
}

/// Process-local store for tests and demos.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored products.
    #[must_use]
    pub fn product_count(&self) -> usize {
        self.state.read().products.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn get_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        Ok(self.state.read().user_by_email(email).map(|r| r.user.clone()))
    }

    async fn get_user_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.state.read().users.get(&id).map(|r| r.user.clone()))
    }

    async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, Option<String>)>, RepositoryError> {
        Ok(self
            .state
            .read()
            .user_by_email(email)
            .map(|r| (r.user.clone(), r.password_hash.clone())))
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let mut state = self.state.write();
        if state.user_by_email(&user.email).is_some() {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        Ok(state.insert_user(
            user.email.clone(),
            user.name.clone(),
            user.password_hash.clone(),
        ))
    }

    async fn find_or_create_oauth_user(
        &self,
        profile: &OAuthProfile,
    ) -> Result<User, RepositoryError> {
        let mut state = self.state.write();
        let key = (profile.provider, profile.provider_account_id.clone());

        if let Some(record) = state
            .accounts
            .get(&key)
            .and_then(|id| state.users.get(id))
        {
            return Ok(record.user.clone());
        }

        let existing = state.user_by_email(&profile.email).map(|r| r.user.id);
        let user = match existing {
            Some(id) => {
                let record = state.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
                if record.user.name.is_none() {
                    record.user.name.clone_from(&profile.name);
                    record.user.updated_at = Utc::now();
                }
                record.user.clone()
            }
            None => state.insert_user(profile.email.clone(), profile.name.clone(), None),
        };

        state.accounts.insert(key, user.id);
        Ok(user)
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
    ) -> Result<Vec<ProductWithHistory>, RepositoryError> {
        let state = self.state.read();
        let mut products: Vec<&Product> = state
            .products
            .values()
            .filter(|p| filter.matches(p))
            .collect();
        products.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));

        Ok(products.into_iter().map(|p| state.with_history(p)).collect())
    }

    async fn get_product(
        &self,
        id: ProductId,
    ) -> Result<Option<ProductWithHistory>, RepositoryError> {
        let state = self.state.read();
        Ok(state.products.get(&id).map(|p| state.with_history(p)))
    }

    async fn get_products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.read();
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn latest_prices(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Price>, RepositoryError> {
        let state = self.state.read();
        Ok(ids
            .iter()
            .filter_map(|id| {
                state
                    .history
                    .iter()
                    .rev()
                    .find(|entry| entry.product_id == *id)
                    .map(|entry| (*id, Price::new(entry.price, entry.currency)))
            })
            .collect())
    }

    async fn upsert_product(
        &self,
        product: &NewProduct,
    ) -> Result<ProductWithHistory, RepositoryError> {
        let mut state = self.state.write();
        let now = Utc::now();

        let existing = state
            .products
            .values()
            .find(|p| p.asin == product.asin)
            .map(|p| (p.id, p.current_price, p.created_at));

        let (id, previous, created_at) = match existing {
            Some((id, price, created_at)) => (id, Some(price), created_at),
            None => (ProductId::new(bump(&mut state.ids.product)), None, now),
        };

        let saved = Product {
            id,
            asin: product.asin.clone(),
            title: product.title.clone(),
            brand: product.brand.clone(),
            stars: product.stars,
            reviews_count: product.reviews_count,
            thumbnail_image: product.thumbnail_image.clone(),
            bread_crumbs: product.bread_crumbs.clone(),
            description: product.description.clone(),
            url: product.url.clone(),
            current_price: product.price.amount,
            current_currency: product.price.currency_code,
            created_at,
            updated_at: now,
        };
        state.products.insert(id, saved);

        let is_lowest = is_lowest_price(previous, product.price.amount);
        state.record_price(id, product.price, PriceSource::Scraper, is_lowest);

        let saved = state.products.get(&id).ok_or(RepositoryError::NotFound)?;
        Ok(state.with_history(saved))
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Option<ProductWithHistory>, RepositoryError> {
        let mut state = self.state.write();
        let Some(product) = state.products.get_mut(&id) else {
            return Ok(None);
        };

        let previous = product.current_price;
        let price_change = update.price_change(product);
        update.apply_details(product);
        if let Some(price) = price_change {
            product.current_price = price.amount;
            product.current_currency = price.currency_code;
        }
        product.updated_at = Utc::now();

        if let Some(price) = price_change {
            let is_lowest = is_lowest_price(Some(previous), price.amount);
            state.record_price(id, price, PriceSource::Manual, is_lowest);
        }

        Ok(state.products.get(&id).map(|p| state.with_history(p)))
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let mut state = self.state.write();
        if state.products.remove(&id).is_none() {
            return Ok(false);
        }

        state.history.retain(|entry| entry.product_id != id);
        let now = Utc::now();
        for list in state.lists.values_mut() {
            if list.product_ids.contains(&id) {
                list.product_ids.retain(|pid| *pid != id);
                list.updated_at = now;
            }
        }
        Ok(true)
    }

    async fn lists_for_user(&self, user_id: UserId) -> Result<Vec<List>, RepositoryError> {
        let state = self.state.read();
        let mut lists: Vec<List> = state
            .lists
            .values()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        lists.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(lists)
    }

    async fn create_list(&self, list: &NewList) -> Result<List, RepositoryError> {
        let mut state = self.state.write();
        let now = Utc::now();
        let created = List {
            id: ListId::new(bump(&mut state.ids.list)),
            name: list.name.clone(),
            description: list.description.clone(),
            user_id: list.user_id,
            product_ids: dedup_product_ids(&list.product_ids),
            created_at: now,
            updated_at: now,
        };
        state.lists.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_list(&self, id: ListId) -> Result<Option<List>, RepositoryError> {
        Ok(self.state.read().lists.get(&id).cloned())
    }

    async fn update_list(
        &self,
        id: ListId,
        patch: &ListPatch,
    ) -> Result<Option<List>, RepositoryError> {
        let mut state = self.state.write();
        Ok(state.lists.get_mut(&id).map(|list| {
            patch.apply(list);
            list.updated_at = Utc::now();
            list.clone()
        }))
    }

    async fn delete_list(&self, id: ListId) -> Result<bool, RepositoryError> {
        Ok(self.state.write().lists.remove(&id).is_some())
    }

    async fn append_list_products(
        &self,
        id: ListId,
        product_ids: &[ProductId],
    ) -> Result<Option<List>, RepositoryError> {
        let mut state = self.state.write();
        Ok(state.lists.get_mut(&id).map(|list| {
            list.product_ids = merge_product_ids(&list.product_ids, product_ids);
            list.updated_at = Utc::now();
            list.clone()
        }))
    }
}
