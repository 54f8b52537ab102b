//! Product lists.

use chrono::{DateTime, Utc};
use serde::Serialize;

use prizey_core::{ListId, ProductId, UserId};

use super::{Product, UserSummary};

/// A named, shareable collection of products owned by one user.
///
/// Membership is an ordered array of product ids with no duplicates. Ids of
/// deleted products are removed from every list by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    pub id: ListId,
    pub name: String,
    pub description: Option<String>,
    pub user_id: UserId,
    pub product_ids: Vec<ProductId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A list with its resolved products.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListWithProducts {
    #[serde(flatten)]
    pub list: List,
    pub products: Vec<Product>,
}

/// A list as shown on its share page: owner summary plus products priced
/// from their newest history entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListDetail {
    #[serde(flatten)]
    pub list: List,
    pub user: Option<UserSummary>,
    pub products: Vec<Product>,
}

/// Input for creating a list.
#[derive(Debug, Clone)]
pub struct NewList {
    pub name: String,
    pub description: Option<String>,
    pub user_id: UserId,
    pub product_ids: Vec<ProductId>,
}

/// A partial update to a list. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub product_ids: Option<Vec<ProductId>>,
}

impl ListPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.product_ids.is_none()
    }

    /// Apply the patch to a list in place.
    pub fn apply(&self, list: &mut List) {
        if let Some(name) = &self.name {
            list.name.clone_from(name);
        }
        if let Some(description) = &self.description {
            list.description = Some(description.clone());
        }
        if let Some(ids) = &self.product_ids {
            list.product_ids = dedup_product_ids(ids);
        }
    }
}

/// Append `additions` to `existing`, skipping ids already present.
#[must_use]
pub fn merge_product_ids(existing: &[ProductId], additions: &[ProductId]) -> Vec<ProductId> {
    let mut merged = existing.to_vec();
    for id in additions {
        if !merged.contains(id) {
            merged.push(*id);
        }
    }
    merged
}

/// Remove repeated ids, keeping first occurrences in order.
#[must_use]
pub fn dedup_product_ids(ids: &[ProductId]) -> Vec<ProductId> {
    merge_product_ids(&[], ids)
}

/// Order `products` by their position in `ids`, dropping any not listed.
#[must_use]
pub fn order_by_ids(ids: &[ProductId], products: Vec<Product>) -> Vec<Product> {
    let mut products = products;
    products.retain(|p| ids.contains(&p.id));
    products.sort_by_key(|p| ids.iter().position(|id| *id == p.id));
    products
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[i32]) -> Vec<ProductId> {
        raw.iter().copied().map(ProductId::new).collect()
    }

    #[test]
    fn test_merge_product_ids_skips_existing() {
        assert_eq!(merge_product_ids(&ids(&[1, 2]), &ids(&[2, 3, 3, 1, 4])), ids(&[1, 2, 3, 4]));
        assert_eq!(merge_product_ids(&ids(&[]), &ids(&[])), ids(&[]));
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        assert_eq!(dedup_product_ids(&ids(&[5, 1, 5, 2, 1])), ids(&[5, 1, 2]));
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(ListPatch::default().is_empty());
        assert!(
            !ListPatch {
                description: Some(String::new()),
                ..Default::default()
            }
            .is_empty()
        );
    }
}
