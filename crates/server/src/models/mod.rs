//! Domain models for the API.
//!
//! Row types live next to their repositories in `db`; these are the
//! validated shapes handlers and services pass around and serialize.

pub mod list;
pub mod product;
pub mod session;
pub mod user;

pub use list::{
    List, ListDetail, ListPatch, ListWithProducts, NewList, dedup_product_ids, merge_product_ids,
    order_by_ids,
};
pub use product::{
    InvalidProduct, NewProduct, PriceHistoryEntry, Product, ProductFilter, ProductInput,
    ProductUpdate, ProductWithHistory, is_lowest_price,
};
pub use session::{CurrentUser, keys as session_keys};
pub use user::{NewUser, OAuthProfile, OAuthProvider, User, UserSummary};
