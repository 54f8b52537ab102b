//! Product and price history types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use prizey_core::{
    Asin, AsinError, CurrencyCode, Price, PriceHistoryId, PriceSource, ProductId, RawPrice,
};

/// A tracked product.
///
/// `current_price` mirrors the newest [`PriceHistoryEntry`]; both are written
/// in the same transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub asin: Asin,
    pub title: String,
    pub brand: Option<String>,
    pub stars: Option<f32>,
    pub reviews_count: i32,
    pub thumbnail_image: Option<String>,
    pub bread_crumbs: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub current_price: Decimal,
    pub current_currency: CurrencyCode,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[must_use]
    pub const fn price(&self) -> Price {
        Price::new(self.current_price, self.current_currency)
    }
}

/// One observed price. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceHistoryEntry {
    pub id: PriceHistoryId,
    pub product_id: ProductId,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub currency: CurrencyCode,
    pub source: PriceSource,
    pub scraped_at: DateTime<Utc>,
    pub is_lowest: bool,
}

/// A product with its price history, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductWithHistory {
    #[serde(flatten)]
    pub product: Product,
    pub price_history: Vec<PriceHistoryEntry>,
}

/// Whether a new observation is flagged as the lowest price seen.
///
/// A product with no usable current price (new, or stored as zero) always
/// gets the flag; otherwise only a strictly lower price does.
#[must_use]
pub fn is_lowest_price(current: Option<Decimal>, new: Decimal) -> bool {
    match current {
        Some(current) if !current.is_zero() => new < current,
        _ => true,
    }
}

/// A validated product ready to be upserted by ASIN.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub asin: Asin,
    pub title: String,
    pub brand: Option<String>,
    pub stars: Option<f32>,
    pub reviews_count: i32,
    pub thumbnail_image: Option<String>,
    pub bread_crumbs: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub price: Price,
}

/// Why a submitted product was rejected.
#[derive(Debug, thiserror::Error)]
pub enum InvalidProduct {
    #[error("product has no asin")]
    MissingAsin,
    #[error("invalid asin: {0}")]
    InvalidAsin(#[from] AsinError),
    #[error("product has no title")]
    MissingTitle,
}

/// A product as submitted to `POST /api/product`.
///
/// Everything is optional on the wire so one malformed item can be skipped
/// without failing the batch.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub asin: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub price: Option<RawPrice>,
    pub brand: Option<String>,
    pub stars: Option<f64>,
    pub reviews_count: Option<i64>,
    pub thumbnail_image: Option<String>,
    pub bread_crumbs: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
}

impl ProductInput {
    /// Validate and normalize into a [`NewProduct`].
    ///
    /// # Errors
    ///
    /// Returns [`InvalidProduct`] when the ASIN or title is missing or blank.
    pub fn into_new_product(
        self,
        default_currency: CurrencyCode,
    ) -> Result<NewProduct, InvalidProduct> {
        let asin = Asin::parse(self.asin.as_deref().ok_or(InvalidProduct::MissingAsin)?)?;
        let title = non_blank(self.title).ok_or(InvalidProduct::MissingTitle)?;
        let price = self.price.as_ref().map_or_else(
            || Price::zero(default_currency),
            |raw| raw.normalize(default_currency),
        );

        Ok(NewProduct {
            asin,
            title,
            brand: non_blank(self.brand),
            stars: self.stars.and_then(stars_from_f64),
            reviews_count: self
                .reviews_count
                .and_then(|n| i32::try_from(n.max(0)).ok())
                .unwrap_or(0),
            thumbnail_image: non_blank(self.thumbnail_image),
            bread_crumbs: non_blank(self.bread_crumbs),
            description: non_blank(self.description),
            url: non_blank(self.url),
            price,
        })
    }
}

/// Star ratings are stored as `REAL`; anything outside 0..=5 is dropped.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Range checked above the cast
pub fn stars_from_f64(stars: f64) -> Option<f32> {
    (stars.is_finite() && (0.0..=5.0).contains(&stars)).then_some(stars as f32)
}

/// Trim a string, treating an empty result as absent.
#[must_use]
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// A partial update to a product. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductUpdate {
    pub title: Option<String>,
    pub brand: Option<String>,
    pub stars: Option<f32>,
    pub reviews_count: Option<i32>,
    pub thumbnail_image: Option<String>,
    pub bread_crumbs: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    /// New price; recorded as a `Manual` history entry when it differs.
    pub price: Option<Price>,
}

impl ProductUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.brand.is_none()
            && self.stars.is_none()
            && self.reviews_count.is_none()
            && self.thumbnail_image.is_none()
            && self.bread_crumbs.is_none()
            && self.description.is_none()
            && self.url.is_none()
            && self.price.is_none()
    }

    /// Apply the descriptive fields to a product in place.
    pub fn apply_details(&self, product: &mut Product) {
        if let Some(title) = &self.title {
            product.title.clone_from(title);
        }
        if let Some(brand) = &self.brand {
            product.brand = Some(brand.clone());
        }
        if let Some(stars) = self.stars {
            product.stars = Some(stars);
        }
        if let Some(count) = self.reviews_count {
            product.reviews_count = count;
        }
        if let Some(image) = &self.thumbnail_image {
            product.thumbnail_image = Some(image.clone());
        }
        if let Some(crumbs) = &self.bread_crumbs {
            product.bread_crumbs = Some(crumbs.clone());
        }
        if let Some(description) = &self.description {
            product.description = Some(description.clone());
        }
        if let Some(url) = &self.url {
            product.url = Some(url.clone());
        }
    }

    /// The price to record, if it differs from the product's current one.
    #[must_use]
    pub fn price_change(&self, product: &Product) -> Option<Price> {
        self.price.filter(|price| *price != product.price())
    }
}

/// Catalog search filters (`GET /api/product`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFilter {
    /// Case-insensitive substring of title or brand.
    pub query: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub min_stars: Option<f32>,
    /// Case-insensitive brand equality.
    pub brand: Option<String>,
}

impl ProductFilter {
    /// In-process evaluation, matching the SQL the Postgres store runs.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(query) = &self.query {
            let needle = query.to_lowercase();
            let in_title = product.title.to_lowercase().contains(&needle);
            let in_brand = product
                .brand
                .as_deref()
                .is_some_and(|b| b.to_lowercase().contains(&needle));
            if !in_title && !in_brand {
                return false;
            }
        }
        if self.min_price.is_some_and(|min| product.current_price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| product.current_price > max) {
            return false;
        }
        if let Some(min) = self.min_stars
            && !product.stars.is_some_and(|s| s >= min)
        {
            return false;
        }
        if let Some(brand) = &self.brand
            && !product
                .brand
                .as_deref()
                .is_some_and(|b| b.eq_ignore_ascii_case(brand))
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(title: &str, brand: Option<&str>, price: i64, stars: Option<f32>) -> Product {
        Product {
            id: ProductId::new(1),
            asin: Asin::parse("B000TEST01").unwrap(),
            title: title.to_string(),
            brand: brand.map(String::from),
            stars,
            reviews_count: 0,
            thumbnail_image: None,
            bread_crumbs: None,
            description: None,
            url: None,
            current_price: Decimal::from(price),
            current_currency: CurrencyCode::INR,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_is_lowest_price() {
        assert!(is_lowest_price(None, Decimal::from(500)));
        assert!(is_lowest_price(Some(Decimal::ZERO), Decimal::from(500)));
        assert!(is_lowest_price(Some(Decimal::from(600)), Decimal::from(500)));
        assert!(!is_lowest_price(Some(Decimal::from(500)), Decimal::from(500)));
        assert!(!is_lowest_price(Some(Decimal::from(400)), Decimal::from(500)));
    }

    #[test]
    fn test_input_requires_asin_and_title() {
        let input = ProductInput {
            title: Some("Kettle".into()),
            ..Default::default()
        };
        assert!(matches!(
            input.into_new_product(CurrencyCode::INR),
            Err(InvalidProduct::MissingAsin)
        ));

        let input = ProductInput {
            asin: Some("B0KETTLE01".into()),
            title: Some("   ".into()),
            ..Default::default()
        };
        assert!(matches!(
            input.into_new_product(CurrencyCode::INR),
            Err(InvalidProduct::MissingTitle)
        ));
    }

    #[test]
    fn test_input_normalizes_fields() {
        let input: ProductInput = serde_json::from_value(serde_json::json!({
            "asin": "B0KETTLE01",
            "title": "Electric Kettle",
            "price": {"value": 1299, "currency": "INR"},
            "brand": "  ",
            "stars": 4.4,
            "reviewsCount": -3,
            "url": "https://www.amazon.in/dp/B0KETTLE01"
        }))
        .unwrap();

        let product = input.into_new_product(CurrencyCode::INR).unwrap();
        assert_eq!(product.asin.as_str(), "B0KETTLE01");
        assert_eq!(product.price, Price::new(Decimal::from(1299), CurrencyCode::INR));
        assert_eq!(product.brand, None);
        assert_eq!(product.reviews_count, 0);
        assert!(product.stars.is_some());
    }

    #[test]
    fn test_missing_price_is_zero() {
        let input = ProductInput {
            asin: Some("B0KETTLE01".into()),
            title: Some("Kettle".into()),
            ..Default::default()
        };
        assert!(input.into_new_product(CurrencyCode::INR).unwrap().price.is_zero());
    }

    #[test]
    fn test_filter_matches() {
        let kettle = product("Electric Kettle 1.5L", Some("Prestige"), 1299, Some(4.2));

        assert!(ProductFilter::default().matches(&kettle));
        assert!(
            ProductFilter {
                query: Some("KETTLE".into()),
                ..Default::default()
            }
            .matches(&kettle)
        );
        assert!(
            ProductFilter {
                query: Some("prest".into()),
                brand: Some("prestige".into()),
                ..Default::default()
            }
            .matches(&kettle)
        );
        assert!(
            !ProductFilter {
                max_price: Some(Decimal::from(999)),
                ..Default::default()
            }
            .matches(&kettle)
        );
        assert!(
            !ProductFilter {
                min_stars: Some(4.5),
                ..Default::default()
            }
            .matches(&kettle)
        );
    }

    #[test]
    fn test_update_price_change() {
        let kettle = product("Kettle", None, 1299, None);
        let same = ProductUpdate {
            price: Some(Price::new(Decimal::from(1299), CurrencyCode::INR)),
            ..Default::default()
        };
        assert_eq!(same.price_change(&kettle), None);

        let cheaper = ProductUpdate {
            price: Some(Price::new(Decimal::from(999), CurrencyCode::INR)),
            ..Default::default()
        };
        assert!(cheaper.price_change(&kettle).is_some());
        assert!(ProductUpdate::default().is_empty());
    }

    #[test]
    fn test_serializes_camel_case_with_numeric_prices() {
        let json = serde_json::to_value(product("Kettle", None, 1299, None)).unwrap();
        assert_eq!(json["currentPrice"], serde_json::json!(1299.0));
        assert_eq!(json["currentCurrency"], "INR");
        assert_eq!(json["reviewsCount"], 0);
        assert!(json.get("thumbnailImage").is_some());
    }
}
