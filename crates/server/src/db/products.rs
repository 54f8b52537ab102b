//! Product and price history repository.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use prizey_core::{Asin, CurrencyCode, Price, PriceHistoryId, PriceSource, ProductId};

use super::RepositoryError;
use crate::models::{
    NewProduct, PriceHistoryEntry, Product, ProductFilter, ProductUpdate, ProductWithHistory,
    is_lowest_price,
};

/// Raw `prizey.product` row.
#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i32,
    asin: String,
    title: String,
    brand: Option<String>,
    stars: Option<f32>,
    reviews_count: i32,
    thumbnail_image: Option<String>,
    bread_crumbs: Option<String>,
    description: Option<String>,
    url: Option<String>,
    current_price: Decimal,
    current_currency: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let asin = Asin::parse(&row.asin).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid asin in database: {e}"))
        })?;
        let current_currency = parse_currency(&row.current_currency)?;

        Ok(Self {
            id: ProductId::new(row.id),
            asin,
            title: row.title,
            brand: row.brand,
            stars: row.stars,
            reviews_count: row.reviews_count,
            thumbnail_image: row.thumbnail_image,
            bread_crumbs: row.bread_crumbs,
            description: row.description,
            url: row.url,
            current_price: row.current_price,
            current_currency,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Raw `prizey.price_history` row.
#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: i32,
    product_id: i32,
    price: Decimal,
    currency: String,
    source: PriceSource,
    scraped_at: DateTime<Utc>,
    is_lowest: bool,
}

impl TryFrom<HistoryRow> for PriceHistoryEntry {
    type Error = RepositoryError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: PriceHistoryId::new(row.id),
            product_id: ProductId::new(row.product_id),
            price: row.price,
            currency: parse_currency(&row.currency)?,
            source: row.source,
            scraped_at: row.scraped_at,
            is_lowest: row.is_lowest,
        })
    }
}

fn parse_currency(code: &str) -> Result<CurrencyCode, RepositoryError> {
    code.parse()
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid currency in database: {e}")))
}

const PRODUCT_COLUMNS: &str = "id, asin, title, brand, stars, reviews_count, thumbnail_image, \
     bread_crumbs, description, url, current_price, current_currency, created_at, updated_at";

const HISTORY_COLUMNS: &str = "id, product_id, price, currency, source, scraped_at, is_lowest";

/// Escape `LIKE` wildcards in user input.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn raw_ids(ids: &[ProductId]) -> Vec<i32> {
    ids.iter().map(ProductId::as_i32).collect()
}

/// Repository for products and their price history.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Products matching `filter` with their history, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
    ) -> Result<Vec<ProductWithHistory>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM prizey.product
            WHERE ($1::text IS NULL OR title ILIKE $1 OR brand ILIKE $1)
              AND ($2::numeric IS NULL OR current_price >= $2)
              AND ($3::numeric IS NULL OR current_price <= $3)
              AND ($4::real IS NULL OR stars >= $4)
              AND ($5::text IS NULL OR lower(brand) = lower($5))
            ORDER BY updated_at DESC, id DESC
            "
        ))
        .bind(filter.query.as_deref().map(like_pattern))
        .bind(filter.min_price)
        .bind(filter.max_price)
        .bind(filter.min_stars)
        .bind(filter.brand.as_deref())
        .fetch_all(self.pool)
        .await?;

        let products = rows
            .into_iter()
            .map(Product::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let ids: Vec<ProductId> = products.iter().map(|p| p.id).collect();
        let mut history = self.history_for(&ids).await?;

        Ok(products
            .into_iter()
            .map(|product| ProductWithHistory {
                price_history: history.remove(&product.id).unwrap_or_default(),
                product,
            })
            .collect())
    }

    /// A product with its history, newest entry first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<ProductWithHistory>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let Some(product) = fetch_product(&mut conn, id, false).await? else {
            return Ok(None);
        };
        let price_history = fetch_history(&mut conn, id).await?;
        Ok(Some(ProductWithHistory {
            product,
            price_history,
        }))
    }

    /// Products with the given ids.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM prizey.product WHERE id = ANY($1)"
        ))
        .bind(raw_ids(ids))
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(Product::try_from)
        .collect()
    }

    /// Newest history price for each product that has one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn latest_prices(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Price>, RepositoryError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, HistoryRow>(&format!(
            r"
            SELECT DISTINCT ON (product_id) {HISTORY_COLUMNS}
            FROM prizey.price_history
            WHERE product_id = ANY($1)
            ORDER BY product_id, scraped_at DESC, id DESC
            "
        ))
        .bind(raw_ids(ids))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let entry = PriceHistoryEntry::try_from(row)?;
                Ok((entry.product_id, Price::new(entry.price, entry.currency)))
            })
            .collect()
    }

    /// Create or update a product by ASIN and append a `Scraper` history entry.
    ///
    /// The previous current price is read under a row lock so the `isLowest`
    /// flag and the new current price are decided together.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails; nothing is
    /// written in that case.
    pub async fn upsert(&self, product: &NewProduct) -> Result<ProductWithHistory, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let previous: Option<Decimal> = sqlx::query_scalar(
            "SELECT current_price FROM prizey.product WHERE asin = $1 FOR UPDATE",
        )
        .bind(product.asin.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO prizey.product (
                asin, title, brand, stars, reviews_count, thumbnail_image,
                bread_crumbs, description, url, current_price, current_currency
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (asin) DO UPDATE SET
                title = EXCLUDED.title,
                brand = EXCLUDED.brand,
                stars = EXCLUDED.stars,
                reviews_count = EXCLUDED.reviews_count,
                thumbnail_image = EXCLUDED.thumbnail_image,
                bread_crumbs = EXCLUDED.bread_crumbs,
                description = EXCLUDED.description,
                url = EXCLUDED.url,
                current_price = EXCLUDED.current_price,
                current_currency = EXCLUDED.current_currency,
                updated_at = now()
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(product.asin.as_str())
        .bind(&product.title)
        .bind(product.brand.as_deref())
        .bind(product.stars)
        .bind(product.reviews_count)
        .bind(product.thumbnail_image.as_deref())
        .bind(product.bread_crumbs.as_deref())
        .bind(product.description.as_deref())
        .bind(product.url.as_deref())
        .bind(product.price.amount)
        .bind(product.price.currency_code.code())
        .fetch_one(&mut *tx)
        .await?;

        let saved = Product::try_from(row)?;
        let is_lowest = is_lowest_price(previous, product.price.amount);
        insert_history(&mut tx, saved.id, product.price, PriceSource::Scraper, is_lowest).await?;
        let price_history = fetch_history(&mut tx, saved.id).await?;

        tx.commit().await?;

        Ok(ProductWithHistory {
            product: saved,
            price_history,
        })
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn update(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Option<ProductWithHistory>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let Some(current) = fetch_product(&mut tx, id, true).await? else {
            return Ok(None);
        };
        let price_change = update.price_change(&current);
        let new_price = price_change.unwrap_or_else(|| current.price());

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE prizey.product SET
                title = COALESCE($2, title),
                brand = COALESCE($3, brand),
                stars = COALESCE($4, stars),
                reviews_count = COALESCE($5, reviews_count),
                thumbnail_image = COALESCE($6, thumbnail_image),
                bread_crumbs = COALESCE($7, bread_crumbs),
                description = COALESCE($8, description),
                url = COALESCE($9, url),
                current_price = $10,
                current_currency = $11,
                updated_at = now()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(update.title.as_deref())
        .bind(update.brand.as_deref())
        .bind(update.stars)
        .bind(update.reviews_count)
        .bind(update.thumbnail_image.as_deref())
        .bind(update.bread_crumbs.as_deref())
        .bind(update.description.as_deref())
        .bind(update.url.as_deref())
        .bind(new_price.amount)
        .bind(new_price.currency_code.code())
        .fetch_one(&mut *tx)
        .await?;

        if let Some(price) = price_change {
            let is_lowest = is_lowest_price(Some(current.current_price), price.amount);
            insert_history(&mut tx, id, price, PriceSource::Manual, is_lowest).await?;
        }

        let product = Product::try_from(row)?;
        let price_history = fetch_history(&mut tx, id).await?;

        tx.commit().await?;

        Ok(Some(ProductWithHistory {
            product,
            price_history,
        }))
    }

    /// Delete a product; history cascades and the id is removed from lists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            UPDATE prizey.list
            SET product_ids = array_remove(product_ids, $1), updated_at = now()
            WHERE $1 = ANY(product_ids)
            ",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM prizey.product WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn history_for(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Vec<PriceHistoryEntry>>, RepositoryError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, HistoryRow>(&format!(
            r"
            SELECT {HISTORY_COLUMNS}
            FROM prizey.price_history
            WHERE product_id = ANY($1)
            ORDER BY scraped_at DESC, id DESC
            "
        ))
        .bind(raw_ids(ids))
        .fetch_all(self.pool)
        .await?;

        let mut grouped: HashMap<ProductId, Vec<PriceHistoryEntry>> = HashMap::new();
        for row in rows {
            let entry = PriceHistoryEntry::try_from(row)?;
            grouped.entry(entry.product_id).or_default().push(entry);
        }
        Ok(grouped)
    }
}

async fn fetch_product(
    conn: &mut PgConnection,
    id: ProductId,
    for_update: bool,
) -> Result<Option<Product>, RepositoryError> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM prizey.product WHERE id = $1{lock}"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .map(Product::try_from)
    .transpose()
}

async fn fetch_history(
    conn: &mut PgConnection,
    id: ProductId,
) -> Result<Vec<PriceHistoryEntry>, RepositoryError> {
    sqlx::query_as::<_, HistoryRow>(&format!(
        r"
        SELECT {HISTORY_COLUMNS}
        FROM prizey.price_history
        WHERE product_id = $1
        ORDER BY scraped_at DESC, id DESC
        "
    ))
    .bind(id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(PriceHistoryEntry::try_from)
    .collect()
}

async fn insert_history(
    conn: &mut PgConnection,
    product_id: ProductId,
    price: Price,
    source: PriceSource,
    is_lowest: bool,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO prizey.price_history (product_id, price, currency, source, is_lowest)
        VALUES ($1, $2, $3, $4, $5)
        ",
    )
    .bind(product_id)
    .bind(price.amount)
    .bind(price.currency_code.code())
    .bind(source)
    .bind(is_lowest)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
