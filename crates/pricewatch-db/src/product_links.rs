//! Database operations for `products` and `product_links`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `product_links` table: one product at one retailer URL.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductLinkRow {
    pub id: i64,
    pub product_id: i64,
    /// Retailer id from `config/retailers.yaml`.
    pub retailer: String,
    pub url: String,
    pub is_active: bool,
    pub currency_code: String,
    pub last_price: Option<Decimal>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub error_count: i32,
    pub consecutive_errors: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const LINK_COLUMNS: &str = "id, product_id, retailer, url, is_active, currency_code, \
     last_price, min_price, max_price, last_checked_at, last_success_at, \
     error_count, consecutive_errors, last_error, created_at, updated_at";

/// Lists active product links, oldest-checked first.
///
/// When `retailer` is `Some`, only links for that retailer id are returned.
/// Links never checked come first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_product_links(
    pool: &PgPool,
    retailer: Option<&str>,
) -> Result<Vec<ProductLinkRow>, DbError> {
    let sql = format!(
        "SELECT {LINK_COLUMNS} FROM product_links \
         WHERE is_active = true AND ($1::text IS NULL OR retailer = $1) \
         ORDER BY last_checked_at ASC NULLS FIRST, id ASC"
    );

    let rows = sqlx::query_as::<_, ProductLinkRow>(&sql)
        .bind(retailer)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Fetches a single product link by id, active or not.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no link has this id, or [`DbError::Sqlx`]
/// on query failure.
pub async fn get_product_link(pool: &PgPool, id: i64) -> Result<ProductLinkRow, DbError> {
    let sql = format!("SELECT {LINK_COLUMNS} FROM product_links WHERE id = $1");

    sqlx::query_as::<_, ProductLinkRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Inserts a product and returns its id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_product(pool: &PgPool, name: &str) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO products (public_id, name) VALUES ($1, $2) RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Inserts an active link for `product_id`, or reactivates the existing one
/// for the same `(retailer, url)`. Returns the link id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails (e.g. unknown product).
pub async fn insert_product_link(
    pool: &PgPool,
    product_id: i64,
    retailer: &str,
    url: &str,
    currency_code: &str,
) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO product_links (product_id, retailer, url, currency_code) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (retailer, url) DO UPDATE \
         SET is_active = true, updated_at = NOW() \
         RETURNING id",
    )
    .bind(product_id)
    .bind(retailer)
    .bind(url)
    .bind(currency_code)
    .fetch_one(pool)
    .await?;

    Ok(id)
}
