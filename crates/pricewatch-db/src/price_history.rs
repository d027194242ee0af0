//! Database operations for `price_history` and the rolling price fields on
//! `product_links`.

use chrono::{DateTime, Utc};
use pricewatch_core::ScrapeResult;
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `price_history` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PriceHistoryRow {
    pub id: i64,
    pub product_link_id: i64,
    pub scrape_run_id: Option<i64>,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub currency_code: String,
    pub was_available: bool,
    /// `true` when `price` is below the link's previous `last_price`.
    pub price_dropped: bool,
    pub response_time_ms: Option<i32>,
    pub captured_at: DateTime<Utc>,
}

/// Rolling price fields of a product link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct PriceStats {
    pub last_price: Option<Decimal>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

impl PriceStats {
    /// The stats after observing `price`.
    #[must_use]
    pub fn observe(&self, price: Decimal) -> Self {
        Self {
            last_price: Some(price),
            min_price: Some(self.min_price.map_or(price, |m| m.min(price))),
            max_price: Some(self.max_price.map_or(price, |m| m.max(price))),
        }
    }

    /// `true` when `price` is strictly below the last seen price. The first
    /// observation is never a drop.
    #[must_use]
    pub fn is_drop(&self, price: Decimal) -> bool {
        self.last_price.is_some_and(|last| price < last)
    }
}

/// A successful scrape ready to be written to `price_history`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPriceRecord {
    pub product_link_id: i64,
    pub scrape_run_id: Option<i64>,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub currency_code: String,
    pub was_available: bool,
    pub response_time_ms: i32,
}

impl NewPriceRecord {
    /// Builds a record from a scrape result; `None` if no price was extracted.
    #[must_use]
    pub fn from_result(result: &ScrapeResult, scrape_run_id: Option<i64>) -> Option<Self> {
        Some(Self {
            product_link_id: result.product_link_id,
            scrape_run_id,
            price: result.price?,
            original_price: result.original_price,
            currency_code: result.currency.clone(),
            was_available: result.was_available,
            response_time_ms: i32::try_from(result.response_time_ms).unwrap_or(i32::MAX),
        })
    }

    /// Checks the record can be stored. Price columns are unconstrained
    /// `NUMERIC`, so any non-negative `Decimal` is kept exactly.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NegativePrice`] if `price` or `original_price` is
    /// below zero.
    pub fn validate(&self) -> Result<(), DbError> {
        let negative = |p: Decimal| p.is_sign_negative() && !p.is_zero();
        if negative(self.price) {
            return Err(DbError::NegativePrice(self.price));
        }
        if let Some(original) = self.original_price.filter(|p| negative(*p)) {
            return Err(DbError::NegativePrice(original));
        }
        Ok(())
    }
}

const HISTORY_COLUMNS: &str = "id, product_link_id, scrape_run_id, price, original_price, \
     currency_code, was_available, price_dropped, response_time_ms, captured_at";

/// Records a scraped price.
///
/// In one transaction: locks the link row, inserts a `price_history` row with
/// `price_dropped` derived from the previous `last_price`, updates the link's
/// rolling `last_price` / `min_price` / `max_price`, and resets its
/// consecutive error counter.
///
/// # Errors
///
/// Returns [`DbError::NegativePrice`] for a negative price or original price,
/// [`DbError::NotFound`] if the link does not exist, or [`DbError::Sqlx`] if
/// any statement fails (the transaction is rolled back).
pub async fn record_price(
    pool: &PgPool,
    record: &NewPriceRecord,
) -> Result<PriceHistoryRow, DbError> {
    record.validate()?;

    let mut tx = pool.begin().await?;

    let current = sqlx::query_as::<_, PriceStats>(
        "SELECT last_price, min_price, max_price FROM product_links \
         WHERE id = $1 FOR UPDATE",
    )
    .bind(record.product_link_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(DbError::NotFound)?;

    let price_dropped = current.is_drop(record.price);
    let next = current.observe(record.price);

    let sql = format!(
        "INSERT INTO price_history \
         (product_link_id, scrape_run_id, price, original_price, currency_code, \
          was_available, price_dropped, response_time_ms) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING {HISTORY_COLUMNS}"
    );
    let row = sqlx::query_as::<_, PriceHistoryRow>(&sql)
        .bind(record.product_link_id)
        .bind(record.scrape_run_id)
        .bind(record.price)
        .bind(record.original_price)
        .bind(&record.currency_code)
        .bind(record.was_available)
        .bind(price_dropped)
        .bind(record.response_time_ms)
        .fetch_one(&mut *tx)
        .await?;

    sqlx::query(
        "UPDATE product_links \
         SET last_price = $1, min_price = $2, max_price = $3, currency_code = $4, \
             last_checked_at = NOW(), last_success_at = NOW(), \
             consecutive_errors = 0, last_error = NULL, updated_at = NOW() \
         WHERE id = $5",
    )
    .bind(next.last_price)
    .bind(next.min_price)
    .bind(next.max_price)
    .bind(&record.currency_code)
    .bind(record.product_link_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    if price_dropped {
        tracing::info!(
            product_link_id = record.product_link_id,
            price = %record.price,
            previous = ?current.last_price,
            "price dropped"
        );
    }

    Ok(row)
}

/// Records a failed scrape: increments `error_count` and
/// `consecutive_errors`, stores `error` as `last_error`, and stamps
/// `last_checked_at`. No history row is written.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the link does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn record_failure(
    pool: &PgPool,
    product_link_id: i64,
    error: &str,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE product_links \
         SET error_count = error_count + 1, \
             consecutive_errors = consecutive_errors + 1, \
             last_error = $1, last_checked_at = NOW(), updated_at = NOW() \
         WHERE id = $2",
    )
    .bind(error)
    .bind(product_link_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Returns the most recent `limit` history rows for a link, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_price_history(
    pool: &PgPool,
    product_link_id: i64,
    limit: i64,
) -> Result<Vec<PriceHistoryRow>, DbError> {
    let sql = format!(
        "SELECT {HISTORY_COLUMNS} FROM price_history \
         WHERE product_link_id = $1 \
         ORDER BY captured_at DESC, id DESC \
         LIMIT $2"
    );

    let rows = sqlx::query_as::<_, PriceHistoryRow>(&sql)
        .bind(product_link_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn first_observation_sets_all_fields() {
        let stats = PriceStats::default().observe(dec("99.90"));
        assert_eq!(stats.last_price, Some(dec("99.90")));
        assert_eq!(stats.min_price, Some(dec("99.90")));
        assert_eq!(stats.max_price, Some(dec("99.90")));
    }

    #[test]
    fn observations_track_min_and_max() {
        let stats = PriceStats::default()
            .observe(dec("100"))
            .observe(dec("80"))
            .observe(dec("120"))
            .observe(dec("90"));
        assert_eq!(stats.last_price, Some(dec("90")));
        assert_eq!(stats.min_price, Some(dec("80")));
        assert_eq!(stats.max_price, Some(dec("120")));
    }

    #[test]
    fn drop_requires_a_lower_price_than_last() {
        let stats = PriceStats::default().observe(dec("50.00"));
        assert!(stats.is_drop(dec("49.99")));
        assert!(!stats.is_drop(dec("50.00")));
        assert!(!stats.is_drop(dec("75")));
    }

    #[test]
    fn first_observation_is_never_a_drop() {
        assert!(!PriceStats::default().is_drop(Decimal::ZERO));
    }

    #[test]
    fn record_from_result_requires_price() {
        let mut result = ScrapeResult {
            product_link_id: 11,
            url: "https://produto.mercadolivre.com.br/MLB-11".to_owned(),
            price: None,
            original_price: None,
            currency: "BRL".to_owned(),
            was_available: false,
            scrape_source: "mercadolivre".to_owned(),
            response_time_ms: u64::MAX,
            error: Some("price element not found".to_owned()),
        };
        assert!(NewPriceRecord::from_result(&result, Some(1)).is_none());

        result.price = Some(dec("10.50"));
        let record = NewPriceRecord::from_result(&result, Some(1)).unwrap();
        assert_eq!(record.product_link_id, 11);
        assert_eq!(record.scrape_run_id, Some(1));
        assert_eq!(record.price, dec("10.50"));
        assert_eq!(record.response_time_ms, i32::MAX);
    }

    fn record(price: &str) -> NewPriceRecord {
        NewPriceRecord {
            product_link_id: 1,
            scrape_run_id: None,
            price: dec(price),
            original_price: None,
            currency_code: "BRL".to_owned(),
            was_available: true,
            response_time_ms: 80,
        }
    }

    #[test]
    fn validate_accepts_any_non_negative_price() {
        for price in ["0", "123456789012345", "1.23456", "79228162514264337593543950335"] {
            assert!(record(price).validate().is_ok(), "price {price}");
        }
    }

    #[test]
    fn stats_keep_full_scale_for_drop_detection() {
        let stats = PriceStats::default().observe(dec("1.23456"));
        assert_eq!(stats.last_price.map(|p| p.scale()), Some(5));
        assert!(stats.is_drop(dec("1.23455")));
        assert!(!stats.is_drop(dec("1.23456")));
    }

    #[test]
    fn validate_rejects_negative_prices() {
        assert!(matches!(
            record("-0.01").validate(),
            Err(DbError::NegativePrice(p)) if p == dec("-0.01")
        ));

        let mut with_original = record("10.00");
        with_original.original_price = Some(dec("-5"));
        assert!(matches!(
            with_original.validate(),
            Err(DbError::NegativePrice(p)) if p == dec("-5")
        ));
    }
}
