use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Outcome of one scrape of a tracked product link.
///
/// Produced by the scraper pipeline and consumed by persistence: a result
/// with a `price` becomes a `price_history` row, one without becomes a
/// failure-counter increment on the link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub product_link_id: i64,
    pub url: String,
    /// Current price in major currency units, when one was extracted.
    pub price: Option<Decimal>,
    /// Pre-sale list price, if the retailer exposes one.
    pub original_price: Option<Decimal>,
    /// ISO 4217 code detected on the page or the retailer default.
    pub currency: String,
    pub was_available: bool,
    /// Retailer id that produced this result, e.g. `"mercadolivre"`.
    pub scrape_source: String,
    pub response_time_ms: u64,
    pub error: Option<String>,
}

impl ScrapeResult {
    /// Returns `true` when a price was extracted.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.price.is_some()
    }

    /// Percentage off the original price, rounded to two decimal places.
    ///
    /// `None` unless both prices are known and the current price is strictly
    /// below the original.
    #[must_use]
    pub fn discount_percentage(&self) -> Option<Decimal> {
        let price = self.price?;
        let original = self.original_price?;
        if original <= price || original.is_zero() {
            return None;
        }
        let pct = (original - price) / original * Decimal::ONE_HUNDRED;
        Some(pct.round_dp(2))
    }
}
