//! Fetch → extract → signals for one product link.

use std::time::Instant;

use pricewatch_core::ScrapeResult;

use crate::client::{FetchedPage, PageClient};
use crate::extract::ExtractionOutcome;
use crate::profile::RetailerProfile;

/// Error text recorded when every selector was exhausted.
pub const PRICE_NOT_FOUND: &str = "price element not found";

/// Scrapes one product link.
///
/// Never fails: fetch errors and missing prices are reported through
/// [`ScrapeResult::error`] so one bad link cannot abort a batch.
pub async fn scrape_link(
    client: &PageClient,
    profile: &RetailerProfile,
    product_link_id: i64,
    url: &str,
) -> ScrapeResult {
    let started = Instant::now();

    match client.fetch_html(url).await {
        Ok(page) => scrape_page(profile, product_link_id, &page),
        Err(e) => {
            tracing::warn!(
                retailer = profile.id(),
                product_link_id,
                url,
                error = %e,
                "fetch failed"
            );
            ScrapeResult {
                product_link_id,
                url: url.to_owned(),
                price: None,
                original_price: None,
                currency: profile.default_currency().to_owned(),
                was_available: false,
                scrape_source: profile.id().to_owned(),
                response_time_ms: elapsed_ms(started),
                error: Some(e.to_string()),
            }
        }
    }
}

/// Turns an already fetched page into a [`ScrapeResult`]. Pure.
#[must_use]
pub fn scrape_page(
    profile: &RetailerProfile,
    product_link_id: i64,
    page: &FetchedPage,
) -> ScrapeResult {
    let outcome = profile.extract(&page.html);
    let currency = profile.currency(&page.html);
    let was_available = profile.is_available(&page.html);

    let error = match outcome {
        ExtractionOutcome::Found(price) => {
            tracing::debug!(
                retailer = profile.id(),
                product_link_id,
                %price,
                %currency,
                was_available,
                "price extracted"
            );
            None
        }
        ExtractionOutcome::NotFound => {
            tracing::warn!(
                retailer = profile.id(),
                product_link_id,
                url = %page.url,
                selectors = profile.selectors().len(),
                "no selector yielded a price"
            );
            Some(PRICE_NOT_FOUND.to_owned())
        }
    };

    ScrapeResult {
        product_link_id,
        url: page.url.clone(),
        price: outcome.price(),
        original_price: None,
        currency,
        was_available,
        scrape_source: profile.id().to_owned(),
        response_time_ms: page.response_time_ms,
        error,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pricewatch_core::{RetailerConfig, SeparatorPolicy};
    use rust_decimal::Decimal;

    use super::*;

    fn profile() -> RetailerProfile {
        RetailerProfile::from_config(&RetailerConfig {
            id: "mercadolivre".to_owned(),
            name: "Mercado Livre".to_owned(),
            aliases: vec![],
            default_currency: "BRL".to_owned(),
            separator_policy: SeparatorPolicy::TwoDigitDecimal,
            selectors: vec![
                "span.andes-money-amount__fraction".to_owned(),
                r#"meta[itemprop="price"]"#.to_owned(),
            ],
            strip: vec![],
            unavailable_phrases: vec!["anúncio pausado".to_owned()],
        })
        .unwrap()
    }

    fn page(html: &str) -> FetchedPage {
        FetchedPage {
            url: "https://produto.mercadolivre.com.br/MLB-1".to_owned(),
            status: 200,
            html: html.to_owned(),
            response_time_ms: 87,
        }
    }

    #[test]
    fn found_price_produces_successful_result() {
        let html = r#"<html><body>
            <span class="andes-money-amount__fraction">1.299</span>
        </body></html>"#;
        let result = scrape_page(&profile(), 7, &page(html));

        assert!(result.is_success());
        assert_eq!(result.price, Some(Decimal::from(1299)));
        assert_eq!(result.currency, "BRL");
        assert!(result.was_available);
        assert_eq!(result.scrape_source, "mercadolivre");
        assert_eq!(result.response_time_ms, 87);
        assert_eq!(result.product_link_id, 7);
        assert!(result.error.is_none());
    }

    #[test]
    fn structured_fallback_is_used_when_display_price_is_missing() {
        let html = r#"<meta itemprop="price" content="54.9"><p>Preço em USD</p>"#;
        let result = scrape_page(&profile(), 1, &page(html));
        assert_eq!(result.price, Some(Decimal::from_str("54.9").unwrap()));
        assert_eq!(result.currency, "USD");
    }

    #[test]
    fn missing_price_sets_error_text() {
        let result = scrape_page(&profile(), 1, &page("<p>Anúncio pausado</p>"));
        assert!(!result.is_success());
        assert!(!result.was_available);
        assert_eq!(result.error.as_deref(), Some(PRICE_NOT_FOUND));
    }
}
