//! `pricewatch scrape`: fetch every selected product link, extract its price
//! and record the outcome under one scrape run.

use std::time::Duration;

use anyhow::Context;
use futures::stream::{self, StreamExt};
use pricewatch_core::{AppConfig, ScrapeResult};
use pricewatch_db::{NewPriceRecord, ProductLinkRow, ScrapeRunCounts};
use pricewatch_scraper::{PageClient, RetailerProfile, RetailerProfiles};

use crate::fail_run_best_effort;
use crate::pacer::RetailerPacer;

const TRIGGER_SOURCE: &str = "cli";

/// What happened to a single link during a run.
#[derive(Debug)]
enum LinkOutcome {
    /// A price was extracted and written to history.
    Recorded { price_dropped: bool },
    /// The fetch or extraction failed; the error was stored on the link.
    Failed,
    /// Writing the outcome to the database failed.
    Err(anyhow::Error),
}

/// Aggregated per-run counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct RunTally {
    total: usize,
    succeeded: usize,
    failed: usize,
    price_drops: usize,
}

impl RunTally {
    fn record(&mut self, outcome: &LinkOutcome) {
        self.total += 1;
        match outcome {
            LinkOutcome::Recorded { price_dropped } => {
                self.succeeded += 1;
                if *price_dropped {
                    self.price_drops += 1;
                }
            }
            LinkOutcome::Failed | LinkOutcome::Err(_) => self.failed += 1,
        }
    }

    fn all_failed(&self) -> bool {
        self.total > 0 && self.failed == self.total
    }

    fn counts(&self) -> ScrapeRunCounts {
        let clamp = |n: usize| i32::try_from(n).unwrap_or(i32::MAX);
        ScrapeRunCounts {
            total: clamp(self.total),
            succeeded: clamp(self.succeeded),
            failed: clamp(self.failed),
        }
    }
}

/// Runs a scrape over the selected links.
///
/// `retailer` restricts the run to one retailer (id or alias); `link` scrapes
/// a single link by id. With `dry_run` the plan is printed and nothing is
/// fetched or written.
pub(crate) async fn run_scrape(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    retailer: Option<&str>,
    link: Option<i64>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let retailers = pricewatch_core::load_retailers(&config.retailers_path)
        .with_context(|| format!("failed to load {}", config.retailers_path.display()))?;
    let profiles = RetailerProfiles::from_file(&retailers)?;

    let retailer_id = retailer
        .map(|key| profiles.get(key).map(|p| p.id().to_owned()))
        .transpose()?;

    let links = load_links(pool, retailer_id.as_deref(), link).await?;

    if dry_run {
        println!("dry run: {} link(s) would be scraped", links.len());
        for l in &links {
            println!("  [{}] {} {}", l.id, l.retailer, l.url);
        }
        return Ok(());
    }

    if links.is_empty() {
        tracing::info!(retailer = ?retailer_id, "no active product links to scrape");
    }

    let client = PageClient::new(
        config.scraper_request_timeout_secs,
        &config.scraper_user_agent,
        config.scraper_max_retries,
        config.scraper_retry_backoff_base_secs,
    )?;

    let run =
        pricewatch_db::create_scrape_run(pool, TRIGGER_SOURCE, retailer_id.as_deref()).await?;
    if let Err(e) = pricewatch_db::start_scrape_run(pool, run.id).await {
        fail_run_best_effort(pool, run.id, &format!("{e:#}"), ScrapeRunCounts::default()).await;
        return Err(e.into());
    }

    let run_id = run.id;
    let max_concurrent = config.scraper_max_concurrent_links.max(1);
    let pacer = RetailerPacer::new(
        Duration::from_millis(config.scraper_inter_request_delay_ms),
        links.iter().map(|l| l.retailer.as_str()),
    );

    let outcomes: Vec<(&ProductLinkRow, LinkOutcome)> = stream::iter(&links)
        .map(|l| {
            let client = &client;
            let profiles = &profiles;
            let pacer = &pacer;
            async move {
                pacer.wait_turn(&l.retailer).await;
                let outcome = process_link(pool, client, profiles, run_id, l).await;
                (l, outcome)
            }
        })
        .buffer_unordered(max_concurrent)
        .collect()
        .await;

    let mut tally = RunTally::default();
    for (l, outcome) in &outcomes {
        if let LinkOutcome::Err(e) = outcome {
            tracing::error!(
                product_link_id = l.id,
                retailer = %l.retailer,
                error = %e,
                "failed to record scrape outcome"
            );
        }
        tally.record(outcome);
    }

    tracing::info!(
        run_id = run.id,
        total = tally.total,
        succeeded = tally.succeeded,
        failed = tally.failed,
        price_drops = tally.price_drops,
        "scrape run finished"
    );

    if tally.all_failed() {
        let message = format!("all {} links failed", tally.failed);
        fail_run_best_effort(pool, run.id, &message, tally.counts()).await;
        anyhow::bail!("{message}");
    }

    if let Err(err) = pricewatch_db::complete_scrape_run(pool, run.id, tally.counts()).await {
        fail_run_best_effort(pool, run.id, &format!("{err:#}"), tally.counts()).await;
        return Err(err.into());
    }

    println!(
        "scraped {} link(s): {} succeeded, {} failed, {} price drop(s)",
        tally.total, tally.succeeded, tally.failed, tally.price_drops
    );
    Ok(())
}

/// Selects the links for a run: the single `link` if given, otherwise every
/// active link, optionally restricted to `retailer_id`.
async fn load_links(
    pool: &sqlx::PgPool,
    retailer_id: Option<&str>,
    link: Option<i64>,
) -> anyhow::Result<Vec<ProductLinkRow>> {
    let Some(id) = link else {
        return Ok(pricewatch_db::list_active_product_links(pool, retailer_id).await?);
    };

    let row = pricewatch_db::get_product_link(pool, id)
        .await
        .with_context(|| format!("product link {id} not found"))?;
    if let Some(expected) = retailer_id {
        if row.retailer != expected {
            anyhow::bail!(
                "product link {id} belongs to retailer '{}', not '{expected}'",
                row.retailer
            );
        }
    }
    if !row.is_active {
        tracing::warn!(product_link_id = id, "scraping an inactive product link");
    }
    Ok(vec![row])
}

async fn process_link(
    pool: &sqlx::PgPool,
    client: &PageClient,
    profiles: &RetailerProfiles,
    run_id: i64,
    link: &ProductLinkRow,
) -> LinkOutcome {
    let profile = match profiles.get(&link.retailer) {
        Ok(profile) => profile,
        Err(e) => {
            tracing::warn!(product_link_id = link.id, error = %e, "skipping link");
            return match pricewatch_db::record_failure(pool, link.id, &e.to_string()).await {
                Ok(()) => LinkOutcome::Failed,
                Err(db_err) => LinkOutcome::Err(db_err.into()),
            };
        }
    };

    let result = pricewatch_scraper::scrape_link(client, profile, link.id, &link.url).await;
    record_result(pool, profile, run_id, &result).await
}

async fn record_result(
    pool: &sqlx::PgPool,
    profile: &RetailerProfile,
    run_id: i64,
    result: &ScrapeResult,
) -> LinkOutcome {
    let write_error = match NewPriceRecord::from_result(result, Some(run_id)) {
        Some(record) => match pricewatch_db::record_price(pool, &record).await {
            Ok(row) => {
                return LinkOutcome::Recorded {
                    price_dropped: row.price_dropped,
                };
            }
            Err(e) => {
                tracing::warn!(
                    retailer = profile.id(),
                    product_link_id = result.product_link_id,
                    price = %record.price,
                    error = %e,
                    "price could not be stored"
                );
                Some(e)
            }
        },
        None => None,
    };

    let error = failure_message(result, write_error.as_ref());
    tracing::debug!(
        retailer = profile.id(),
        product_link_id = result.product_link_id,
        error,
        "recording scrape failure"
    );
    match pricewatch_db::record_failure(pool, result.product_link_id, &error).await {
        Ok(()) => LinkOutcome::Failed,
        Err(e) => LinkOutcome::Err(e.into()),
    }
}

/// Text stored in `last_error`: the write error when a scraped price could
/// not be stored, otherwise the scrape error.
fn failure_message(result: &ScrapeResult, write_error: Option<&pricewatch_db::DbError>) -> String {
    match write_error {
        Some(e) => format!("failed to record price: {e}"),
        None => result
            .error
            .clone()
            .unwrap_or_else(|| pricewatch_scraper::PRICE_NOT_FOUND.to_owned()),
    }
}
