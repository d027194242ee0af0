//! `pricewatch extract`: run a retailer's extraction rules against a saved
//! page and print the result as JSON.

use std::path::Path;

use anyhow::Context;
use pricewatch_scraper::{ExtractionOutcome, RetailerProfile, RetailerProfiles};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ExtractReport<'a> {
    retailer: &'a str,
    #[serde(flatten)]
    outcome: ExtractionOutcome,
    currency: String,
    available: bool,
}

fn build_report<'a>(profile: &'a RetailerProfile, html: &str) -> ExtractReport<'a> {
    ExtractReport {
        retailer: profile.id(),
        outcome: profile.extract(html),
        currency: profile.currency(html),
        available: profile.is_available(html),
    }
}

pub(crate) fn run_extract(
    retailers_path: &Path,
    retailer: &str,
    file: &Path,
) -> anyhow::Result<()> {
    let retailers = pricewatch_core::load_retailers(retailers_path)
        .with_context(|| format!("failed to load {}", retailers_path.display()))?;
    let profiles = RetailerProfiles::from_file(&retailers)?;
    let profile = profiles.get(retailer)?;

    let html = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let report = build_report(profile, &html);
    if !report.outcome.is_found() {
        tracing::warn!(
            retailer = profile.id(),
            file = %file.display(),
            "no selector yielded a price"
        );
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
