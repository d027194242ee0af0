//! Selector-driven price extraction.
//!
//! Given an HTML document and an ordered selector list, tries each selector
//! in turn and returns the first price that parses. A selector that matches
//! nothing, or matches an element whose text is not a price, simply hands
//! over to the next one. Running out of selectors is an ordinary
//! [`ExtractionOutcome::NotFound`], not an error.
//!
//! Extraction is synchronous and holds no shared state; the parsed document
//! lives only for the duration of one call.

use std::borrow::Cow;

use pricewatch_core::SeparatorPolicy;
use regex::Regex;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use crate::jsonld::find_offer_price;
use crate::price::{parse_price_with, ParseOptions};

/// Result of one extraction attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "price", rename_all = "snake_case")]
pub enum ExtractionOutcome {
    Found(Decimal),
    NotFound,
}

impl ExtractionOutcome {
    #[must_use]
    pub fn price(self) -> Option<Decimal> {
        match self {
            ExtractionOutcome::Found(price) => Some(price),
            ExtractionOutcome::NotFound => None,
        }
    }

    #[must_use]
    pub fn is_found(self) -> bool {
        matches!(self, ExtractionOutcome::Found(_))
    }
}

/// One selector string and its compiled form.
///
/// `compiled` is `None` when the string is not valid CSS; such entries never
/// match.
#[derive(Debug, Clone)]
struct SelectorEntry {
    raw: String,
    compiled: Option<Selector>,
}

/// An ordered, pre-compiled list of price selectors. Position is priority.
#[derive(Debug, Clone, Default)]
pub struct SelectorList {
    entries: Vec<SelectorEntry>,
}

impl SelectorList {
    /// Compiles every selector, keeping order.
    ///
    /// Invalid selectors are kept as non-matching placeholders, so a typo in
    /// one entry never disables the rest of the list.
    pub fn parse<I, S>(selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = selectors
            .into_iter()
            .map(|s| {
                let raw = s.as_ref().trim().to_owned();
                let compiled = match Selector::parse(&raw) {
                    Ok(selector) => Some(selector),
                    Err(e) => {
                        tracing::debug!(selector = %raw, error = %e, "invalid CSS selector");
                        None
                    }
                };
                SelectorEntry { raw, compiled }
            })
            .collect();
        Self { entries }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The selector strings, in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.raw.as_str())
    }
}

/// Retailer-specific treatment of candidate text.
#[derive(Debug, Clone, Default)]
pub struct CandidateRules {
    pub parse: ParseOptions,
    /// Patterns removed from visible candidate text before parsing.
    pub strip: Vec<Regex>,
}

impl CandidateRules {
    /// Removes every `strip` pattern match from `text`.
    #[must_use]
    pub fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        let mut out = Cow::Borrowed(text);
        for pattern in &self.strip {
            if let Cow::Owned(replaced) = pattern.replace_all(&out, "") {
                out = Cow::Owned(replaced);
            }
        }
        out
    }
}

/// Where a candidate string came from.
///
/// Attribute and JSON-LD values are machine formatted (`"1234.5"`), so they
/// always use a dot decimal regardless of the retailer's display policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CandidateSource {
    VisibleText,
    Structured,
}

/// Extracts a price using default rules.
///
/// Selectors are compiled on every call; use [`SelectorList::parse`] and
/// [`extract_with`] when the same list is applied to many pages.
#[must_use]
pub fn extract_price<S: AsRef<str>>(html: &str, selectors: &[S]) -> ExtractionOutcome {
    if selectors.is_empty() {
        return ExtractionOutcome::NotFound;
    }
    extract_with(html, &SelectorList::parse(selectors), &CandidateRules::default())
}

/// Extracts a price, trying `selectors` in order.
///
/// For each selector the first matching element is taken; its candidate text
/// is cleaned with `rules` and parsed. The first successful parse wins and no
/// later selector is consulted.
#[must_use]
pub fn extract_with(
    html: &str,
    selectors: &SelectorList,
    rules: &CandidateRules,
) -> ExtractionOutcome {
    if selectors.is_empty() {
        return ExtractionOutcome::NotFound;
    }

    let document = Html::parse_document(html);

    for entry in &selectors.entries {
        let Some(selector) = &entry.compiled else {
            continue;
        };

        let Some(element) = document.select(selector).next() else {
            tracing::debug!(selector = %entry.raw, "no element matched");
            continue;
        };

        let Some((candidate, source)) = candidate_text(element) else {
            tracing::debug!(selector = %entry.raw, "matched element has no candidate text");
            continue;
        };

        let options = match source {
            CandidateSource::VisibleText => rules.parse,
            CandidateSource::Structured => ParseOptions::with_policy(SeparatorPolicy::Decimal),
        };
        let cleaned = match source {
            CandidateSource::VisibleText => rules.apply(&candidate),
            CandidateSource::Structured => Cow::Borrowed(candidate.as_str()),
        };

        match parse_price_with(&cleaned, options) {
            Ok(price) => {
                tracing::debug!(selector = %entry.raw, %price, "extracted price");
                return ExtractionOutcome::Found(price);
            }
            Err(e) => {
                tracing::debug!(
                    selector = %entry.raw,
                    candidate = %cleaned,
                    error = %e,
                    "candidate text is not a price"
                );
            }
        }
    }

    ExtractionOutcome::NotFound
}

/// Candidate text for a matched element.
///
/// - `<meta>`: the `content` attribute.
/// - `<script type="application/ld+json">`: the first schema.org offer price.
/// - anything else: the trimmed text content, falling back to a `content`
///   attribute (microdata such as `<span itemprop="price" content="9.99">`)
///   when the element has no text.
fn candidate_text(element: ElementRef<'_>) -> Option<(String, CandidateSource)> {
    let node = element.value();

    match node.name() {
        "meta" => structured(node.attr("content")),
        "script" if is_json_ld(node.attr("type")) => {
            let raw: String = element.text().collect();
            find_offer_price(&raw).map(|p| (p, CandidateSource::Structured))
        }
        _ => {
            let text: String = element.text().collect();
            let text = text.trim();
            if text.is_empty() {
                structured(node.attr("content"))
            } else {
                Some((text.to_owned(), CandidateSource::VisibleText))
            }
        }
    }
}

fn structured(value: Option<&str>) -> Option<(String, CandidateSource)> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| (v.to_owned(), CandidateSource::Structured))
}

fn is_json_ld(script_type: Option<&str>) -> bool {
    script_type.is_some_and(|t| t.trim().eq_ignore_ascii_case("application/ld+json"))
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
