pub mod client;
pub mod error;
pub mod extract;
mod jsonld;
pub mod pipeline;
pub mod price;
pub mod profile;
mod rate_limit;
pub mod signals;

pub use client::{FetchedPage, PageClient};
pub use error::{PriceParseError, ScraperError};
pub use extract::{extract_price, extract_with, CandidateRules, ExtractionOutcome, SelectorList};
pub use pipeline::{scrape_link, scrape_page, PRICE_NOT_FOUND};
pub use price::{parse_price, parse_price_with, ParseOptions};
pub use profile::{RetailerProfile, RetailerProfiles};
pub use signals::{detect_currency, is_available};
