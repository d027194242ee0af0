use thiserror::Error;

/// Why a piece of candidate text did not yield a price.
///
/// These never escape the extraction orchestrator; they only decide whether
/// the next selector is tried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceParseError {
    #[error("no digits found in candidate text")]
    NoDigitsFound,

    #[error("malformed number \"{canonical}\"")]
    MalformedNumber { canonical: String },

    #[error("negative price \"{canonical}\"")]
    Negative { canonical: String },
}

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited by {domain}")]
    RateLimited {
        domain: String,
        retry_after_secs: Option<u64>,
    },

    #[error("product page not found ({status}): {url}")]
    NotFound { url: String, status: u16 },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("empty response body from {url}")]
    EmptyBody { url: String },

    #[error("invalid product URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported retailer \"{retailer}\"; supported: {supported}")]
    UnknownRetailer { retailer: String, supported: String },

    #[error("invalid strip pattern \"{pattern}\" for retailer {retailer}: {source}")]
    InvalidRule {
        retailer: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
