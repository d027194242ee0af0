use std::time::{Duration, Instant};

use rand::seq::IndexedRandom;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, UPGRADE_INSECURE_REQUESTS,
};
use reqwest::{Client, StatusCode};

use crate::error::ScraperError;
use crate::rate_limit::retry_with_backoff;

/// Desktop browser User-Agents used on retries after the configured one has
/// been tried.
const BROWSER_USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36 Edg/119.0.0.0",
];

/// A fetched product page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    pub html: String,
    /// Wall-clock time of the successful attempt, excluding backoff sleeps.
    pub response_time_ms: u64,
}

/// HTTP client for retailer product pages.
///
/// Sends browser-like headers, decodes gzip and brotli bodies, and maps
/// HTTP statuses to typed errors. Transient failures (network errors, 429,
/// 5xx) are retried with exponential backoff; each retry picks a browser
/// User-Agent at random.
pub struct PageClient {
    client: Client,
    user_agent: String,
    /// Maximum number of retry attempts after the first failure.
    max_retries: u32,
    /// Base delay in seconds for exponential backoff: `backoff_base_secs * 2^attempt`.
    backoff_base_secs: u64,
}

impl PageClient {
    /// Creates a `PageClient` with configured timeout, preferred `User-Agent`,
    /// and retry policy.
    ///
    /// `max_retries` is the number of additional attempts after the first
    /// failure for retriable errors. Set to `0` to disable retries.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed (e.g., invalid TLS config).
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_secs: u64,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .default_headers(default_headers())
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self {
            client,
            user_agent: user_agent.to_owned(),
            max_retries,
            backoff_base_secs,
        })
    }

    /// Fetches a product page, retrying transient failures.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::InvalidUrl`]: `url` is not an absolute http(s) URL.
    /// - [`ScraperError::NotFound`]: HTTP 404 or 410 (not retried).
    /// - [`ScraperError::RateLimited`]: HTTP 429 after all retries exhausted.
    /// - [`ScraperError::UnexpectedStatus`]: any other non-2xx status; 5xx
    ///   responses are retried first.
    /// - [`ScraperError::EmptyBody`]: a 2xx response with a blank body.
    /// - [`ScraperError::Http`]: network or TLS failure after all retries
    ///   exhausted.
    pub async fn fetch_html(&self, url: &str) -> Result<FetchedPage, ScraperError> {
        let parsed = validate_url(url)?;
        let domain = parsed.host_str().unwrap_or(url).to_owned();
        let mut attempt = 0u32;

        retry_with_backoff(self.max_retries, self.backoff_base_secs, || {
            let user_agent = self.user_agent_for(attempt).to_owned();
            attempt += 1;
            let parsed = parsed.clone();
            let domain = domain.clone();
            async move {
                let started = Instant::now();
                let response = self
                    .client
                    .get(parsed.clone())
                    .header(reqwest::header::USER_AGENT, user_agent)
                    .send()
                    .await?;
                let status = response.status();
                let url = parsed.to_string();

                if status == StatusCode::TOO_MANY_REQUESTS {
                    let retry_after_secs = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.trim().parse::<u64>().ok());
                    return Err(ScraperError::RateLimited {
                        domain,
                        retry_after_secs,
                    });
                }

                if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
                    return Err(ScraperError::NotFound {
                        url,
                        status: status.as_u16(),
                    });
                }

                if !status.is_success() {
                    return Err(ScraperError::UnexpectedStatus {
                        status: status.as_u16(),
                        url,
                    });
                }

                let final_url = response.url().to_string();
                let html = response.text().await?;
                if html.trim().is_empty() {
                    return Err(ScraperError::EmptyBody { url });
                }

                let response_time_ms =
                    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                tracing::info!(
                    url = %final_url,
                    status = status.as_u16(),
                    bytes = html.len(),
                    response_time_ms,
                    "fetched product page"
                );

                Ok(FetchedPage {
                    url: final_url,
                    status: status.as_u16(),
                    html,
                    response_time_ms,
                })
            }
        })
        .await
    }

    /// The configured User-Agent on the first attempt, a random browser one
    /// afterwards.
    fn user_agent_for(&self, attempt: u32) -> &str {
        if attempt == 0 {
            return &self.user_agent;
        }
        BROWSER_USER_AGENTS
            .choose(&mut rand::rng())
            .map_or(self.user_agent.as_str(), |ua| *ua)
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("pt-BR,pt;q=0.9,en-US;q=0.8,en;q=0.7"),
    );
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers
}

/// Accepts absolute `http`/`https` URLs with a host.
pub(crate) fn validate_url(url: &str) -> Result<reqwest::Url, ScraperError> {
    let parsed = reqwest::Url::parse(url.trim()).map_err(|e| ScraperError::InvalidUrl {
        url: url.to_owned(),
        reason: e.to_string(),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ScraperError::InvalidUrl {
            url: url.to_owned(),
            reason: format!("unsupported scheme {}", parsed.scheme()),
        });
    }
    if parsed.host_str().is_none() {
        return Err(ScraperError::InvalidUrl {
            url: url.to_owned(),
            reason: "missing host".to_owned(),
        });
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_url_accepts_http_and_https() {
        assert!(validate_url("https://produto.mercadolivre.com.br/MLB-123").is_ok());
        assert!(validate_url("http://localhost:8080/p/1").is_ok());
    }

    #[test]
    fn validate_url_rejects_other_schemes() {
        let err = validate_url("ftp://example.com/file").unwrap_err();
        assert!(matches!(err, ScraperError::InvalidUrl { .. }), "got {err:?}");
    }

    #[test]
    fn validate_url_rejects_relative() {
        assert!(matches!(
            validate_url("/produto/123"),
            Err(ScraperError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn first_attempt_uses_configured_user_agent() {
        let client = PageClient::new(5, "pricewatch-test/0.1", 0, 0).unwrap();
        assert_eq!(client.user_agent_for(0), "pricewatch-test/0.1");
        let rotated = client.user_agent_for(1);
        assert!(BROWSER_USER_AGENTS.iter().any(|ua| *ua == rotated));
    }
}
