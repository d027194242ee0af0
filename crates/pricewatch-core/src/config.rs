use std::path::PathBuf;

use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Browser-like default so retailers serve the same markup a shopper sees.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36";

/// Reads `.env` (if present) and then the process environment.
///
/// # Errors
///
/// Returns `ConfigError` if `DATABASE_URL` is unset or a value does not parse.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Like [`load_app_config`] but ignores `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if `DATABASE_URL` is unset or a value does not parse.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

// `lookup` is injected so tests can use a plain map instead of the process env.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let text = |var: &str, default: &str| lookup(var).unwrap_or_else(|_| default.to_owned());
    let number = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = text(var, default);
        raw.trim().parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_owned(),
            reason: format!("'{raw}': {e}"),
        })
    };
    let narrow = |var: &str, value: u64| -> Result<u32, ConfigError> {
        u32::try_from(value).map_err(|_| ConfigError::InvalidEnvVar {
            var: var.to_owned(),
            reason: format!("{value} is out of range"),
        })
    };

    let database_url = lookup("DATABASE_URL")
        .map_err(|_| ConfigError::MissingEnvVar("DATABASE_URL".to_owned()))?;

    let env = parse_environment(&text("PRICEWATCH_ENV", "development"))?;
    let log_level = text("PRICEWATCH_LOG_LEVEL", "info");
    let retailers_path = PathBuf::from(text(
        "PRICEWATCH_RETAILERS_PATH",
        "./config/retailers.yaml",
    ));

    let db_max_connections = narrow(
        "PRICEWATCH_DB_MAX_CONNECTIONS",
        number("PRICEWATCH_DB_MAX_CONNECTIONS", "5")?,
    )?;
    let db_min_connections = narrow(
        "PRICEWATCH_DB_MIN_CONNECTIONS",
        number("PRICEWATCH_DB_MIN_CONNECTIONS", "1")?,
    )?;
    if db_min_connections > db_max_connections {
        return Err(ConfigError::InvalidEnvVar {
            var: "PRICEWATCH_DB_MIN_CONNECTIONS".to_owned(),
            reason: format!(
                "min connections ({db_min_connections}) exceeds max connections ({db_max_connections})"
            ),
        });
    }

    let scraper_max_concurrent_links = usize::try_from(number(
        "PRICEWATCH_SCRAPER_MAX_CONCURRENT_LINKS",
        "4",
    )?)
    .unwrap_or(usize::MAX);

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        retailers_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs: number("PRICEWATCH_DB_ACQUIRE_TIMEOUT_SECS", "10")?,
        scraper_request_timeout_secs: number("PRICEWATCH_SCRAPER_REQUEST_TIMEOUT_SECS", "30")?,
        scraper_user_agent: text("PRICEWATCH_SCRAPER_USER_AGENT", DEFAULT_USER_AGENT),
        scraper_max_concurrent_links,
        scraper_inter_request_delay_ms: number("PRICEWATCH_SCRAPER_INTER_REQUEST_DELAY_MS", "250")?,
        scraper_max_retries: narrow(
            "PRICEWATCH_SCRAPER_MAX_RETRIES",
            number("PRICEWATCH_SCRAPER_MAX_RETRIES", "2")?,
        )?,
        scraper_retry_backoff_base_secs: number("PRICEWATCH_SCRAPER_RETRY_BACKOFF_BASE_SECS", "1")?,
    })
}

// Accepts the short forms `dev` and `prod` too.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "development" | "dev" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" | "prod" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "PRICEWATCH_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
