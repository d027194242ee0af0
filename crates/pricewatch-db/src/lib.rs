//! Postgres persistence for pricewatch: product links, price history and
//! scrape runs.
//!
//! All queries are runtime-checked (`sqlx::query*`), so building the crate
//! does not need a live database.

pub mod price_history;
pub mod product_links;
pub mod scrape_runs;

use std::time::Duration;

use pricewatch_core::AppConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

pub use price_history::{
    list_price_history, record_failure, record_price, NewPriceRecord, PriceHistoryRow, PriceStats,
};
pub use product_links::{
    get_product_link, insert_product, insert_product_link, list_active_product_links,
    ProductLinkRow,
};
pub use scrape_runs::{
    complete_scrape_run, create_scrape_run, fail_scrape_run, get_scrape_run, start_scrape_run,
    ScrapeRunCounts, ScrapeRunRow,
};

// Relative to this crate's manifest: <workspace>/migrations.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

/// Connection pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 1,
            acquire_timeout_secs: 10,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("record not found")]
    NotFound,
    #[error("scrape run {id} is not in status '{expected_status}'")]
    InvalidScrapeRunTransition {
        id: i64,
        expected_status: &'static str,
    },
    #[error("negative price {0} cannot be recorded")]
    NegativePrice(rust_decimal::Decimal),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Opens a Postgres pool for `database_url`.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if no connection can be established within the
/// acquire timeout.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await?;
    tracing::debug!(
        max_connections = config.max_connections,
        "database pool ready"
    );
    Ok(pool)
}

/// Applies pending migrations and returns how many were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if a migration fails or the
/// migration bookkeeping table cannot be read.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    use sqlx::migrate::MigrateError;

    let before = successful_migrations(pool)
        .await
        .map_err(MigrateError::Execute)?;
    MIGRATOR.run(pool).await?;
    let after = successful_migrations(pool)
        .await
        .map_err(MigrateError::Execute)?;

    let applied = usize::try_from(after.saturating_sub(before)).unwrap_or(0);
    tracing::info!(applied, "migrations up to date");
    Ok(applied)
}

// SQLSTATE for a relation that does not exist.
const UNDEFINED_TABLE: &str = "42P01";

async fn successful_migrations(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success")
        .fetch_one(pool)
        .await;
    zero_if_table_missing(count)
}

/// A fresh database has no `_sqlx_migrations` table yet; that reads as zero.
/// Any other failure is returned unchanged.
fn zero_if_table_missing(count: Result<i64, sqlx::Error>) -> Result<i64, sqlx::Error> {
    match count {
        Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some(UNDEFINED_TABLE) => Ok(0),
        other => other,
    }
}

/// Round-trips `SELECT 1` to check the pool can reach the server.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pool_is_small() {
        let config = PoolConfig::default();

        assert_eq!(config.max_connections, 5);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.acquire_timeout_secs, 10);
    }

    #[test]
    fn migration_count_passes_through_values() {
        assert_eq!(zero_if_table_missing(Ok(3)).unwrap(), 3);
    }

    #[test]
    fn migration_count_propagates_connection_errors() {
        let result = zero_if_table_missing(Err(sqlx::Error::PoolTimedOut));
        assert!(matches!(result, Err(sqlx::Error::PoolTimedOut)));

        let result = zero_if_table_missing(Err(sqlx::Error::RowNotFound));
        assert!(matches!(result, Err(sqlx::Error::RowNotFound)));
    }
}
