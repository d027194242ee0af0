//! Database operations for `scrape_runs`.
//!
//! A run moves `queued → running → succeeded | failed`; each transition is
//! guarded on the expected current status.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `scrape_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScrapeRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub trigger_source: String,
    /// Retailer filter the run was started with, if any.
    pub retailer: Option<String>,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub links_total: i32,
    pub links_succeeded: i32,
    pub links_failed: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Per-run link counters written when a run finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapeRunCounts {
    pub total: i32,
    pub succeeded: i32,
    pub failed: i32,
}

const RUN_COLUMNS: &str = "id, public_id, trigger_source, retailer, status, started_at, \
     completed_at, links_total, links_succeeded, links_failed, error_message, created_at";

/// Creates a new scrape run in `queued` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_scrape_run(
    pool: &PgPool,
    trigger_source: &str,
    retailer: Option<&str>,
) -> Result<ScrapeRunRow, DbError> {
    let sql = format!(
        "INSERT INTO scrape_runs (public_id, trigger_source, retailer, status) \
         VALUES ($1, $2, $3, 'queued') \
         RETURNING {RUN_COLUMNS}"
    );

    let row = sqlx::query_as::<_, ScrapeRunRow>(&sql)
        .bind(Uuid::new_v4())
        .bind(trigger_source)
        .bind(retailer)
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Marks a run as `running` and sets `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidScrapeRunTransition`] if the run is not
/// `queued`, or [`DbError::Sqlx`] if the update fails.
pub async fn start_scrape_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scrape_runs \
         SET status = 'running', started_at = NOW() \
         WHERE id = $1 AND status = 'queued'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidScrapeRunTransition {
            id,
            expected_status: "queued",
        });
    }

    Ok(())
}

/// Marks a running run as `succeeded` and stores its counters.
///
/// # Errors
///
/// Returns [`DbError::InvalidScrapeRunTransition`] if the run is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn complete_scrape_run(
    pool: &PgPool,
    id: i64,
    counts: ScrapeRunCounts,
) -> Result<(), DbError> {
    finish(pool, id, "succeeded", counts, None).await
}

/// Marks a running run as `failed` with `error_message` and its counters.
///
/// # Errors
///
/// Returns [`DbError::InvalidScrapeRunTransition`] if the run is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_scrape_run(
    pool: &PgPool,
    id: i64,
    error_message: &str,
    counts: ScrapeRunCounts,
) -> Result<(), DbError> {
    finish(pool, id, "failed", counts, Some(error_message)).await
}

async fn finish(
    pool: &PgPool,
    id: i64,
    status: &str,
    counts: ScrapeRunCounts,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scrape_runs \
         SET status = $1, completed_at = NOW(), \
             links_total = $2, links_succeeded = $3, links_failed = $4, \
             error_message = $5 \
         WHERE id = $6 AND status = 'running'",
    )
    .bind(status)
    .bind(counts.total)
    .bind(counts.succeeded)
    .bind(counts.failed)
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidScrapeRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Fetches a single run by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_scrape_run(pool: &PgPool, id: i64) -> Result<ScrapeRunRow, DbError> {
    let sql = format!("SELECT {RUN_COLUMNS} FROM scrape_runs WHERE id = $1");

    sqlx::query_as::<_, ScrapeRunRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}
