use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::store::{RateLimitInfo, RateLimitStore};
use crate::DashboardError;

/// `PostgreSQL`-backed rate limit store.
///
/// Shared by every server process. Counters live in `public.rate_limits`,
/// created by the public migrations:
///
/// ```sql
/// CREATE TABLE public.rate_limits (
///     key VARCHAR(255) PRIMARY KEY,
///     attempts INTEGER NOT NULL DEFAULT 1,
///     reset_at TIMESTAMPTZ NOT NULL,
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE INDEX idx_rate_limits_reset_at ON public.rate_limits(reset_at);
/// ```
#[derive(Clone)]
pub struct PostgresRateLimitStore {
    pool: PgPool,
}

impl PostgresRateLimitStore {
    /// Creates a new `PostgreSQL` rate limit store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RateLimitRow {
    attempts: i32,
    reset_at: DateTime<Utc>,
}

#[async_trait]
impl RateLimitStore for PostgresRateLimitStore {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn increment(&self, key: &str, window_secs: u64) -> Result<RateLimitInfo, DashboardError> {
        let window_interval = format!("{window_secs} seconds");

        // Use UPSERT to atomically increment or create
        let row: RateLimitRow = sqlx::query_as(
            r"
            INSERT INTO public.rate_limits (key, attempts, reset_at, updated_at)
            VALUES ($1, 1, NOW() + $2::interval, NOW())
            ON CONFLICT (key) DO UPDATE SET
                attempts = CASE
                    WHEN rate_limits.reset_at <= NOW() THEN 1
                    ELSE rate_limits.attempts + 1
                END,
                reset_at = CASE
                    WHEN rate_limits.reset_at <= NOW() THEN NOW() + $2::interval
                    ELSE rate_limits.reset_at
                END,
                updated_at = NOW()
            RETURNING attempts, reset_at
            ",
        )
        .bind(key)
        .bind(&window_interval)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            log::error!(target: "ledgerdash", "msg=\"database error\", operation=\"rate_limit_increment\", error=\"{e}\"");
            DashboardError::Database(e.to_string())
        })?;

        Ok(RateLimitInfo {
            attempts: u32::try_from(row.attempts).unwrap_or(u32::MAX),
            reset_at: row.reset_at,
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn prune_expired(&self) -> Result<u64, DashboardError> {
        let result = sqlx::query("DELETE FROM public.rate_limits WHERE reset_at <= NOW()")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                log::error!(target: "ledgerdash", "msg=\"database error\", operation=\"rate_limit_prune\", error=\"{e}\"");
                DashboardError::Database(e.to_string())
            })?;

        Ok(result.rows_affected())
    }
}
