use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{commit, db_error, scoped};
use crate::repository::{PasswordResetRepository, PasswordResetToken};
use crate::tenant::Partition;
use crate::DashboardError;

#[derive(Clone)]
pub struct PostgresPasswordResetRepository {
    pool: PgPool,
}

impl PostgresPasswordResetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct ResetTokenRecord {
    token_hash: String,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
}

impl From<ResetTokenRecord> for PasswordResetToken {
    fn from(row: ResetTokenRecord) -> Self {
        PasswordResetToken {
            token_hash: row.token_hash,
            user_id: row.user_id,
            created_at: row.created_at,
            expires_at: row.expires_at,
            used_at: row.used_at,
        }
    }
}

#[async_trait]
impl PasswordResetRepository for PostgresPasswordResetRepository {
    async fn create_reset_token(
        &self,
        partition: &Partition,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<PasswordResetToken, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let row: ResetTokenRecord = sqlx::query_as(
            "INSERT INTO password_reset_tokens (token_hash, user_id, expires_at) \
             VALUES ($1, $2, $3) \
             RETURNING token_hash, user_id, created_at, expires_at, used_at",
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("create_reset_token", e))?;
        commit(tx).await?;

        Ok(row.into())
    }

    async fn find_reset_token(
        &self,
        partition: &Partition,
        token_hash: &str,
    ) -> Result<Option<PasswordResetToken>, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let row: Option<ResetTokenRecord> = sqlx::query_as(
            "SELECT token_hash, user_id, created_at, expires_at, used_at \
             FROM password_reset_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("find_reset_token", e))?;
        commit(tx).await?;

        Ok(row.map(Into::into))
    }

    async fn consume_reset_token(
        &self,
        partition: &Partition,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let user_id: Option<Uuid> = sqlx::query_scalar(
            "UPDATE password_reset_tokens SET used_at = $2 \
             WHERE token_hash = $1 AND used_at IS NULL AND expires_at > $2 \
             RETURNING user_id",
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("consume_reset_token", e))?;
        commit(tx).await?;

        Ok(user_id)
    }

    async fn prune_expired(
        &self,
        partition: &Partition,
        now: DateTime<Utc>,
    ) -> Result<u64, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("prune_reset_tokens", e))?;
        commit(tx).await?;

        Ok(result.rows_affected())
    }
}
