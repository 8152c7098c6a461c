use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{commit, db_error, scoped};
use crate::repository::RecoveryCodeRepository;
use crate::tenant::Partition;
use crate::DashboardError;

#[derive(Clone)]
pub struct PostgresRecoveryCodeRepository {
    pool: PgPool,
}

impl PostgresRecoveryCodeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecoveryCodeRepository for PostgresRecoveryCodeRepository {
    async fn replace_codes(
        &self,
        partition: &Partition,
        user_id: Uuid,
        code_hashes: &[String],
    ) -> Result<(), DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        sqlx::query("DELETE FROM recovery_codes WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("delete_recovery_codes", e))?;

        sqlx::query(
            "INSERT INTO recovery_codes (user_id, code_hash) \
             SELECT $1, code_hash FROM UNNEST($2::text[]) AS code_hash",
        )
        .bind(user_id)
        .bind(code_hashes)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("insert_recovery_codes", e))?;
        commit(tx).await
    }

    async fn consume_code(
        &self,
        partition: &Partition,
        user_id: Uuid,
        code_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        // Single conditional UPDATE: of two concurrent submissions only one
        // sees `used_at IS NULL`.
        let consumed: Option<i64> = sqlx::query_scalar(
            "UPDATE recovery_codes SET used_at = $3 \
             WHERE id = (SELECT id FROM recovery_codes \
                         WHERE user_id = $1 AND code_hash = $2 AND used_at IS NULL \
                         LIMIT 1 FOR UPDATE SKIP LOCKED) \
               AND used_at IS NULL \
             RETURNING id",
        )
        .bind(user_id)
        .bind(code_hash)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("consume_recovery_code", e))?;
        commit(tx).await?;

        Ok(consumed.is_some())
    }

    async fn count_unused(
        &self,
        partition: &Partition,
        user_id: Uuid,
    ) -> Result<u64, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM recovery_codes WHERE user_id = $1 AND used_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("count_recovery_codes", e))?;
        commit(tx).await?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn delete_user_codes(
        &self,
        partition: &Partition,
        user_id: Uuid,
    ) -> Result<(), DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        sqlx::query("DELETE FROM recovery_codes WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("delete_recovery_codes", e))?;
        commit(tx).await
    }
}
