use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{commit, db_error, scoped};
use crate::repository::{TrustedDevice, TrustedDeviceRepository};
use crate::tenant::Partition;
use crate::DashboardError;

#[derive(Clone)]
pub struct PostgresTrustedDeviceRepository {
    pool: PgPool,
}

impl PostgresTrustedDeviceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct TrustedDeviceRecord {
    id: Uuid,
    user_id: Uuid,
    device_hash: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<TrustedDeviceRecord> for TrustedDevice {
    fn from(row: TrustedDeviceRecord) -> Self {
        TrustedDevice {
            id: row.id,
            user_id: row.user_id,
            device_hash: row.device_hash,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

#[async_trait]
impl TrustedDeviceRepository for PostgresTrustedDeviceRepository {
    async fn create_device(
        &self,
        partition: &Partition,
        user_id: Uuid,
        device_hash: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<TrustedDevice, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let row: TrustedDeviceRecord = sqlx::query_as(
            "INSERT INTO trusted_devices (id, user_id, device_hash, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, user_id, device_hash, created_at, expires_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(device_hash)
        .bind(created_at)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("create_trusted_device", e))?;
        commit(tx).await?;

        Ok(row.into())
    }

    async fn find_valid_device(
        &self,
        partition: &Partition,
        user_id: Uuid,
        device_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<TrustedDevice>, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let row: Option<TrustedDeviceRecord> = sqlx::query_as(
            "SELECT id, user_id, device_hash, created_at, expires_at FROM trusted_devices \
             WHERE user_id = $1 AND device_hash = $2 AND expires_at > $3 \
             ORDER BY expires_at DESC LIMIT 1",
        )
        .bind(user_id)
        .bind(device_hash)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("find_trusted_device", e))?;
        commit(tx).await?;

        Ok(row.map(Into::into))
    }

    async fn delete_user_devices(
        &self,
        partition: &Partition,
        user_id: Uuid,
    ) -> Result<u64, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let result = sqlx::query("DELETE FROM trusted_devices WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("delete_trusted_devices", e))?;
        commit(tx).await?;

        Ok(result.rows_affected())
    }

    async fn prune_expired(
        &self,
        partition: &Partition,
        now: DateTime<Utc>,
    ) -> Result<u64, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let result = sqlx::query("DELETE FROM trusted_devices WHERE expires_at <= $1")
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("prune_trusted_devices", e))?;
        commit(tx).await?;

        Ok(result.rows_affected())
    }
}
