use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{commit, db_error, scoped};
use crate::repository::{AuditEntry, AuditEventType, AuditLogRepository, NewAuditEntry};
use crate::tenant::Partition;
use crate::DashboardError;

/// Writes to the partition's `audit_log` table. The tenant migrations grant
/// no UPDATE or DELETE path through this type.
#[derive(Clone)]
pub struct PostgresAuditLogRepository {
    pool: PgPool,
}

impl PostgresAuditLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct AuditEntryRecord {
    id: Uuid,
    timestamp: DateTime<Utc>,
    user_id: Option<Uuid>,
    user_email: Option<String>,
    event_type: String,
    detail: String,
    ip_address: Option<String>,
    user_agent: String,
}

impl TryFrom<AuditEntryRecord> for AuditEntry {
    type Error = DashboardError;

    fn try_from(row: AuditEntryRecord) -> Result<Self, Self::Error> {
        let event_type = AuditEventType::parse(&row.event_type).ok_or_else(|| {
            DashboardError::Database(format!("unknown audit event type '{}'", row.event_type))
        })?;
        Ok(AuditEntry {
            id: row.id,
            timestamp: row.timestamp,
            user_id: row.user_id,
            user_email: row.user_email,
            event_type,
            detail: row.detail,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
        })
    }
}

#[async_trait]
impl AuditLogRepository for PostgresAuditLogRepository {
    async fn append(
        &self,
        partition: &Partition,
        entry: NewAuditEntry,
    ) -> Result<AuditEntry, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let row: AuditEntryRecord = sqlx::query_as(
            "WITH inserted AS ( \
                 INSERT INTO audit_log (id, timestamp, user_id, event_type, detail, ip_address, user_agent) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 RETURNING id, timestamp, user_id, event_type, detail, ip_address, user_agent \
             ) \
             SELECT i.id, i.timestamp, i.user_id, u.email AS user_email, i.event_type, \
                    i.detail, i.ip_address, i.user_agent \
             FROM inserted i LEFT JOIN users u ON u.id = i.user_id",
        )
        .bind(Uuid::new_v4())
        .bind(entry.timestamp)
        .bind(entry.user_id)
        .bind(entry.event_type.as_str())
        .bind(&entry.detail)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("append_audit_entry", e))?;
        commit(tx).await?;

        row.try_into()
    }

    async fn recent(
        &self,
        partition: &Partition,
        limit: u32,
    ) -> Result<Vec<AuditEntry>, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let rows: Vec<AuditEntryRecord> = sqlx::query_as(
            "SELECT a.id, a.timestamp, a.user_id, u.email AS user_email, a.event_type, \
                    a.detail, a.ip_address, a.user_agent \
             FROM audit_log a LEFT JOIN users u ON u.id = a.user_id \
             ORDER BY a.timestamp DESC LIMIT $1",
        )
        .bind(i64::from(limit))
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| db_error("recent_audit_entries", e))?;
        commit(tx).await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
