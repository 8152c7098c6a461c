use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::db_error;
use crate::crypto::{DEFAULT_TOKEN_LENGTH, generate_token, hash_token};
use crate::mfa::MfaState;
use crate::permission::Role;
use crate::session::{Session, SessionData, SessionRepository};
use crate::tenant::Partition;
use crate::DashboardError;

/// Sessions in `public.sessions`, keyed by the SHA-256 of the session id so
/// a database dump cannot be replayed as cookies.
#[derive(Clone)]
pub struct PostgresSessionRepository {
    pool: PgPool,
}

impl PostgresSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct SessionRecord {
    partition: String,
    user_id: Uuid,
    email: String,
    role: String,
    state: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<SessionRecord> for SessionData {
    type Error = DashboardError;

    fn try_from(row: SessionRecord) -> Result<Self, Self::Error> {
        let partition = Partition::new(row.partition)
            .map_err(|e| DashboardError::Database(format!("session partition: {e}")))?;
        let role = Role::parse(&row.role)
            .ok_or_else(|| DashboardError::Database(format!("unknown role '{}'", row.role)))?;
        let state: MfaState = serde_json::from_str(&row.state)
            .map_err(|e| DashboardError::Database(format!("session state: {e}")))?;

        Ok(SessionData {
            partition,
            user_id: row.user_id,
            email: row.email,
            role,
            state,
            created_at: row.created_at,
            expires_at: row.expires_at,
        })
    }
}

fn encode_state(state: &MfaState) -> Result<String, DashboardError> {
    serde_json::to_string(state).map_err(|e| DashboardError::Internal(format!("session state: {e}")))
}

#[async_trait]
impl SessionRepository for PostgresSessionRepository {
    async fn create(&self, data: SessionData) -> Result<String, DashboardError> {
        let session_id = generate_token(DEFAULT_TOKEN_LENGTH);

        sqlx::query(
            "INSERT INTO public.sessions \
             (id_hash, partition, user_id, email, role, state, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(hash_token(&session_id))
        .bind(data.partition.as_str())
        .bind(data.user_id)
        .bind(&data.email)
        .bind(data.role.as_str())
        .bind(encode_state(&data.state)?)
        .bind(data.created_at)
        .bind(data.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("create_session", e))?;

        Ok(session_id)
    }

    async fn find(&self, session_id: &str) -> Result<Option<Session>, DashboardError> {
        let row: Option<SessionRecord> = sqlx::query_as(
            "SELECT partition, user_id, email, role, state, created_at, expires_at \
             FROM public.sessions WHERE id_hash = $1",
        )
        .bind(hash_token(session_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find_session", e))?;

        row.map(|r| Ok(Session::new(session_id.to_owned(), r.try_into()?)))
            .transpose()
    }

    async fn update_state(&self, session_id: &str, state: MfaState) -> Result<(), DashboardError> {
        let result = sqlx::query("UPDATE public.sessions SET state = $2 WHERE id_hash = $1")
            .bind(hash_token(session_id))
            .bind(encode_state(&state)?)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("update_session_state", e))?;

        if result.rows_affected() == 0 {
            return Err(DashboardError::NotFound);
        }
        Ok(())
    }

    async fn destroy(&self, session_id: &str) -> Result<(), DashboardError> {
        sqlx::query("DELETE FROM public.sessions WHERE id_hash = $1")
            .bind(hash_token(session_id))
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("destroy_session", e))?;
        Ok(())
    }

    async fn destroy_user_sessions(
        &self,
        partition: &Partition,
        user_id: Uuid,
    ) -> Result<u64, DashboardError> {
        let result =
            sqlx::query("DELETE FROM public.sessions WHERE partition = $1 AND user_id = $2")
                .bind(partition.as_str())
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map_err(|e| db_error("destroy_user_sessions", e))?;
        Ok(result.rows_affected())
    }

    async fn prune_expired(&self, now: DateTime<Utc>) -> Result<u64, DashboardError> {
        let result = sqlx::query("DELETE FROM public.sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("prune_sessions", e))?;
        Ok(result.rows_affected())
    }
}
