use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{Session, SessionData};
use crate::mfa::MfaState;
use crate::tenant::Partition;
use crate::DashboardError;

/// Session storage.
///
/// Implementations:
/// - [`InMemorySessionRepository`](super::InMemorySessionRepository) for tests and single-process use
/// - `PostgresSessionRepository` (feature `sqlx_postgres`) for shared deployments
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Stores a new session and returns its random id.
    async fn create(&self, data: SessionData) -> Result<String, DashboardError>;

    /// Finds a session by id. Expired sessions are returned as stored;
    /// callers check [`Session::is_expired_at`].
    async fn find(&self, session_id: &str) -> Result<Option<Session>, DashboardError>;

    /// Records a new MFA stage for an existing session.
    async fn update_state(&self, session_id: &str, state: MfaState) -> Result<(), DashboardError>;

    async fn destroy(&self, session_id: &str) -> Result<(), DashboardError>;

    /// Destroys every session the user holds in `partition`.
    async fn destroy_user_sessions(
        &self,
        partition: &Partition,
        user_id: Uuid,
    ) -> Result<u64, DashboardError>;

    /// Removes sessions expired at `now` and returns how many were removed.
    async fn prune_expired(&self, now: DateTime<Utc>) -> Result<u64, DashboardError>;
}
