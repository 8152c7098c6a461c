//! In-memory session storage.
//!
//! Suitable for development, testing, and single-instance deployments.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::repository::SessionRepository;
use super::{Session, SessionData};
use crate::crypto::{DEFAULT_TOKEN_LENGTH, generate_token};
use crate::mfa::MfaState;
use crate::tenant::Partition;
use crate::DashboardError;

/// Sessions are lost when the process restarts.
#[derive(Clone, Default)]
pub struct InMemorySessionRepository {
    sessions: Arc<RwLock<HashMap<String, SessionData>>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_error() -> DashboardError {
        DashboardError::Internal("session store lock poisoned".to_owned())
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn create(&self, data: SessionData) -> Result<String, DashboardError> {
        let session_id = generate_token(DEFAULT_TOKEN_LENGTH);

        self.sessions
            .write()
            .map_err(|_| Self::lock_error())?
            .insert(session_id.clone(), data);

        Ok(session_id)
    }

    async fn find(&self, session_id: &str) -> Result<Option<Session>, DashboardError> {
        let sessions = self.sessions.read().map_err(|_| Self::lock_error())?;

        Ok(sessions
            .get(session_id)
            .map(|data| Session::new(session_id.to_owned(), data.clone())))
    }

    async fn update_state(&self, session_id: &str, state: MfaState) -> Result<(), DashboardError> {
        let mut sessions = self.sessions.write().map_err(|_| Self::lock_error())?;
        let data = sessions.get_mut(session_id).ok_or(DashboardError::NotFound)?;
        data.state = state;
        Ok(())
    }

    async fn destroy(&self, session_id: &str) -> Result<(), DashboardError> {
        self.sessions
            .write()
            .map_err(|_| Self::lock_error())?
            .remove(session_id);

        Ok(())
    }

    #[allow(clippy::significant_drop_tightening)]
    async fn destroy_user_sessions(
        &self,
        partition: &Partition,
        user_id: Uuid,
    ) -> Result<u64, DashboardError> {
        let mut sessions = self.sessions.write().map_err(|_| Self::lock_error())?;
        let before = sessions.len();
        sessions.retain(|_, data| !(data.user_id == user_id && &data.partition == partition));
        Ok((before - sessions.len()) as u64)
    }

    #[allow(clippy::significant_drop_tightening)]
    async fn prune_expired(&self, now: DateTime<Utc>) -> Result<u64, DashboardError> {
        let mut sessions = self.sessions.write().map_err(|_| Self::lock_error())?;

        let before_count = sessions.len();
        sessions.retain(|_, data| data.expires_at > now);

        let pruned = before_count.saturating_sub(sessions.len());
        Ok(u64::try_from(pruned).unwrap_or(u64::MAX))
    }
}
