use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::tenant::Partition;
use crate::DashboardError;

/// A stored password reset token. Only the SHA-256 hash of the token is kept.
#[derive(Debug, Clone)]
pub struct PasswordResetToken {
    pub token_hash: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl PasswordResetToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && now < self.expires_at
    }
}

#[async_trait]
pub trait PasswordResetRepository: Send + Sync {
    async fn create_reset_token(
        &self,
        partition: &Partition,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<PasswordResetToken, DashboardError>;

    async fn find_reset_token(
        &self,
        partition: &Partition,
        token_hash: &str,
    ) -> Result<Option<PasswordResetToken>, DashboardError>;

    /// Marks the token used if it is unused and unexpired at `now`, returning
    /// the owning user. A token can be consumed once.
    async fn consume_reset_token(
        &self,
        partition: &Partition,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>, DashboardError>;

    async fn prune_expired(
        &self,
        partition: &Partition,
        now: DateTime<Utc>,
    ) -> Result<u64, DashboardError>;
}
