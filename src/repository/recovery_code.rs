use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::tenant::Partition;
use crate::DashboardError;

/// Hashed single-use MFA recovery codes.
#[async_trait]
pub trait RecoveryCodeRepository: Send + Sync {
    /// Atomically discards the user's existing codes and stores `code_hashes`.
    async fn replace_codes(
        &self,
        partition: &Partition,
        user_id: Uuid,
        code_hashes: &[String],
    ) -> Result<(), DashboardError>;

    /// Marks a matching unused code as used.
    ///
    /// Returns `true` only for the caller that flipped the code, so two
    /// concurrent submissions of the same code succeed at most once.
    async fn consume_code(
        &self,
        partition: &Partition,
        user_id: Uuid,
        code_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DashboardError>;

    async fn count_unused(&self, partition: &Partition, user_id: Uuid)
    -> Result<u64, DashboardError>;

    async fn delete_user_codes(
        &self,
        partition: &Partition,
        user_id: Uuid,
    ) -> Result<(), DashboardError>;
}
