use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tenant::Partition;
use crate::DashboardError;

/// A browser that may skip the second factor until `expires_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustedDevice {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub device_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TrustedDevice {
    /// Valid strictly before `expires_at`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[async_trait]
pub trait TrustedDeviceRepository: Send + Sync {
    async fn create_device(
        &self,
        partition: &Partition,
        user_id: Uuid,
        device_hash: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<TrustedDevice, DashboardError>;

    /// Returns a matching device only if it is still valid at `now`.
    async fn find_valid_device(
        &self,
        partition: &Partition,
        user_id: Uuid,
        device_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<TrustedDevice>, DashboardError>;

    async fn delete_user_devices(
        &self,
        partition: &Partition,
        user_id: Uuid,
    ) -> Result<u64, DashboardError>;

    async fn prune_expired(
        &self,
        partition: &Partition,
        now: DateTime<Utc>,
    ) -> Result<u64, DashboardError>;
}
