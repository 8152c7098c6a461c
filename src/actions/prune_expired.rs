//! Removes expired sessions, rate-limit windows, trusted devices and
//! password reset tokens. Run periodically (e.g., via cron) to keep the
//! tables from growing without bound.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::rate_limit::RateLimitStore;
use crate::repository::{PasswordResetRepository, TrustedDeviceRepository};
use crate::session::SessionRepository;
use crate::tenant::Partition;
use crate::DashboardError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneResult {
    pub sessions: u64,
    pub rate_limits: u64,
    pub trusted_devices: u64,
    pub password_reset_tokens: u64,
}

impl PruneResult {
    pub fn total(&self) -> u64 {
        self.sessions + self.rate_limits + self.trusted_devices + self.password_reset_tokens
    }
}

pub struct PruneExpiredAction {
    sessions: Arc<dyn SessionRepository>,
    rate_limits: Arc<dyn RateLimitStore>,
    devices: Arc<dyn TrustedDeviceRepository>,
    password_resets: Arc<dyn PasswordResetRepository>,
}

impl PruneExpiredAction {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        rate_limits: Arc<dyn RateLimitStore>,
        devices: Arc<dyn TrustedDeviceRepository>,
        password_resets: Arc<dyn PasswordResetRepository>,
    ) -> Self {
        Self {
            sessions,
            rate_limits,
            devices,
            password_resets,
        }
    }

    /// Prunes the shared stores once, then each partition in `partitions`.
    ///
    /// # Returns
    ///
    /// - `Ok(result)` - counts of removed rows by kind
    /// - `Err(_)` - database errors; partitions after the failing one are skipped
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "prune_expired", skip_all, err)
    )]
    pub async fn execute(
        &self,
        partitions: &[Partition],
        now: DateTime<Utc>,
    ) -> Result<PruneResult, DashboardError> {
        let mut result = PruneResult {
            sessions: self.sessions.prune_expired(now).await?,
            rate_limits: self.rate_limits.prune_expired().await?,
            ..PruneResult::default()
        };

        for partition in partitions {
            result.trusted_devices += self.devices.prune_expired(partition, now).await?;
            result.password_reset_tokens +=
                self.password_resets.prune_expired(partition, now).await?;
        }

        log::info!(
            target: "ledgerdash",
            "msg=\"expired rows pruned\", partitions={}, sessions={}, rate_limits={}, trusted_devices={}, password_reset_tokens={}",
            partitions.len(),
            result.sessions,
            result.rate_limits,
            result.trusted_devices,
            result.password_reset_tokens
        );

        Ok(result)
    }
}
