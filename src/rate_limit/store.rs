use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::DashboardError;

#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    pub attempts: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitInfo {
    /// Whole seconds until the window resets, rounded up.
    pub fn available_in(&self, now: DateTime<Utc>) -> i64 {
        let millis = (self.reset_at - now).num_milliseconds().max(0);
        (millis + 999) / 1000
    }
}

/// Fixed-window counters shared by every server process.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Adds one attempt. Creates the key, or restarts an elapsed window,
    /// with a count of 1.
    async fn increment(&self, key: &str, window_secs: u64) -> Result<RateLimitInfo, DashboardError>;

    /// Removes counters whose window has elapsed.
    async fn prune_expired(&self) -> Result<u64, DashboardError>;

    /// Clock the store measures windows against.
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Single-process store. Multi-instance deployments use
/// [`PostgresRateLimitStore`](super::PostgresRateLimitStore).
#[derive(Clone)]
pub struct InMemoryStore {
    entries: Arc<RwLock<HashMap<String, RateLimitInfo>>>,
    clock: Clock,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::with_clock(Utc::now)
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore").finish_non_exhaustive()
    }
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `clock` instead of the system time.
    #[must_use]
    pub fn with_clock(clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock: Arc::new(clock),
        }
    }

    fn lock_error() -> DashboardError {
        DashboardError::Internal("rate limit store lock poisoned".to_owned())
    }
}

#[async_trait]
#[allow(clippy::significant_drop_tightening)]
impl RateLimitStore for InMemoryStore {
    async fn increment(&self, key: &str, window_secs: u64) -> Result<RateLimitInfo, DashboardError> {
        let now = self.now();
        let window = chrono::Duration::seconds(i64::try_from(window_secs).unwrap_or(i64::MAX));

        let mut entries = self.entries.write().map_err(|_| Self::lock_error())?;

        let info = entries
            .entry(key.to_owned())
            .and_modify(|info| {
                if info.reset_at <= now {
                    info.attempts = 1;
                    info.reset_at = now + window;
                } else {
                    info.attempts = info.attempts.saturating_add(1);
                }
            })
            .or_insert_with(|| RateLimitInfo {
                attempts: 1,
                reset_at: now + window,
            });

        Ok(info.clone())
    }

    async fn prune_expired(&self) -> Result<u64, DashboardError> {
        let now = self.now();
        let mut entries = self.entries.write().map_err(|_| Self::lock_error())?;
        let before = entries.len();
        entries.retain(|_, info| info.reset_at > now);
        Ok((before - entries.len()) as u64)
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}
