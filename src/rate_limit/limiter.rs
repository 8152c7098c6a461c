use std::collections::HashMap;
use std::sync::Arc;

use super::limit::{Caller, Limit};
use super::store::RateLimitStore;
use crate::config::RateLimitConfig;
use crate::DashboardError;

/// Limit names registered by [`RateLimiter::from_config`].
pub const LOGIN: &str = "login";
pub const MFA_VERIFY: &str = "mfa_verify";
pub const PASSWORD_RESET: &str = "password_reset";

/// Result of a rate limit check.
#[derive(Debug, Clone)]
pub enum RateLimitResult {
    Allowed {
        remaining: u32,
        reset_at: chrono::DateTime<chrono::Utc>,
    },
    Limited { retry_after: i64 },
}

/// Rate limiter with named limit configurations.
///
/// # Example
///
/// ```rust
/// use ledgerdash::rate_limit::{RateLimiter, Limit, InMemoryStore};
/// use std::sync::Arc;
///
/// let store = Arc::new(InMemoryStore::new());
/// let limiter = RateLimiter::new(store)
///     .for_("login", Limit::per_minute(10).by_ip())
///     .for_("mfa_verify", Limit::per_minute(10).by_user());
/// ```
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    limits: HashMap<String, Limit>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self {
            store,
            limits: HashMap::new(),
        }
    }

    /// Registers the login, MFA verification and password reset limits.
    #[must_use]
    pub fn from_config(store: Arc<dyn RateLimitStore>, config: &RateLimitConfig) -> Self {
        Self::new(store)
            .for_(LOGIN, Limit::per_minute(config.login_per_minute).by_ip())
            .for_(
                MFA_VERIFY,
                Limit::per_minute(config.mfa_verify_per_minute).by_user(),
            )
            .for_(
                PASSWORD_RESET,
                Limit::per_minute(config.password_reset_per_minute).by_ip(),
            )
    }

    #[must_use]
    pub fn for_(mut self, name: impl Into<String>, limit: Limit) -> Self {
        self.limits.insert(name.into(), limit);
        self
    }

    fn limit(&self, limit_name: &str) -> Result<&Limit, DashboardError> {
        self.limits.get(limit_name).ok_or_else(|| {
            DashboardError::Configuration(format!("Rate limit '{limit_name}' not configured"))
        })
    }

    /// Records a hit for `caller`, keyed by the limit's [`KeyStrategy`](super::KeyStrategy).
    pub async fn hit(
        &self,
        limit_name: &str,
        caller: &Caller<'_>,
    ) -> Result<RateLimitResult, DashboardError> {
        let limit = self.limit(limit_name)?;
        let identity = limit.identity(caller).ok_or_else(|| {
            DashboardError::Configuration(format!(
                "Rate limit '{limit_name}' is keyed by user but the caller is anonymous"
            ))
        })?;

        let full_key = format!("{limit_name}:{identity}");
        let info = self.store.increment(&full_key, limit.window_secs()).await?;

        if info.attempts > limit.max_attempts {
            Ok(RateLimitResult::Limited {
                retry_after: info.available_in(self.store.now()).max(1),
            })
        } else {
            Ok(RateLimitResult::Allowed {
                remaining: limit.max_attempts - info.attempts,
                reset_at: info.reset_at,
            })
        }
    }

    /// Like [`hit`](Self::hit), but a blocked request becomes
    /// `DashboardError::RateLimited`.
    pub async fn check(&self, limit_name: &str, caller: &Caller<'_>) -> Result<(), DashboardError> {
        match self.hit(limit_name, caller).await? {
            RateLimitResult::Allowed { .. } => Ok(()),
            RateLimitResult::Limited { retry_after } => {
                log::warn!(
                    target: "ledgerdash",
                    "msg=\"rate limited\", limit=\"{limit_name}\", retry_after={retry_after}"
                );
                Err(DashboardError::RateLimited { retry_after })
            }
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("limits", &self.limits.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::{Duration, Utc};

    use super::*;
    use crate::rate_limit::InMemoryStore;

    fn is_limited(result: &RateLimitResult) -> bool {
        matches!(result, RateLimitResult::Limited { .. })
    }

    #[tokio::test]
    async fn test_eleventh_login_in_a_minute_is_rejected() {
        let now = Arc::new(Mutex::new(Utc::now()));
        let clock = Arc::clone(&now);
        let store = Arc::new(InMemoryStore::with_clock(move || *clock.lock().unwrap()));
        let limiter = RateLimiter::from_config(store, &RateLimitConfig::default());
        let caller = Caller::anonymous("203.0.113.9");

        for i in 0..10 {
            *now.lock().unwrap() += Duration::seconds(5);
            assert!(
                limiter.check(LOGIN, &caller).await.is_ok(),
                "attempt {} should pass",
                i + 1
            );
        }

        let err = limiter.check(LOGIN, &caller).await.unwrap_err();
        let DashboardError::RateLimited { retry_after } = err else {
            panic!("expected RateLimited, got {err:?}");
        };
        assert!(retry_after > 0 && retry_after <= 60);

        // another IP has its own budget
        assert!(
            limiter
                .check(LOGIN, &Caller::anonymous("198.51.100.7"))
                .await
                .is_ok()
        );

        *now.lock().unwrap() += Duration::seconds(60);
        assert!(limiter.check(LOGIN, &caller).await.is_ok());
    }

    #[tokio::test]
    async fn test_password_reset_allows_five() {
        let limiter =
            RateLimiter::from_config(Arc::new(InMemoryStore::new()), &RateLimitConfig::default());
        let caller = Caller::anonymous("ip");

        for _ in 0..5 {
            assert!(!is_limited(&limiter.hit(PASSWORD_RESET, &caller).await.unwrap()));
        }
        assert!(is_limited(&limiter.hit(PASSWORD_RESET, &caller).await.unwrap()));
    }

    #[tokio::test]
    async fn test_mfa_limit_follows_user_across_addresses() {
        let limiter =
            RateLimiter::from_config(Arc::new(InMemoryStore::new()), &RateLimitConfig::default());

        for i in 0..10 {
            let ip = format!("10.9.9.{i}");
            assert!(limiter.check(MFA_VERIFY, &Caller::user(&ip, "acme:ada")).await.is_ok());
        }
        assert!(matches!(
            limiter
                .check(MFA_VERIFY, &Caller::user("10.9.9.99", "acme:ada"))
                .await,
            Err(DashboardError::RateLimited { .. })
        ));
        assert!(
            limiter
                .check(MFA_VERIFY, &Caller::user("10.9.9.99", "acme:bob"))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_user_limit_needs_a_user() {
        let limiter =
            RateLimiter::from_config(Arc::new(InMemoryStore::new()), &RateLimitConfig::default());
        assert!(matches!(
            limiter.check(MFA_VERIFY, &Caller::anonymous("ip")).await,
            Err(DashboardError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_limits_are_independent() {
        let store = Arc::new(InMemoryStore::new());
        let limiter = RateLimiter::new(store)
            .for_("a", Limit::per_minute(1))
            .for_("b", Limit::per_minute(1));
        let caller = Caller::anonymous("k");

        assert!(!is_limited(&limiter.hit("a", &caller).await.unwrap()));
        assert!(is_limited(&limiter.hit("a", &caller).await.unwrap()));
        assert!(!is_limited(&limiter.hit("b", &caller).await.unwrap()));
    }

    #[tokio::test]
    async fn test_unknown_limit_is_configuration_error() {
        let limiter = RateLimiter::new(Arc::new(InMemoryStore::new()));
        assert!(matches!(
            limiter.hit("missing", &Caller::anonymous("k")).await,
            Err(DashboardError::Configuration(_))
        ));
    }
}
