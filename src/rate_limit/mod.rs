//! Named, fixed-window rate limits.
//!
//! Counters are keyed `"{limit}:{identity}"` in a [`RateLimitStore`].

mod limit;
mod limiter;
mod store;

#[cfg(feature = "sqlx_postgres")]
mod postgres_store;

pub use limit::{Caller, KeyStrategy, Limit};
pub use limiter::{LOGIN, MFA_VERIFY, PASSWORD_RESET, RateLimitResult, RateLimiter};
#[cfg(feature = "sqlx_postgres")]
pub use postgres_store::PostgresRateLimitStore;
pub use store::{InMemoryStore, RateLimitInfo, RateLimitStore};
