//! PostgreSQL implementations of the repository traits.
//!
//! Shared tables (tenants, domains, sessions, rate limits) live in the
//! `public` schema. Each tenant owns one schema with identical tables; every
//! tenant-scoped query runs inside a transaction whose `search_path` is
//! pinned to that schema with `set_config(.., true)`, so it reverts when the
//! transaction ends and never leaks to the next user of the connection.

mod analytics;
mod audit_log;
mod client;
pub mod migrations;
mod password_reset;
mod recovery_code;
mod session;
mod tenant;
mod trusted_device;
mod user;

use std::sync::Arc;

use sqlx::{PgPool, Postgres, Transaction};

pub use analytics::PostgresAnalyticsRepository;
pub use audit_log::PostgresAuditLogRepository;
pub use client::PostgresClientRepository;
pub use password_reset::PostgresPasswordResetRepository;
pub use recovery_code::PostgresRecoveryCodeRepository;
pub use session::PostgresSessionRepository;
pub use tenant::{PostgresTenantDirectory, PostgresTenantProvisioner};
pub use trusted_device::PostgresTrustedDeviceRepository;
pub use user::PostgresUserRepository;

use crate::rate_limit::PostgresRateLimitStore;
use crate::tenant::Partition;
use crate::DashboardError;

/// Logs a driver error and converts it.
pub(crate) fn db_error(operation: &str, e: sqlx::Error) -> DashboardError {
    log::error!(
        target: "ledgerdash",
        "msg=\"database error\", operation=\"{operation}\", error=\"{e}\""
    );
    DashboardError::Database(e.to_string())
}

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|d| d.code())
        .is_some_and(|code| code == "23505")
}

/// Starts a transaction confined to `partition`.
pub(crate) async fn scoped(
    pool: &PgPool,
    partition: &Partition,
) -> Result<Transaction<'static, Postgres>, DashboardError> {
    let mut tx = pool.begin().await.map_err(|e| db_error("begin", e))?;
    sqlx::query("SELECT set_config('search_path', $1, true)")
        .bind(partition.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("set_search_path", e))?;
    Ok(tx)
}

pub(crate) async fn commit(tx: Transaction<'static, Postgres>) -> Result<(), DashboardError> {
    tx.commit().await.map_err(|e| db_error("commit", e))
}

/// Every PostgreSQL repository, sharing one pool.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<PostgresUserRepository>,
    pub trusted_devices: Arc<PostgresTrustedDeviceRepository>,
    pub recovery_codes: Arc<PostgresRecoveryCodeRepository>,
    pub password_resets: Arc<PostgresPasswordResetRepository>,
    pub audit_log: Arc<PostgresAuditLogRepository>,
    pub clients: Arc<PostgresClientRepository>,
    pub analytics: Arc<PostgresAnalyticsRepository>,
    pub sessions: Arc<PostgresSessionRepository>,
    pub tenants: Arc<PostgresTenantDirectory>,
    pub provisioner: Arc<PostgresTenantProvisioner>,
    pub rate_limits: Arc<PostgresRateLimitStore>,
}

/// Creates all Postgres repository instances from a connection pool.
pub fn create_repositories(pool: PgPool) -> Repositories {
    Repositories {
        users: Arc::new(PostgresUserRepository::new(pool.clone())),
        trusted_devices: Arc::new(PostgresTrustedDeviceRepository::new(pool.clone())),
        recovery_codes: Arc::new(PostgresRecoveryCodeRepository::new(pool.clone())),
        password_resets: Arc::new(PostgresPasswordResetRepository::new(pool.clone())),
        audit_log: Arc::new(PostgresAuditLogRepository::new(pool.clone())),
        clients: Arc::new(PostgresClientRepository::new(pool.clone())),
        analytics: Arc::new(PostgresAnalyticsRepository::new(pool.clone())),
        sessions: Arc::new(PostgresSessionRepository::new(pool.clone())),
        tenants: Arc::new(PostgresTenantDirectory::new(pool.clone())),
        provisioner: Arc::new(PostgresTenantProvisioner::new(pool.clone())),
        rate_limits: Arc::new(PostgresRateLimitStore::new(pool)),
    }
}
