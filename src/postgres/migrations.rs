//! Database migrations.
//!
//! Shared tables are managed by sqlx's embedded migrator. Tenant tables
//! are plain DDL applied inside each tenant schema when it is provisioned,
//! and re-applied idempotently by [`run_tenant`] on `migrate`.
//!
//! # Example
//!
//! ```rust,ignore
//! use ledgerdash::postgres::migrations;
//! use sqlx::PgPool;
//!
//! async fn setup_database(pool: &PgPool) -> Result<(), ledgerdash::DashboardError> {
//!     migrations::run_public(pool).await?;
//!     Ok(())
//! }
//! ```

use sqlx::{Executor, PgConnection, PgPool};

use super::{commit, db_error, scoped};
use crate::tenant::Partition;
use crate::DashboardError;

/// Per-tenant tables: users, trusted devices, recovery codes, reset tokens,
/// audit log, clients and client accounts.
pub const TENANT_DDL: &str = include_str!("../../migrations/tenant/0001_tenant_tables.sql");

/// Runs the shared-schema migrations:
/// - `tenants`
/// - `domains`
/// - `sessions`
/// - `rate_limits`
pub async fn run_public(pool: &PgPool) -> Result<(), DashboardError> {
    sqlx::migrate!("./migrations/public")
        .run(pool)
        .await
        .map_err(|e| {
            log::error!(target: "ledgerdash", "msg=\"migration failed\", error=\"{e}\"");
            DashboardError::Database(e.to_string())
        })
}

/// Creates the tenant tables inside an open transaction whose `search_path`
/// is already pinned to the tenant schema.
pub(crate) async fn apply_tenant_ddl(conn: &mut PgConnection) -> Result<(), DashboardError> {
    conn.execute(sqlx::raw_sql(TENANT_DDL))
        .await
        .map_err(|e| db_error("tenant_ddl", e))?;
    Ok(())
}

/// Brings an existing tenant schema up to date.
pub async fn run_tenant(pool: &PgPool, partition: &Partition) -> Result<(), DashboardError> {
    let mut tx = scoped(pool, partition).await?;
    apply_tenant_ddl(&mut *tx).await?;
    commit(tx).await?;

    log::info!(
        target: "ledgerdash::tenant",
        "msg=\"tenant schema migrated\", partition=\"{partition}\""
    );
    Ok(())
}
