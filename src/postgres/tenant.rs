use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::migrations::apply_tenant_ddl;
use super::{commit, db_error, is_unique_violation};
use crate::tenant::{Partition, Tenant, TenantDirectory, TenantProvisioner};
use crate::validators::ValidationError;
use crate::DashboardError;

const TENANT_COLUMNS: &str = "t.id, t.name, t.slug, t.schema_name, t.is_active, t.created_at";

#[derive(FromRow)]
struct TenantRecord {
    id: Uuid,
    name: String,
    slug: String,
    schema_name: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<TenantRecord> for Tenant {
    type Error = DashboardError;

    fn try_from(row: TenantRecord) -> Result<Self, Self::Error> {
        let partition = Partition::new(row.schema_name)
            .map_err(|e| DashboardError::Database(format!("tenant '{}': {e}", row.slug)))?;
        Ok(Tenant {
            id: row.id,
            name: row.name,
            slug: row.slug,
            partition,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

/// Tenant and domain lookups against the `public` schema.
#[derive(Clone)]
pub struct PostgresTenantDirectory {
    pool: PgPool,
}

impl PostgresTenantDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantDirectory for PostgresTenantDirectory {
    async fn find_by_domain(&self, domain: &str) -> Result<Option<Tenant>, DashboardError> {
        let row: Option<TenantRecord> = sqlx::query_as(&format!(
            "SELECT {TENANT_COLUMNS} FROM public.tenants t \
             JOIN public.domains d ON d.tenant_id = t.id WHERE d.domain = $1"
        ))
        .bind(domain)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find_tenant_by_domain", e))?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, DashboardError> {
        let row: Option<TenantRecord> = sqlx::query_as(&format!(
            "SELECT {TENANT_COLUMNS} FROM public.tenants t WHERE t.slug = $1"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find_tenant_by_slug", e))?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_tenants(&self) -> Result<Vec<Tenant>, DashboardError> {
        let rows: Vec<TenantRecord> = sqlx::query_as(&format!(
            "SELECT {TENANT_COLUMNS} FROM public.tenants t ORDER BY t.slug"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list_tenants", e))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

/// Creates the tenant row, its primary domain and its schema in one
/// transaction.
#[derive(Clone)]
pub struct PostgresTenantProvisioner {
    pool: PgPool,
}

impl PostgresTenantProvisioner {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantProvisioner for PostgresTenantProvisioner {
    async fn slug_exists(&self, slug: &str) -> Result<bool, DashboardError> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM public.tenants WHERE slug = $1 OR schema_name = $1)",
        )
        .bind(slug)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("tenant_slug_exists", e))
    }

    async fn create_tenant(
        &self,
        name: &str,
        partition: &Partition,
        primary_domain: &str,
    ) -> Result<Tenant, DashboardError> {
        let mut tx = self.pool.begin().await.map_err(|e| db_error("begin", e))?;

        let row: TenantRecord = sqlx::query_as(
            "INSERT INTO public.tenants AS t (id, name, slug, schema_name) \
             VALUES ($1, $2, $3, $3) \
             RETURNING t.id, t.name, t.slug, t.schema_name, t.is_active, t.created_at",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(partition.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ValidationError::DuplicateSlug.into()
            } else {
                db_error("insert_tenant", e)
            }
        })?;

        sqlx::query(
            "INSERT INTO public.domains (id, domain, tenant_id, is_primary) \
             VALUES ($1, $2, $3, TRUE)",
        )
        .bind(Uuid::new_v4())
        .bind(primary_domain)
        .bind(row.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ValidationError::InvalidDomain.into()
            } else {
                db_error("insert_domain", e)
            }
        })?;

        // `Partition` only admits [a-z0-9_] identifiers.
        sqlx::query(&format!("CREATE SCHEMA \"{partition}\""))
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("create_schema", e))?;
        sqlx::query("SELECT set_config('search_path', $1, true)")
            .bind(partition.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("set_search_path", e))?;
        apply_tenant_ddl(&mut *tx).await?;

        commit(tx).await?;
        row.try_into()
    }
}
