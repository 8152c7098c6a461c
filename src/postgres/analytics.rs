use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::{commit, db_error, scoped};
use crate::query::{
    AccountFilter, AccountOption, AccountRow, AccountScope, ExportRow, Page, SummaryKpis,
    TransactionFilter, TransactionRow, sql,
};
use crate::repository::AnalyticsRepository;
use crate::tenant::Partition;
use crate::DashboardError;

/// Reads the analytics views. Never writes.
#[derive(Clone)]
pub struct PostgresAnalyticsRepository {
    pool: PgPool,
}

impl PostgresAnalyticsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_u64(count: i64) -> u64 {
    u64::try_from(count).unwrap_or_default()
}

#[async_trait]
impl AnalyticsRepository for PostgresAnalyticsRepository {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn summary_kpis(
        &self,
        partition: &Partition,
        scope: &AccountScope,
    ) -> Result<SummaryKpis, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let (total_balance, total_available): (Decimal, Decimal) = sql::balance_kpis(scope)
            .build_query_as()
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| db_error("balance_kpis", e))?;
        let total_pending: Decimal = sql::pending_kpi(scope)
            .build_query_scalar()
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| db_error("pending_kpi", e))?;
        commit(tx).await?;

        Ok(SummaryKpis {
            total_balance,
            total_available,
            total_pending,
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn accounts_page(
        &self,
        partition: &Partition,
        filter: &AccountFilter,
    ) -> Result<Page<AccountRow>, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let total: i64 = sql::accounts_count(filter)
            .build_query_scalar()
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| db_error("accounts_count", e))?;
        let rows: Vec<AccountRow> = sql::accounts_page(filter)
            .build_query_as()
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| db_error("accounts_page", e))?;
        commit(tx).await?;

        Ok(Page::new(rows, to_u64(total), filter.page))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn transactions_page(
        &self,
        partition: &Partition,
        filter: &TransactionFilter,
    ) -> Result<Page<TransactionRow>, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let total: i64 = sql::transactions_count(filter)
            .build_query_scalar()
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| db_error("transactions_count", e))?;
        let rows: Vec<TransactionRow> = sql::transactions_page(filter)
            .build_query_as()
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| db_error("transactions_page", e))?;
        commit(tx).await?;

        Ok(Page::new(rows, to_u64(total), filter.page))
    }

    async fn count_transactions(
        &self,
        partition: &Partition,
        filter: &TransactionFilter,
    ) -> Result<u64, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let total: i64 = sql::transactions_count(filter)
            .build_query_scalar()
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| db_error("transactions_count", e))?;
        commit(tx).await?;

        Ok(to_u64(total))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn export_rows(
        &self,
        partition: &Partition,
        filter: &TransactionFilter,
        limit: u64,
    ) -> Result<Vec<ExportRow>, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let rows: Vec<ExportRow> = sql::export_rows(filter, limit)
            .build_query_as()
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| db_error("export_rows", e))?;
        commit(tx).await?;

        Ok(rows)
    }

    async fn account_options(
        &self,
        partition: &Partition,
        scope: &AccountScope,
    ) -> Result<Vec<AccountOption>, DashboardError> {
        let mut tx = scoped(&self.pool, partition).await?;
        let rows: Vec<AccountOption> = sql::account_options(scope)
            .build_query_as()
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| db_error("account_options", e))?;
        commit(tx).await?;

        Ok(rows)
    }
}
