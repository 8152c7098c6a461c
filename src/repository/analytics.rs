use async_trait::async_trait;

use crate::query::{
    AccountFilter, AccountOption, AccountRow, AccountScope, ExportRow, Page, SummaryKpis,
    TransactionFilter, TransactionRow,
};
use crate::tenant::Partition;
use crate::DashboardError;

/// Read-only access to the analytics views of one partition.
#[async_trait]
pub trait AnalyticsRepository: Send + Sync {
    async fn summary_kpis(
        &self,
        partition: &Partition,
        scope: &AccountScope,
    ) -> Result<SummaryKpis, DashboardError>;

    async fn accounts_page(
        &self,
        partition: &Partition,
        filter: &AccountFilter,
    ) -> Result<Page<AccountRow>, DashboardError>;

    async fn transactions_page(
        &self,
        partition: &Partition,
        filter: &TransactionFilter,
    ) -> Result<Page<TransactionRow>, DashboardError>;

    /// Number of transactions matching `filter`, ignoring pagination.
    async fn count_transactions(
        &self,
        partition: &Partition,
        filter: &TransactionFilter,
    ) -> Result<u64, DashboardError>;

    /// Up to `limit` export rows, newest first.
    async fn export_rows(
        &self,
        partition: &Partition,
        filter: &TransactionFilter,
        limit: u64,
    ) -> Result<Vec<ExportRow>, DashboardError>;

    async fn account_options(
        &self,
        partition: &Partition,
        scope: &AccountScope,
    ) -> Result<Vec<AccountOption>, DashboardError>;
}
