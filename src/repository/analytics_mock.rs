#![allow(clippy::unwrap_used)]

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::analytics::AnalyticsRepository;
use crate::query::{
    AccountFilter, AccountOption, AccountRow, AccountScope, AccountSort, ExportRow, Page,
    SortOrder, SummaryKpis, TransactionFilter, TransactionRow, TransactionSort,
};
use crate::tenant::Partition;
use crate::DashboardError;

#[derive(Default)]
struct ViewData {
    accounts: Vec<AccountRow>,
    transactions: Vec<TransactionRow>,
    /// Reported by `count_transactions` instead of the real count.
    transaction_count: Option<u64>,
}

/// In-memory stand-in for the analytics views.
#[derive(Clone, Default)]
pub struct MockAnalyticsRepository {
    data: Arc<Mutex<HashMap<Partition, ViewData>>>,
}

impl MockAnalyticsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_account(&self, partition: &Partition, row: AccountRow) {
        self.data
            .lock()
            .unwrap()
            .entry(partition.clone())
            .or_default()
            .accounts
            .push(row);
    }

    pub fn add_transaction(&self, partition: &Partition, row: TransactionRow) {
        self.data
            .lock()
            .unwrap()
            .entry(partition.clone())
            .or_default()
            .transactions
            .push(row);
    }

    /// Pretends the transactions view matches `count` rows for any filter.
    pub fn set_transaction_count(&self, partition: &Partition, count: Option<u64>) {
        self.data
            .lock()
            .unwrap()
            .entry(partition.clone())
            .or_default()
            .transaction_count = count;
    }

    fn matching_transactions(
        &self,
        partition: &Partition,
        filter: &TransactionFilter,
    ) -> Vec<TransactionRow> {
        let data = self.data.lock().unwrap();
        data.get(partition)
            .map(|d| {
                d.transactions
                    .iter()
                    .filter(|t| transaction_matches(filter, t))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn contains_ci(value: &Option<String>, needle: &str) -> bool {
    value
        .as_deref()
        .is_some_and(|v| v.to_lowercase().contains(&needle.to_lowercase()))
}

fn account_matches(filter: &AccountFilter, row: &AccountRow) -> bool {
    filter.scope.contains(&row.account_id)
        && filter.search.as_deref().is_none_or(|s| {
            contains_ci(&row.account_name, s)
                || contains_ci(&row.institution_name, s)
                || contains_ci(&row.mask, s)
        })
}

fn transaction_matches(filter: &TransactionFilter, row: &TransactionRow) -> bool {
    let in_range = |date: Option<chrono::NaiveDate>| match date {
        Some(d) => {
            filter.date_from.is_none_or(|from| d >= from) && filter.date_to.is_none_or(|to| d <= to)
        }
        None => filter.date_from.is_none() && filter.date_to.is_none(),
    };

    filter.scope.contains(&row.account_id)
        && in_range(row.transaction_date)
        && filter.pending.is_none_or(|p| row.pending == Some(p))
        && filter
            .search
            .as_deref()
            .is_none_or(|s| contains_ci(&row.transaction_name, s) || contains_ci(&row.merchant_name, s))
}

/// Orders two optional values with NULLs last in either direction.
fn nulls_last<T: PartialOrd>(a: &Option<T>, b: &Option<T>, order: SortOrder) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => {
            let ord = a.partial_cmp(b).unwrap_or(Ordering::Equal);
            match order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        }
    }
}

fn compare_accounts(sort: AccountSort, order: SortOrder, a: &AccountRow, b: &AccountRow) -> Ordering {
    match sort {
        AccountSort::AccountName => nulls_last(&a.account_name, &b.account_name, order),
        AccountSort::InstitutionName => nulls_last(&a.institution_name, &b.institution_name, order),
        AccountSort::Type => nulls_last(&a.account_type, &b.account_type, order),
        AccountSort::Subtype => nulls_last(&a.subtype, &b.subtype, order),
        AccountSort::Mask => nulls_last(&a.mask, &b.mask, order),
        AccountSort::CurrentBalance => nulls_last(&a.current_balance, &b.current_balance, order),
        AccountSort::AvailableBalance => {
            nulls_last(&a.available_balance, &b.available_balance, order)
        }
        AccountSort::CreditLimit => nulls_last(&a.credit_limit, &b.credit_limit, order),
        AccountSort::UtilizationPct => nulls_last(&a.utilization_pct, &b.utilization_pct, order),
        AccountSort::BalanceAsOf => nulls_last(&a.balance_as_of, &b.balance_as_of, order),
    }
}

fn compare_transactions(
    sort: TransactionSort,
    order: SortOrder,
    a: &TransactionRow,
    b: &TransactionRow,
) -> Ordering {
    match sort {
        TransactionSort::TransactionDate => {
            nulls_last(&a.transaction_date, &b.transaction_date, order)
        }
        TransactionSort::TransactionName => {
            nulls_last(&a.transaction_name, &b.transaction_name, order)
        }
        TransactionSort::MerchantName => nulls_last(&a.merchant_name, &b.merchant_name, order),
        TransactionSort::Amount => nulls_last(&a.amount, &b.amount, order),
        TransactionSort::AccountName => nulls_last(&a.account_name, &b.account_name, order),
        TransactionSort::InstitutionName => {
            nulls_last(&a.institution_name, &b.institution_name, order)
        }
        TransactionSort::PaymentChannel => {
            nulls_last(&a.payment_channel, &b.payment_channel, order)
        }
        TransactionSort::TransactionType => {
            nulls_last(&a.transaction_type, &b.transaction_type, order)
        }
        TransactionSort::FlowDirection => nulls_last(&a.flow_direction, &b.flow_direction, order),
        TransactionSort::Pending => nulls_last(&a.pending, &b.pending, order),
    }
}

fn paginate<T>(rows: Vec<T>, request: crate::query::PageRequest) -> Page<T> {
    let total = rows.len() as u64;
    let items = rows
        .into_iter()
        .skip(request.offset() as usize)
        .take(request.limit() as usize)
        .collect();
    Page::new(items, total, request)
}

#[async_trait]
impl AnalyticsRepository for MockAnalyticsRepository {
    async fn summary_kpis(
        &self,
        partition: &Partition,
        scope: &AccountScope,
    ) -> Result<SummaryKpis, DashboardError> {
        let data = self.data.lock().unwrap();
        Ok(data
            .get(partition)
            .map(|d| SummaryKpis::compute(scope, &d.accounts, &d.transactions))
            .unwrap_or_default())
    }

    async fn accounts_page(
        &self,
        partition: &Partition,
        filter: &AccountFilter,
    ) -> Result<Page<AccountRow>, DashboardError> {
        let mut rows: Vec<AccountRow> = {
            let data = self.data.lock().unwrap();
            data.get(partition)
                .map(|d| {
                    d.accounts
                        .iter()
                        .filter(|a| account_matches(filter, a))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };
        rows.sort_by(|a, b| compare_accounts(filter.sort, filter.order, a, b));
        Ok(paginate(rows, filter.page))
    }

    async fn transactions_page(
        &self,
        partition: &Partition,
        filter: &TransactionFilter,
    ) -> Result<Page<TransactionRow>, DashboardError> {
        let mut rows = self.matching_transactions(partition, filter);
        rows.sort_by(|a, b| compare_transactions(filter.sort, filter.order, a, b));
        Ok(paginate(rows, filter.page))
    }

    async fn count_transactions(
        &self,
        partition: &Partition,
        filter: &TransactionFilter,
    ) -> Result<u64, DashboardError> {
        let forced = self
            .data
            .lock()
            .unwrap()
            .get(partition)
            .and_then(|d| d.transaction_count);
        match forced {
            Some(count) => Ok(count),
            None => Ok(self.matching_transactions(partition, filter).len() as u64),
        }
    }

    async fn export_rows(
        &self,
        partition: &Partition,
        filter: &TransactionFilter,
        limit: u64,
    ) -> Result<Vec<ExportRow>, DashboardError> {
        let mut rows = self.matching_transactions(partition, filter);
        rows.sort_by(|a, b| {
            compare_transactions(TransactionSort::TransactionDate, SortOrder::Desc, a, b)
        });
        Ok(rows
            .iter()
            .take(limit as usize)
            .map(ExportRow::from)
            .collect())
    }

    async fn account_options(
        &self,
        partition: &Partition,
        scope: &AccountScope,
    ) -> Result<Vec<AccountOption>, DashboardError> {
        let data = self.data.lock().unwrap();
        let mut accounts: Vec<&AccountRow> = data
            .get(partition)
            .map(|d| d.accounts.iter().filter(|a| scope.contains(&a.account_id)).collect())
            .unwrap_or_default();
        accounts.sort_by(|a, b| nulls_last(&a.account_name, &b.account_name, SortOrder::Asc));
        Ok(accounts.into_iter().map(AccountOption::for_account).collect())
    }
}
