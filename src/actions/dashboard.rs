use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Actor;
use crate::config::PaginationConfig;
use crate::permission::{Action, Resource, authorize};
use crate::query::{
    AccountFilter, AccountOption, AccountRow, AccountScope, AccountSort, Page, PageRequest,
    SortOrder, SummaryKpis, TransactionFilter, TransactionRow, TransactionSort, normalize_search,
    parse_pending,
};
use crate::repository::{AnalyticsRepository, Client, ClientRepository};
use crate::tenant::Partition;
use crate::validators::ValidationError;
use crate::DashboardError;

/// Query string of the summary page. Every field is optional and parsed
/// leniently; unknown sort keys fall back to the default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountQuery {
    pub client_id: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

/// Query string shared by the transactions page and the CSV export.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionQuery {
    pub client_id: Option<String>,
    pub account_id: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub pending: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_number(value: &Option<String>) -> Option<u32> {
    non_empty(value).and_then(|v| v.parse().ok())
}

fn parse_date(value: &Option<String>, field: &str) -> Result<Option<NaiveDate>, ValidationError> {
    non_empty(value)
        .map(|v| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d")
                .map_err(|_| ValidationError::InvalidFilter(format!("{field} must be YYYY-MM-DD")))
        })
        .transpose()
}

fn parse_client_id(value: &Option<String>) -> Result<Option<Uuid>, ValidationError> {
    non_empty(value)
        .map(|v| {
            Uuid::parse_str(v)
                .map_err(|_| ValidationError::InvalidFilter("unknown client".to_owned()))
        })
        .transpose()
}

impl TransactionQuery {
    /// Builds the filter for `scope`. No default date range is applied.
    pub fn to_filter(
        &self,
        scope: AccountScope,
        pagination: &PaginationConfig,
    ) -> Result<TransactionFilter, ValidationError> {
        let mut filter = TransactionFilter::new(scope);
        filter.date_from = parse_date(&self.date_from, "date_from")?;
        filter.date_to = parse_date(&self.date_to, "date_to")?;
        filter.pending = parse_pending(self.pending.as_deref());
        filter.search = normalize_search(self.search.as_deref());
        filter.sort = non_empty(&self.sort)
            .and_then(TransactionSort::parse)
            .unwrap_or_default();
        filter.order = non_empty(&self.order)
            .and_then(SortOrder::parse)
            .unwrap_or(SortOrder::Desc);
        filter.page = PageRequest::new(
            parse_number(&self.page),
            parse_number(&self.page_size),
            pagination,
        );
        Ok(filter)
    }
}

/// Resolves client and account filters into the accounts a query may see.
pub(crate) async fn resolve_scope(
    clients: &dyn ClientRepository,
    partition: &Partition,
    client_id: Option<Uuid>,
    account_id: Option<&str>,
) -> Result<AccountScope, DashboardError> {
    let client_accounts = match client_id {
        Some(id) => Some(clients.account_ids_for_client(partition, id).await?),
        None => None,
    };
    Ok(AccountScope::resolve(client_accounts, account_id))
}

/// Parses `query` and scopes it to the selected client and account.
pub(crate) async fn transaction_filter(
    clients: &dyn ClientRepository,
    partition: &Partition,
    query: &TransactionQuery,
    pagination: &PaginationConfig,
) -> Result<TransactionFilter, DashboardError> {
    let client_id = parse_client_id(&query.client_id)?;
    let scope = resolve_scope(clients, partition, client_id, non_empty(&query.account_id)).await?;
    Ok(query.to_filter(scope, pagination)?)
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    /// Active clients for the filter dropdown.
    pub clients: Vec<Client>,
    pub selected_client_id: Option<Uuid>,
    pub kpis: SummaryKpis,
    pub accounts: Page<AccountRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionsView {
    pub clients: Vec<Client>,
    pub account_options: Vec<AccountOption>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub transactions: Page<TransactionRow>,
}

/// Read-only dashboard pages over the analytics views.
pub struct DashboardAction {
    analytics: Arc<dyn AnalyticsRepository>,
    clients: Arc<dyn ClientRepository>,
    pagination: PaginationConfig,
}

impl DashboardAction {
    pub fn new(analytics: Arc<dyn AnalyticsRepository>, clients: Arc<dyn ClientRepository>) -> Self {
        Self {
            analytics,
            clients,
            pagination: PaginationConfig::default(),
        }
    }

    #[must_use]
    pub fn pagination(mut self, pagination: PaginationConfig) -> Self {
        self.pagination = pagination;
        self
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dashboard_summary", skip_all, err)
    )]
    pub async fn summary(
        &self,
        actor: &Actor,
        query: &AccountQuery,
    ) -> Result<DashboardSummary, DashboardError> {
        authorize(actor.role, Resource::Dashboard, Action::Read)?;
        let partition = &actor.partition;

        let client_id = parse_client_id(&query.client_id)?;
        let scope = resolve_scope(self.clients.as_ref(), partition, client_id, None).await?;

        let mut filter = AccountFilter::new(scope.clone());
        filter.search = normalize_search(query.search.as_deref());
        filter.sort = non_empty(&query.sort)
            .and_then(AccountSort::parse)
            .unwrap_or_default();
        filter.order = non_empty(&query.order)
            .and_then(SortOrder::parse)
            .unwrap_or_default();
        filter.page = PageRequest::new(
            parse_number(&query.page),
            parse_number(&query.page_size),
            &self.pagination,
        );

        Ok(DashboardSummary {
            clients: self.clients.list_active_clients(partition).await?,
            selected_client_id: client_id,
            kpis: self.analytics.summary_kpis(partition, &scope).await?,
            accounts: self.analytics.accounts_page(partition, &filter).await?,
        })
    }

    /// Transactions page. Missing dates default to the last 30 days.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dashboard_transactions", skip_all, err)
    )]
    pub async fn transactions(
        &self,
        actor: &Actor,
        query: &TransactionQuery,
    ) -> Result<TransactionsView, DashboardError> {
        authorize(actor.role, Resource::Dashboard, Action::Read)?;
        let partition = &actor.partition;

        let filter = transaction_filter(self.clients.as_ref(), partition, query, &self.pagination)
            .await?
            .with_default_range(Utc::now().date_naive());
        let client_id = parse_client_id(&query.client_id)?;
        let client_scope = resolve_scope(self.clients.as_ref(), partition, client_id, None).await?;

        Ok(TransactionsView {
            clients: self.clients.list_active_clients(partition).await?,
            account_options: self.analytics.account_options(partition, &client_scope).await?,
            date_from: filter.date_from,
            date_to: filter.date_to,
            transactions: self.analytics.transactions_page(partition, &filter).await?,
        })
    }

    /// Accounts of the selected client, for the account dropdown.
    pub async fn account_options(
        &self,
        actor: &Actor,
        client_id: Option<&str>,
    ) -> Result<Vec<AccountOption>, DashboardError> {
        authorize(actor.role, Resource::Dashboard, Action::Read)?;
        let client_id = parse_client_id(&client_id.map(str::to_owned))?;
        let scope = resolve_scope(self.clients.as_ref(), &actor.partition, client_id, None).await?;
        self.analytics.account_options(&actor.partition, &scope).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rust_decimal::Decimal;

    use super::*;
    use crate::actions::test_support::*;
    use crate::permission::Role;
    use crate::repository::{MockAnalyticsRepository, MockClientRepository, MockUserRepository};

    struct Fixture {
        analytics: MockAnalyticsRepository,
        clients: MockClientRepository,
        action: DashboardAction,
        actor: Actor,
    }

    fn fixture() -> Fixture {
        let users = MockUserRepository::new();
        let analytics = MockAnalyticsRepository::new();
        let clients = MockClientRepository::new();
        let user = seed_user(&users, &acme(), "ada@acme.example", Role::User);
        let action = DashboardAction::new(Arc::new(analytics.clone()), Arc::new(clients.clone()));
        Fixture {
            analytics,
            clients,
            action,
            actor: actor_for(&user, &acme()),
        }
    }

    fn dec(v: i64) -> Decimal {
        Decimal::from(v)
    }

    #[tokio::test]
    async fn test_summary_kpis_follow_client_scope() {
        let f = fixture();
        f.analytics.add_account(&acme(), AccountRow::mock("a", Some(dec(100)), Some(dec(80))));
        f.analytics.add_account(&acme(), AccountRow::mock("b", Some(dec(-50)), None));
        f.analytics.add_account(&acme(), AccountRow::mock("c", Some(dec(25)), Some(dec(10))));

        let client = f.clients.create_client(&acme(), "Northwind", true).await.unwrap();
        f.clients
            .add_mappings(&acme(), client.client_id, &["a".to_owned(), "b".to_owned()])
            .await
            .unwrap();

        let all = f.action.summary(&f.actor, &AccountQuery::default()).await.unwrap();
        assert_eq!(all.kpis.total_balance, dec(75));
        assert_eq!(all.kpis.total_available, dec(90));
        assert_eq!(all.accounts.total, 3);

        let query = AccountQuery {
            client_id: Some(client.client_id.to_string()),
            ..Default::default()
        };
        let scoped = f.action.summary(&f.actor, &query).await.unwrap();
        assert_eq!(scoped.kpis.total_balance, dec(50));
        assert_eq!(scoped.kpis.total_available, dec(80));
        assert_eq!(scoped.accounts.total, 2);
        assert_eq!(scoped.clients.len(), 1);
    }

    #[tokio::test]
    async fn test_unmapped_client_matches_nothing() {
        let f = fixture();
        f.analytics.add_account(&acme(), AccountRow::mock("a", Some(dec(100)), None));
        let client = f.clients.create_client(&acme(), "Empty", true).await.unwrap();

        let query = AccountQuery {
            client_id: Some(client.client_id.to_string()),
            ..Default::default()
        };
        let summary = f.action.summary(&f.actor, &query).await.unwrap();
        assert_eq!(summary.kpis.total_balance, Decimal::ZERO);
        assert_eq!(summary.accounts.total, 0);
        assert_eq!(summary.accounts.total_pages, 1);
    }

    #[tokio::test]
    async fn test_transactions_default_to_last_thirty_days() {
        let f = fixture();
        let today = Utc::now().date_naive();
        f.analytics.add_transaction(
            &acme(),
            TransactionRow::mock("t1", "a", today - Duration::days(3), dec(10), false),
        );
        f.analytics.add_transaction(
            &acme(),
            TransactionRow::mock("t2", "a", today - Duration::days(45), dec(20), false),
        );

        let view = f
            .action
            .transactions(&f.actor, &TransactionQuery::default())
            .await
            .unwrap();
        assert_eq!(view.date_from, Some(today - Duration::days(30)));
        assert_eq!(view.date_to, Some(today));
        assert_eq!(view.transactions.total, 1);
        assert_eq!(view.transactions.rows[0].transaction_id, "t1");
    }

    #[tokio::test]
    async fn test_account_outside_client_matches_nothing() {
        let f = fixture();
        let today = Utc::now().date_naive();
        f.analytics
            .add_transaction(&acme(), TransactionRow::mock("t1", "a", today, dec(10), false));
        f.analytics
            .add_transaction(&acme(), TransactionRow::mock("t2", "z", today, dec(10), false));
        let client = f.clients.create_client(&acme(), "Northwind", true).await.unwrap();
        f.clients
            .add_mappings(&acme(), client.client_id, &["a".to_owned()])
            .await
            .unwrap();

        let query = TransactionQuery {
            client_id: Some(client.client_id.to_string()),
            account_id: Some("z".to_owned()),
            ..Default::default()
        };
        let view = f.action.transactions(&f.actor, &query).await.unwrap();
        assert_eq!(view.transactions.total, 0);
    }

    #[test]
    fn test_query_parsing_is_lenient() {
        let query = TransactionQuery {
            pending: Some("maybe".to_owned()),
            sort: Some("amount; DROP TABLE users".to_owned()),
            order: Some("sideways".to_owned()),
            page: Some("-3".to_owned()),
            page_size: Some("1000".to_owned()),
            search: Some("   ".to_owned()),
            ..Default::default()
        };
        let filter = query
            .to_filter(AccountScope::All, &PaginationConfig::default())
            .unwrap();

        assert_eq!(filter.pending, None);
        assert_eq!(filter.sort, TransactionSort::TransactionDate);
        assert_eq!(filter.order, SortOrder::Desc);
        assert_eq!(filter.page.page, 1);
        assert_eq!(filter.page.page_size, 100);
        assert_eq!(filter.search, None);
    }

    #[test]
    fn test_bad_dates_are_rejected() {
        let query = TransactionQuery {
            date_from: Some("2024-13-40".to_owned()),
            ..Default::default()
        };
        assert!(matches!(
            query.to_filter(AccountScope::All, &PaginationConfig::default()),
            Err(ValidationError::InvalidFilter(_))
        ));
    }
}
